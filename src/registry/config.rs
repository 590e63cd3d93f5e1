use crate::core::{Ensemble, FileError, Result};
use crate::storage::naming::{DEFAULT_HEADER_TAG, RunNaming};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Seconds between the Unix epoch and 2009-01-01 UTC; timestamped ids count from there
const TIMESTAMP_ORIGIN: i64 = 1_230_768_000;

/// How the first run id candidate is derived from the seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// The seed itself
    #[default]
    Seeded,
    /// Wall-clock seconds since 2009-01-01 UTC plus the seed
    Timestamped,
}

impl IdPolicy {
    pub fn candidate(self, seed: u64) -> u64 {
        match self {
            IdPolicy::Seeded => seed,
            IdPolicy::Timestamped => {
                let origin = Utc.timestamp_opt(TIMESTAMP_ORIGIN, 0).single().unwrap_or_default();
                let elapsed = (Utc::now() - origin).num_seconds().max(0) as u64;
                elapsed.saturating_add(seed)
            }
        }
    }
}

/// Run parameters handed to the registry once at startup
///
/// Similar to a connection config: build with [`RunConfig::new`] and chain setters.
///
/// # Examples
///
/// ```
/// use simfiles::{Ensemble, RunConfig};
///
/// let config = RunConfig::new(42, Ensemble::Canonical, "run1")
///     .base_directory("OUTPUT")
///     .append(false)
///     .max_id_attempts(50);
/// assert_eq!(config.seed, 42);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed the run id is derived from
    pub seed: u64,

    /// Continue an earlier run instead of starting fresh
    pub append: bool,

    pub ensemble: Ensemble,

    /// Free-form label describing the run parameters
    pub data_label: String,

    /// Directory all output files are placed in
    pub base_directory: PathBuf,

    /// First token of every file name
    pub header_tag: String,

    pub id_policy: IdPolicy,

    /// Candidates tried before giving up on finding an unused id
    pub max_id_attempts: u32,

    /// Id of the run being continued; skips the id search
    pub resume_id: Option<u64>,

    /// Initial configuration read by a fresh run
    pub init_file: Option<PathBuf>,

    /// Positions of particles that are never updated
    pub fixed_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            append: false,
            ensemble: Ensemble::Canonical,
            data_label: "default".to_string(),
            base_directory: PathBuf::from("OUTPUT"),
            header_tag: DEFAULT_HEADER_TAG.to_string(),
            id_policy: IdPolicy::Seeded,
            max_id_attempts: 1000,
            resume_id: None,
            init_file: None,
            fixed_file: None,
        }
    }
}

impl RunConfig {
    pub fn new(seed: u64, ensemble: Ensemble, data_label: &str) -> Self {
        Self {
            seed,
            ensemble,
            data_label: data_label.to_string(),
            ..Self::default()
        }
    }

    /// Set the append (restart) flag
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = dir.into();
        self
    }

    pub fn header_tag(mut self, tag: &str) -> Self {
        self.header_tag = tag.to_string();
        self
    }

    pub fn id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    pub fn max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }

    /// Continue the run with this id; implies append mode
    pub fn resume(mut self, run_id: u64) -> Self {
        self.resume_id = Some(run_id);
        self.append = true;
        self
    }

    pub fn init_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_file = Some(path.into());
        self
    }

    pub fn fixed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixed_file = Some(path.into());
        self
    }

    /// Load a config written as JSON; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| FileError::io("config", path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| FileError::config(format!("invalid run config {}: {}", path.display(), e)))
    }

    pub fn naming(&self) -> Result<RunNaming> {
        RunNaming::new(
            self.header_tag.clone(),
            self.ensemble,
            self.data_label.clone(),
            self.base_directory.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let config = RunConfig::new(7, Ensemble::GrandCanonical, "T0.5")
            .base_directory("/tmp/out")
            .header_tag("qmc")
            .init_file("start.dat")
            .resume(1234);

        assert_eq!(config.seed, 7);
        assert!(config.append);
        assert_eq!(config.resume_id, Some(1234));
        assert_eq!(config.header_tag, "qmc");
        assert_eq!(config.init_file, Some(PathBuf::from("start.dat")));
        assert_eq!(config.base_directory, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_loads_partial_json() {
        let config: RunConfig = serde_json::from_str(
            r#"{"seed": 42, "ensemble": "grand_canonical", "data_label": "run1", "id_policy": "timestamped"}"#,
        )
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.ensemble, Ensemble::GrandCanonical);
        assert_eq!(config.id_policy, IdPolicy::Timestamped);
        assert_eq!(config.max_id_attempts, 1000);
        assert!(!config.append);
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        fs::write(&path, r#"{"seed": 9, "data_label": "T1.0", "resume_id": 77, "append": true}"#).unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.data_label, "T1.0");
        assert_eq!(config.resume_id, Some(77));
        assert_eq!(config.base_directory, PathBuf::from("OUTPUT"));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RunConfig::from_json_file(&path),
            Err(FileError::ConfigurationError(_))
        ));
        assert!(matches!(
            RunConfig::from_json_file(temp_dir.path().join("missing.json")),
            Err(FileError::IoError { .. })
        ));
    }

    #[test]
    fn test_timestamped_candidate_offsets_seed() {
        let base = IdPolicy::Timestamped.candidate(0);
        let seeded = IdPolicy::Timestamped.candidate(1000);
        assert!(base > 0);
        assert!(seeded >= base + 1000);
        assert_eq!(IdPolicy::Seeded.candidate(42), 42);
    }
}
