//! Output file naming convention and run id search
//!
//! Every file produced by a run is named
//! `<header_tag>-<kind>-<ensemble>-<data_label>-<run_id>.dat`, with the run id
//! zero-padded to [`RUN_ID_WIDTH`] digits. The run id is always the last `-`
//! separated token, so analysis tooling can pull it out even when the data label
//! itself contains dashes.

use crate::core::{Ensemble, FileError, FileKind, Result};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_HEADER_TAG: &str = "pimc";
pub const DATA_EXTENSION: &str = "dat";
pub const CYLINDER_DIR: &str = "CYLINDER";
pub const RUN_ID_WIDTH: usize = 9;

lazy_static! {
    static ref RUN_FILE_RE: Regex = Regex::new(
        r"^(?P<tag>[A-Za-z0-9_.]+)-(?P<kind>[a-z_]+)-(?P<ensemble>canonical|grand_canonical)-(?P<data>.+)-(?P<id>[0-9]+)\.dat$"
    )
    .expect("run file name pattern");
}

/// Run metadata that determines every file name of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNaming {
    pub header_tag: String,
    pub ensemble: Ensemble,
    pub data_label: String,
    pub base_directory: PathBuf,
}

impl RunNaming {
    pub fn new(
        header_tag: impl Into<String>,
        ensemble: Ensemble,
        data_label: impl Into<String>,
        base_directory: impl Into<PathBuf>,
    ) -> Result<Self> {
        let naming = Self {
            header_tag: header_tag.into(),
            ensemble,
            data_label: data_label.into(),
            base_directory: base_directory.into(),
        };
        naming.validate()?;
        Ok(naming)
    }

    fn validate(&self) -> Result<()> {
        let tag_ok = !self.header_tag.is_empty()
            && self
                .header_tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !tag_ok {
            return Err(FileError::config(format!(
                "header tag '{}' may only contain letters, digits, '_' and '.'",
                self.header_tag
            )));
        }
        if self.data_label.is_empty() {
            return Err(FileError::config("data label must not be empty"));
        }
        if self.data_label.contains(['/', '\\']) || self.data_label.chars().any(char::is_whitespace) {
            return Err(FileError::config(format!(
                "data label '{}' must not contain path separators or whitespace",
                self.data_label
            )));
        }
        Ok(())
    }

    pub fn file_name(&self, kind: FileKind, run_id: u64) -> String {
        format!(
            "{}-{}-{}-{}-{:0width$}.{}",
            self.header_tag,
            kind,
            self.ensemble,
            self.data_label,
            run_id,
            DATA_EXTENSION,
            width = RUN_ID_WIDTH
        )
    }

    /// Directory a file kind is written to; cylinder estimators get a subdirectory
    pub fn directory_for(&self, kind: FileKind) -> PathBuf {
        if kind.is_cylinder() {
            self.base_directory.join(CYLINDER_DIR)
        } else {
            self.base_directory.clone()
        }
    }

    pub fn path_for(&self, kind: FileKind, run_id: u64) -> PathBuf {
        self.directory_for(kind).join(self.file_name(kind, run_id))
    }

    /// Run ids already used by files with this header tag
    pub fn taken_ids(&self) -> Result<BTreeSet<u64>> {
        taken_ids_in(&self.base_directory, &self.header_tag)
    }

    /// First id at or after `start` that no file on disk uses yet
    pub fn unique_id(&self, start: u64, max_attempts: u32) -> Result<u64> {
        let taken = self.taken_ids()?;
        first_free_id(&taken, start, max_attempts)
    }
}

/// Run ids used by files with `header_tag` in `base` and its cylinder subdirectory.
///
/// Ensemble and data label are ignored: two runs with different parameters
/// must still not share an id.
pub fn taken_ids_in(base: &Path, header_tag: &str) -> Result<BTreeSet<u64>> {
    let mut taken = BTreeSet::new();
    for dir in [base.to_path_buf(), base.join(CYLINDER_DIR)] {
        for parsed in scan_run_files(&dir)? {
            if parsed.header_tag == header_tag {
                taken.insert(parsed.run_id);
            }
        }
    }
    Ok(taken)
}

/// Collisions are resolved by incrementing the candidate; at most
/// `max_attempts` candidates are tried.
pub fn first_free_id(taken: &BTreeSet<u64>, start: u64, max_attempts: u32) -> Result<u64> {
    let mut candidate = start;
    for _ in 0..max_attempts {
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        debug!("Run id {} already in use", candidate);
        candidate = match candidate.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    Err(FileError::IdentifierCollisionExhausted {
        start,
        attempts: max_attempts,
    })
}

/// The parts of a file name written by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFileName {
    pub header_tag: String,
    pub kind: FileKind,
    pub ensemble: Ensemble,
    pub data_label: String,
    pub run_id: u64,
}

impl RunFileName {
    /// Parse a bare file name; anything that is not a run file yields `None`
    pub fn parse(name: &str) -> Option<Self> {
        let caps = RUN_FILE_RE.captures(name)?;
        Some(Self {
            header_tag: caps["tag"].to_string(),
            kind: caps["kind"].parse().ok()?,
            ensemble: caps["ensemble"].parse().ok()?,
            data_label: caps["data"].to_string(),
            run_id: caps["id"].parse().ok()?,
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()?.to_str().and_then(Self::parse)
    }
}

/// Parse every run file directly inside `dir`. A missing directory holds no runs.
pub fn scan_run_files(dir: &Path) -> Result<Vec<RunFileName>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FileError::io("directory", dir, e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FileError::io("directory", dir, e))?;
        if let Some(parsed) = RunFileName::from_path(&entry.path()) {
            found.push(parsed);
        }
    }
    Ok(found)
}
