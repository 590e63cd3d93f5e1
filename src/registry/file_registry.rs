use super::config::{IdPolicy, RunConfig};
use crate::core::{Ensemble, FileError, FileKind, OpenMode, Result};
use crate::storage::ManagedFile;
use crate::storage::naming::{RUN_ID_WIDTH, RunNaming};
use lazy_static::lazy_static;
use log::{debug, info};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// Process-wide registry for drivers that do not pass one around
lazy_static! {
    static ref GLOBAL_REGISTRY: Mutex<FileRegistry> = Mutex::new(FileRegistry::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Initialized,
    TornDown,
}

/// Everything fixed by `init`
#[derive(Debug)]
struct RunContext {
    naming: RunNaming,
    run_id: u64,
    mode: OpenMode,
    id_policy: IdPolicy,
    max_id_attempts: u32,
    init_file: Option<PathBuf>,
    fixed_file: Option<PathBuf>,
}

impl RunContext {
    fn input_path(&self, kind: FileKind) -> Result<PathBuf> {
        match kind {
            // A restarted run picks up where its own state file left off
            FileKind::Init if self.mode == OpenMode::Append => {
                Ok(self.naming.path_for(FileKind::State, self.run_id))
            }
            FileKind::Init => self.init_file.clone().ok_or_else(|| {
                FileError::config("no initial configuration file configured for a fresh run")
            }),
            FileKind::Fixed => self
                .fixed_file
                .clone()
                .ok_or_else(|| FileError::config("no fixed particle file configured")),
            _ => Ok(self.naming.path_for(kind, self.run_id)),
        }
    }

    fn open_file(&self, kind: FileKind) -> Result<ManagedFile> {
        let path = self.input_path(kind)?;
        let mut file = ManagedFile::new(kind.as_str(), &path);

        if kind.is_input() {
            file.open(OpenMode::Read)?;
            return Ok(file);
        }

        if kind.is_cylinder() {
            let dir = self.naming.directory_for(kind);
            fs::create_dir_all(&dir).map_err(|e| FileError::io(kind.as_str(), &dir, e))?;
        }
        file.open_with_backup(self.mode, path.with_extension("bak"))?;
        Ok(file)
    }
}

/// Owns every file a run reads or writes, keyed by its logical kind
///
/// The registry must be initialized once with [`FileRegistry::init`]; files are
/// then created and opened the first time they are asked for and stay open
/// until [`FileRegistry::shutdown`] or drop.
///
/// # Examples
///
/// ```no_run
/// use simfiles::{Ensemble, FileKind, FileRegistry, RunConfig};
/// use std::io::Write;
///
/// # fn main() -> simfiles::Result<()> {
/// let mut registry = FileRegistry::new();
/// registry.init(RunConfig::new(42, Ensemble::Canonical, "run1"))?;
///
/// writeln!(registry.file(FileKind::Estimator)?, "# E K V").ok();
/// registry.rotate(FileKind::State)?;
/// registry.shutdown()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileRegistry {
    state: RegistryState,
    run: Option<RunContext>,
    catalog: HashMap<FileKind, ManagedFile>,
}

impl FileRegistry {
    /// Get the process-wide registry
    ///
    /// It is created uninitialized on first access and still has to be
    /// initialized before use. Statics are never dropped, so call
    /// [`FileRegistry::shutdown`] before exiting.
    pub fn global() -> &'static Mutex<FileRegistry> {
        &GLOBAL_REGISTRY
    }

    pub fn new() -> Self {
        Self {
            state: RegistryState::Uninitialized,
            run: None,
            catalog: HashMap::new(),
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    /// Fix the run metadata and pick the run id. Allowed exactly once.
    pub fn init(&mut self, config: RunConfig) -> Result<()> {
        match self.state {
            RegistryState::Uninitialized => {}
            RegistryState::Initialized => {
                return Err(FileError::config("file registry is already initialized"));
            }
            RegistryState::TornDown => {
                return Err(FileError::config("file registry has been shut down"));
            }
        }

        let naming = config.naming()?;
        fs::create_dir_all(&naming.base_directory)
            .map_err(|e| FileError::io("directory", &naming.base_directory, e))?;

        // A restart continues the files of an existing run, so its id is taken as
        // given; searching would treat that run's own files as collisions.
        let run_id = if config.append {
            config.resume_id.unwrap_or(config.seed)
        } else {
            naming.unique_id(config.id_policy.candidate(config.seed), config.max_id_attempts)?
        };
        let mode = if config.append { OpenMode::Append } else { OpenMode::Write };

        info!(
            "Run {:0width$} writing to {} ({:?})",
            run_id,
            naming.base_directory.display(),
            mode,
            width = RUN_ID_WIDTH
        );

        self.run = Some(RunContext {
            naming,
            run_id,
            mode,
            id_policy: config.id_policy,
            max_id_attempts: config.max_id_attempts,
            init_file: config.init_file,
            fixed_file: config.fixed_file,
        });
        self.state = RegistryState::Initialized;
        Ok(())
    }

    fn run(&self) -> Result<&RunContext> {
        match (self.state, self.run.as_ref()) {
            (RegistryState::Initialized, Some(run)) => Ok(run),
            (RegistryState::TornDown, _) => Err(FileError::config("file registry has been shut down")),
            _ => Err(FileError::config("file registry used before init")),
        }
    }

    /// Get the file for `kind`, creating and opening it on first use.
    ///
    /// Output files are opened for writing on a fresh run and for appending on a
    /// restart. `init` and `fixed` are inputs and are always opened for reading.
    pub fn file(&mut self, kind: FileKind) -> Result<&mut ManagedFile> {
        let run = match (self.state, self.run.as_ref()) {
            (RegistryState::Initialized, Some(run)) => run,
            (RegistryState::TornDown, _) => {
                return Err(FileError::config(format!(
                    "file registry has been shut down, cannot open '{}' file",
                    kind
                )));
            }
            _ => {
                return Err(FileError::config(format!(
                    "file registry used before init, cannot open '{}' file",
                    kind
                )));
            }
        };

        match self.catalog.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = run.open_file(kind)?;
                debug!("Registered '{}' file {}", kind, file.path().display());
                Ok(entry.insert(file))
            }
        }
    }

    /// Look a file up by its type name, e.g. `"estimator"`
    pub fn file_by_name(&mut self, name: &str) -> Result<&mut ManagedFile> {
        let kind: FileKind = name.parse()?;
        self.file(kind)
    }

    /// Truncate the file of `kind` and reopen it for writing
    pub fn reset(&mut self, kind: FileKind) -> Result<()> {
        Self::ensure_output(kind, "reset")?;
        self.file(kind)?.reset()
    }

    /// Move the content of `kind` to its backup and start a fresh file
    pub fn rotate(&mut self, kind: FileKind) -> Result<()> {
        Self::ensure_output(kind, "rotate")?;
        self.file(kind)?.rename()
    }

    // Input files may point at another run's data or this run's own state file
    fn ensure_output(kind: FileKind, action: &str) -> Result<()> {
        if kind.is_input() {
            return Err(FileError::config(format!(
                "cannot {} '{}': it is an input file",
                action, kind
            )));
        }
        Ok(())
    }

    /// First unused run id for `seed` under this run's naming convention
    pub fn unique_id(&self, seed: u64) -> Result<u64> {
        let run = self.run()?;
        run.naming
            .unique_id(run.id_policy.candidate(seed), run.max_id_attempts)
    }

    /// Where the file of `kind` lives, without opening it
    pub fn path_for(&self, kind: FileKind) -> Result<PathBuf> {
        self.run()?.input_path(kind)
    }

    pub fn run_id(&self) -> Option<u64> {
        self.run.as_ref().map(|run| run.run_id)
    }

    pub fn header_tag(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.naming.header_tag.as_str())
    }

    pub fn base_directory(&self) -> Option<&Path> {
        self.run.as_ref().map(|run| run.naming.base_directory.as_path())
    }

    pub fn ensemble(&self) -> Option<Ensemble> {
        self.run.as_ref().map(|run| run.naming.ensemble)
    }

    pub fn data_label(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.naming.data_label.as_str())
    }

    /// Open mode used for output files
    pub fn mode(&self) -> Option<OpenMode> {
        self.run.as_ref().map(|run| run.mode)
    }

    pub fn contains(&self, kind: FileKind) -> bool {
        self.catalog.contains_key(&kind)
    }

    /// Kinds created so far, in declaration order
    pub fn open_kinds(&self) -> Vec<FileKind> {
        let mut kinds: Vec<FileKind> = self.catalog.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Close every file, keeping them registered. Every file is attempted; the
    /// first failure is returned.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for file in self.catalog.values_mut() {
            if let Err(err) = file.close() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Close and release every file. The registry cannot be used afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == RegistryState::TornDown {
            return Ok(());
        }
        let result = self.close_all();
        self.catalog.clear();
        self.state = RegistryState::TornDown;
        if let Some(run_id) = self.run_id() {
            info!("Run {:0width$} output files closed", run_id, width = RUN_ID_WIDTH);
        }
        result
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
