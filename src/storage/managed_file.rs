//! A single logical file with its backup path and open handle

use crate::core::{FileError, OpenMode, Result};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BACKUP_EXTENSION: &str = "bak";

/// Owns one output or input file: where it lives, where its backup goes and
/// the stream currently bound to it.
///
/// At most one handle is open at a time. Dropping the file closes it.
#[derive(Debug)]
pub struct ManagedFile {
    kind: String,
    path: PathBuf,
    backup_path: PathBuf,
    handle: Option<File>,
    mode: Option<OpenMode>,
}

impl ManagedFile {
    /// Create an unopened file. The backup path defaults to `path` with a `.bak` extension.
    pub fn new(kind: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_path = path.with_extension(BACKUP_EXTENSION);
        Self {
            kind: kind.into(),
            path,
            backup_path,
            handle: None,
            mode: None,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Mode of the open handle, `None` when closed
    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Open the current path, closing any handle that is already open.
    pub fn open(&mut self, mode: OpenMode) -> Result<()> {
        self.close()?;
        let file = mode
            .options()
            .open(&self.path)
            .map_err(|e| FileError::io(&self.kind, &self.path, e))?;
        debug!("Opened '{}' file {} ({:?})", self.kind, self.path.display(), mode);
        self.handle = Some(file);
        self.mode = Some(mode);
        Ok(())
    }

    /// Record where rotations should put the previous content, then open.
    /// Nothing is moved here.
    pub fn open_with_backup(&mut self, mode: OpenMode, backup_path: impl Into<PathBuf>) -> Result<()> {
        self.backup_path = backup_path.into();
        self.open(mode)
    }

    /// Discard the current content and reopen an empty file for writing
    pub fn reset(&mut self) -> Result<()> {
        self.open(OpenMode::Write)?;
        debug!("Reset '{}' file {}", self.kind, self.path.display());
        Ok(())
    }

    /// Rotate: the current content becomes the backup and a fresh current file is opened.
    ///
    /// The backup is written to a temporary file next to it and swapped in with a
    /// single rename, so the previous backup survives until the new one is complete.
    /// The current file is only truncated after that swap. If anything fails before
    /// then, the current file is left as it was and its handle is reopened without
    /// truncation.
    pub fn rename(&mut self) -> Result<()> {
        let restore = self.mode.map(OpenMode::preserving);

        if let Err(err) = self.close().and_then(|()| self.commit_backup()) {
            if let Some(mode) = restore {
                if let Err(reopen_err) = self.open(mode) {
                    warn!(
                        "Failed to reopen '{}' file {} after aborted rotation: {}",
                        self.kind,
                        self.path.display(),
                        reopen_err
                    );
                }
            }
            return Err(err);
        }

        self.open(OpenMode::Write)?;
        debug!(
            "Rotated '{}' file {} -> {}",
            self.kind,
            self.path.display(),
            self.backup_path.display()
        );
        Ok(())
    }

    fn commit_backup(&self) -> Result<()> {
        let backup_dir = match self.backup_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut source = File::open(&self.path).map_err(|e| FileError::io(&self.kind, &self.path, e))?;
        let mut staged =
            NamedTempFile::new_in(backup_dir).map_err(|e| FileError::io(&self.kind, backup_dir, e))?;

        io::copy(&mut source, staged.as_file_mut())
            .map_err(|e| FileError::io(&self.kind, &self.backup_path, e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| FileError::io(&self.kind, &self.backup_path, e))?;

        staged
            .persist(&self.backup_path)
            .map_err(|e| FileError::io(&self.kind, &self.backup_path, e.error))?;
        Ok(())
    }

    /// Flush and release the handle. Closing a closed file does nothing.
    pub fn close(&mut self) -> Result<()> {
        let mode = self.mode.take();
        if let Some(mut file) = self.handle.take() {
            if mode != Some(OpenMode::Read) {
                file.flush().map_err(|e| FileError::io(&self.kind, &self.path, e))?;
                file.sync_all().map_err(|e| FileError::io(&self.kind, &self.path, e))?;
            }
            debug!("Closed '{}' file {}", self.kind, self.path.display());
        }
        Ok(())
    }

    /// Borrow the open stream
    pub fn stream(&mut self) -> Result<&mut File> {
        self.handle
            .as_mut()
            .ok_or_else(|| FileError::NotOpen(self.kind.clone()))
    }

    fn io_handle(&mut self) -> io::Result<&mut File> {
        match self.handle.as_mut() {
            Some(file) => Ok(file),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("file '{}' is not open", self.kind),
            )),
        }
    }
}

impl Write for ManagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io_handle()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.handle.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Read for ManagedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.io_handle()?.read(buf)
    }
}

impl Drop for ManagedFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to close '{}' file: {}", self.kind, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_write_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("estimator.dat");
        let mut file = ManagedFile::new("estimator", &path);
        assert!(!file.is_open());

        file.open(OpenMode::Write).unwrap();
        file.write_all(b"# E K V\n").unwrap();

        assert!(file.is_open());
        assert_eq!(file.mode(), Some(OpenMode::Write));
        assert_eq!(fs::read(&path).unwrap(), b"# E K V\n");
        assert_eq!(file.backup_path(), temp_dir.path().join("estimator.bak"));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("log.dat");
        let mut file = ManagedFile::new("log", &path);

        let err = file.open(OpenMode::Write).unwrap_err();
        match err {
            FileError::IoError { kind, path: err_path, .. } => {
                assert_eq!(kind, "log");
                assert_eq!(err_path, path);
            }
            other => panic!("expected IoError, got {:?}", other),
        }
        assert!(!file.is_open());
    }

    #[test]
    fn test_stream_before_open_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = ManagedFile::new("state", temp_dir.path().join("state.dat"));
        assert!(matches!(file.stream(), Err(FileError::NotOpen(_))));
        assert!(file.write_all(b"x").is_err());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fixed.dat");
        let mut file = ManagedFile::new("fixed", &path);
        file.open(OpenMode::Append).unwrap();
        file.write_all(b"stale coordinates\n").unwrap();

        file.reset().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(file.mode(), Some(OpenMode::Write));

        file.reset().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(file.mode(), Some(OpenMode::Write));
        assert!(file.is_open());
    }

    #[test]
    fn test_rename_moves_content_to_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.dat");
        let mut file = ManagedFile::new("state", &path);
        file.open(OpenMode::Write).unwrap();
        file.write_all(b"snapshot 1").unwrap();

        file.rename().unwrap();

        assert_eq!(fs::read(file.backup_path()).unwrap(), b"snapshot 1");
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(file.mode(), Some(OpenMode::Write));

        file.write_all(b"snapshot 2").unwrap();
        file.rename().unwrap();
        assert_eq!(fs::read(file.backup_path()).unwrap(), b"snapshot 2");
    }

    #[test]
    fn test_rename_uses_recorded_backup_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.dat");
        let backup = temp_dir.path().join("previous-state.dat");
        let mut file = ManagedFile::new("state", &path);
        file.open_with_backup(OpenMode::Write, &backup).unwrap();
        assert!(!backup.exists());

        file.write_all(b"abc").unwrap();
        file.rename().unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"abc");
    }

    #[test]
    fn test_failed_rename_keeps_current_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.dat");
        let backup = temp_dir.path().join("state.bak");
        // A non-empty directory in the way cannot be replaced by a file
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("occupied"), b"x").unwrap();

        let mut file = ManagedFile::new("state", &path);
        file.open_with_backup(OpenMode::Write, &backup).unwrap();
        file.write_all(b"valid state").unwrap();

        let err = file.rename().unwrap_err();
        assert!(matches!(err, FileError::IoError { .. }));

        assert_eq!(fs::read(&path).unwrap(), b"valid state");
        assert!(file.is_open());
        assert_eq!(file.mode(), Some(OpenMode::Append));

        file.write_all(b" more").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"valid state more");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_rename_restores_handle_when_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.fifo");
        let created = std::process::Command::new("mkfifo").arg(&path).status();
        if !matches!(created, Ok(status) if status.success()) {
            return;
        }

        // fsync on a FIFO fails with EINVAL, so closing for rotation fails
        let mut file = ManagedFile::new("state", &path);
        file.open(OpenMode::Write).unwrap();

        let err = file.rename().unwrap_err();
        assert!(matches!(err, FileError::IoError { .. }));
        assert!(file.is_open());
        assert_eq!(file.mode(), Some(OpenMode::Append));
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_close_twice_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = ManagedFile::new("worm", temp_dir.path().join("worm.dat"));
        file.open(OpenMode::Write).unwrap();
        file.close().unwrap();
        file.close().unwrap();
        assert!(!file.is_open());
        assert_eq!(file.mode(), None);
    }

    #[test]
    fn test_read_mode_reads_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("init.dat");
        fs::write(&path, b"0.1 0.2 0.3\n").unwrap();

        let mut file = ManagedFile::new("init", &path);
        file.open(OpenMode::Read).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "0.1 0.2 0.3\n");
    }
}
