use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("File '{0}' is not open")]
    NotOpen(String),

    #[error("No unique run id found after {attempts} attempts starting at {start}")]
    IdentifierCollisionExhausted { start: u64, attempts: u32 },

    #[error("I/O error on '{kind}' file {}: {source}", .path.display())]
    IoError {
        kind: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    pub fn io(kind: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            kind: kind.into(),
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FileError>;
