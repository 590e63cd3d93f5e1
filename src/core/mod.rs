pub mod error;
pub mod types;

pub use error::{FileError, Result};
pub use types::{Ensemble, FileKind, OpenMode};
