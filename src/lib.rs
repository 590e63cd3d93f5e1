// ============================================================================
// simfiles: output file registry for restartable simulations
// ============================================================================

pub mod core;
pub mod storage;
pub mod registry;

// Re-export main types for convenience
pub use core::{Ensemble, FileError, FileKind, OpenMode, Result};
pub use storage::{ManagedFile, RunFileName, RunNaming};
pub use registry::{FileRegistry, IdPolicy, RegistryState, RunConfig};
