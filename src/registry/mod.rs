pub mod config;
pub mod file_registry;

pub use config::{IdPolicy, RunConfig};
pub use file_registry::{FileRegistry, RegistryState};
