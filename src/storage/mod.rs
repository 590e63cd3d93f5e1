pub mod managed_file;
pub mod naming;

pub use managed_file::ManagedFile;
pub use naming::{RunFileName, RunNaming, scan_run_files};
