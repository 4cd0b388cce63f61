mod adaptors;
mod replicated_store;
mod snapshot;
mod snapshot_path_manager;

#[doc(hidden)]
pub use adaptors::*;
pub use replicated_store::*;
pub use snapshot::*;
pub use snapshot_path_manager::*;
