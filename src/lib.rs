//! Replicated state machine seam.
//!
//! Turns a storage engine into a consensus-replicated state machine: writes are
//! submitted as byte-encoded envelopes through a [`Replicator`], every replica
//! applies committed entries in order through [`ReplicatedStore::save`], and
//! lagging or new replicas are bootstrapped from [`ReplicatedStore::backup`]
//! blobs.

mod command;
mod config;
pub mod constants;
mod errors;
pub mod metrics;
mod replication;
mod storage;
pub mod utils;

pub use command::*;
pub use config::*;
pub use errors::*;
pub use replication::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
