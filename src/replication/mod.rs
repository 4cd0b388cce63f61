//! Replication client seam.
//!
//! The consensus log itself lives outside this crate. What is modelled here:
//! - [`Replicator`]: submit one encoded command and wait for its local apply
//! - [`ApplyLoop`]: per-replica task applying committed entries in order
//! - [`InProcessReplicator`]: single-process stand-in for the external log
//! - [`execute_line`]: one client input line in, one reply line out
//! - snapshot bootstrap of a replica from the node's snapshot directory

mod apply_loop;
mod bootstrap;
mod in_process;
mod session;

pub use apply_loop::*;
pub use bootstrap::*;
pub use in_process::*;
pub use session::*;

#[cfg(test)]
mod bootstrap_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// One entry of the replicated log, already committed by a quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntry {
    pub index: u64,
    pub payload: Vec<u8>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Replicator: Send + Sync + 'static {
    /// Submit one encoded envelope to the replicated log.
    ///
    /// Returns once the local replica has applied it.
    /// [`crate::ReplicationError::Timeout`] means the outcome is unknown: the
    /// entry may still commit and apply after the caller gave up.
    async fn replicate(
        &self,
        payload: Vec<u8>,
    ) -> Result<()>;

    /// Stop accepting submissions and release the attached replicas.
    async fn close(&self) -> Result<()>;
}
