//! ReplicatedStore
//!
//! The contract a storage engine satisfies to be driven by a consensus log:
//! - Applying one committed command
//! - Exporting the entire engine state as one opaque blob
//! - Importing such a blob to bootstrap a replica
//! - Releasing the owned engine connection

use async_trait::async_trait;
use tracing::warn;

use crate::Envelope;
use crate::Result;
use crate::StoreError;

#[async_trait]
pub trait ReplicatedStore: Send + Sync + 'static {
    /// Envelope shape this adapter applies
    type Command: Envelope;

    /// Release the owned connection.
    ///
    /// Any later call, including a second `close`, fails with a connection error.
    async fn close(&self) -> Result<()>;

    /// Apply exactly one committed command.
    ///
    /// Called strictly in commit order by the apply loop; implementations must be
    /// deterministic: no local time, randomness or node identity may influence the
    /// resulting state unless it is carried inside the command.
    async fn save(
        &self,
        command: &Self::Command,
    ) -> Result<()>;

    /// Export the whole keyspace as one self-contained blob.
    ///
    /// Best-effort under concurrent writers. On failure nothing is returned.
    async fn backup(&self) -> Result<Vec<u8>>;

    /// Replace the content of every key present in `blob`.
    async fn restore(
        &self,
        blob: &[u8],
    ) -> Result<()>;

    /// Read the current value of `key`. Not part of the replicated path.
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>>;
}

/// How `restore` reacts to a key that fails to import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Stop at the first failing key; earlier keys stay restored.
    #[default]
    FailFast,
    /// Attempt every key, then report all failures together.
    Exhaustive,
}

/// Collects per-key import failures according to a [`RestorePolicy`].
#[derive(Debug)]
pub(crate) struct RestoreOutcome {
    policy: RestorePolicy,
    restored: usize,
    failed: Vec<(String, String)>,
}

impl RestoreOutcome {
    pub(crate) fn new(policy: RestorePolicy) -> Self {
        Self {
            policy,
            restored: 0,
            failed: Vec::new(),
        }
    }

    pub(crate) fn restored(&mut self) {
        self.restored += 1;
    }

    /// Record a failed key. Returns an error immediately under `FailFast`.
    pub(crate) fn failed(
        &mut self,
        key: &str,
        reason: String,
    ) -> Result<()> {
        warn!(%key, %reason, "restore of key failed");
        match self.policy {
            RestorePolicy::FailFast => Err(StoreError::Restore(format!(
                "key '{}' failed after {} restored: {}",
                key, self.restored, reason
            ))
            .into()),
            RestorePolicy::Exhaustive => {
                self.failed.push((key.to_string(), reason));
                Ok(())
            }
        }
    }

    /// Number of keys restored, or one error naming every failed key.
    pub(crate) fn finish(self) -> Result<usize> {
        if self.failed.is_empty() {
            return Ok(self.restored);
        }
        let details = self
            .failed
            .iter()
            .map(|(key, reason)| format!("'{}': {}", key, reason))
            .collect::<Vec<_>>()
            .join("; ");
        Err(StoreError::Restore(format!(
            "{} of {} keys failed ({})",
            self.failed.len(),
            self.failed.len() + self.restored,
            details
        ))
        .into())
    }
}
