use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::CommittedEntry;
use super::LocalAck;
use crate::metrics::FAILED_APPLIES;
use crate::Envelope;
use crate::ReplicatedStore;
use crate::ReplicationError;
use crate::Result;

/// What the apply loop does when `save` fails for a committed entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyFailurePolicy {
    /// Stop applying; the replica must be rebuilt from a snapshot.
    #[default]
    Halt,
    /// Count the entry as applied and keep going. Only safe when the failure is
    /// deterministic, i.e. every replica fails the same entry the same way.
    SkipAndLog,
}

pub struct ApplyLoop<S>
where S: ReplicatedStore
{
    node_id: u64,
    store: Arc<S>,
    entries: mpsc::UnboundedReceiver<CommittedEntry>,
    local_ack: Option<LocalAck>,
    policy: ApplyFailurePolicy,
    last_applied: u64,
    // Shutdown signal
    shutdown_signal: watch::Receiver<()>,
}

impl<S> ApplyLoop<S>
where S: ReplicatedStore
{
    pub fn new(
        node_id: u64,
        store: Arc<S>,
        entries: mpsc::UnboundedReceiver<CommittedEntry>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            node_id,
            store,
            entries,
            local_ack: None,
            policy: ApplyFailurePolicy::default(),
            last_applied: 0,
            shutdown_signal,
        }
    }

    pub fn with_local_ack(
        mut self,
        local_ack: LocalAck,
    ) -> Self {
        self.local_ack = Some(local_ack);
        self
    }

    pub fn with_policy(
        mut self,
        policy: ApplyFailurePolicy,
    ) -> Self {
        self.policy = policy;
        self
    }

    /// Entries up to and including `index` are already reflected in the store,
    /// typically because it was restored from the snapshot taken at `index`.
    pub fn with_last_applied(
        mut self,
        index: u64,
    ) -> Self {
        self.last_applied = index;
        self
    }

    /// Apply entries until the log closes or shutdown is signalled.
    ///
    /// Returns the last applied index.
    pub async fn run(mut self) -> Result<u64> {
        let mut shutdown_signal = self.shutdown_signal.clone();
        let result = loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!(node_id = self.node_id, "[ApplyLoop] shutdown signal received.");
                    break Ok(self.last_applied);
                }

                entry = self.entries.recv() => {
                    match entry {
                        Some(entry) => {
                            if let Err(e) = self.apply(entry).await {
                                break Err(e);
                            }
                        }
                        None => {
                            debug!(node_id = self.node_id, "replicated log closed");
                            break Ok(self.last_applied);
                        }
                    }
                }
            }
        };

        if let Some(local_ack) = &self.local_ack {
            local_ack.detach();
        }
        result
    }

    async fn apply(
        &mut self,
        entry: CommittedEntry,
    ) -> Result<()> {
        if entry.index <= self.last_applied {
            debug!(
                index = entry.index,
                last_applied = self.last_applied,
                "entry already applied, skipping"
            );
            return Ok(());
        }

        let outcome = match S::Command::from_bytes(&entry.payload) {
            Ok(command) => self.store.save(&command).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.last_applied = entry.index;
                self.acknowledge(entry.index, Ok(()));
                Ok(())
            }
            Err(e) => {
                FAILED_APPLIES
                    .with_label_values(&[&self.node_id.to_string()])
                    .inc();
                let reason = e.to_string();

                match self.policy {
                    ApplyFailurePolicy::SkipAndLog => {
                        warn!(index = entry.index, %reason, "apply failed, entry skipped");
                        self.last_applied = entry.index;
                        self.acknowledge(entry.index, Err(e));
                        Ok(())
                    }
                    ApplyFailurePolicy::Halt => {
                        error!(index = entry.index, %reason, "apply failed, replica halted");
                        self.acknowledge(entry.index, Err(e));
                        Err(ReplicationError::ApplyHalted {
                            index: entry.index,
                            reason,
                        }
                        .into())
                    }
                }
            }
        }
    }

    fn acknowledge(
        &self,
        index: u64,
        outcome: Result<()>,
    ) {
        if let Some(local_ack) = &self.local_ack {
            local_ack.ack(index, outcome);
        }
    }
}
