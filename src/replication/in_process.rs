use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CommittedEntry;
use super::Replicator;
use crate::NodeConfig;
use crate::ReplicationError;
use crate::Result;

#[derive(Debug, Default)]
struct PendingAcks {
    waiters: HashMap<u64, oneshot::Sender<Result<()>>>,
    detached: bool,
}

/// Handle the local replica's apply loop uses to report applied entries back
/// to the submitters waiting in [`InProcessReplicator::replicate`].
#[derive(Debug, Clone)]
pub struct LocalAck {
    pending: Arc<Mutex<PendingAcks>>,
}

impl LocalAck {
    pub fn ack(
        &self,
        index: u64,
        outcome: Result<()>,
    ) {
        if let Some(waiter) = self.pending.lock().waiters.remove(&index) {
            // The submitter may have timed out already.
            let _ = waiter.send(outcome);
        }
    }

    /// The local apply loop is gone: fail every waiter and every later submission.
    pub fn detach(&self) {
        let mut pending = self.pending.lock();
        pending.detached = true;
        pending.waiters.clear();
    }
}

#[derive(Debug, Default)]
struct LogState {
    last_index: u64,
    replicas: Vec<mpsc::UnboundedSender<CommittedEntry>>,
    closed: bool,
}

/// Single-process replicated log.
///
/// Every submission is committed immediately, gets the next index and is
/// delivered to every attached replica in index order.
#[derive(Debug)]
pub struct InProcessReplicator {
    log: Mutex<LogState>,
    pending: Arc<Mutex<PendingAcks>>,
    replication_timeout: Duration,
}

impl InProcessReplicator {
    pub fn new(replication_timeout: Duration) -> Self {
        Self {
            log: Mutex::new(LogState::default()),
            pending: Arc::new(Mutex::new(PendingAcks::default())),
            replication_timeout,
        }
    }

    pub fn for_node(config: &NodeConfig) -> Self {
        Self::new(config.replication_timeout())
    }

    /// Continue numbering after an index already covered by a snapshot.
    pub fn with_last_index(
        self,
        last_index: u64,
    ) -> Self {
        self.log.lock().last_index = last_index;
        self
    }

    /// Attach a replica; it receives every entry committed from now on.
    pub fn attach_replica(&self) -> mpsc::UnboundedReceiver<CommittedEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.log.lock().replicas.push(tx);
        rx
    }

    /// Attach the replica whose apply outcome is reported to submitters.
    pub fn attach_local(&self) -> (mpsc::UnboundedReceiver<CommittedEntry>, LocalAck) {
        let rx = self.attach_replica();
        self.pending.lock().detached = false;
        (
            rx,
            LocalAck {
                pending: self.pending.clone(),
            },
        )
    }

    pub fn last_index(&self) -> u64 {
        self.log.lock().last_index
    }

    fn commit(
        &self,
        payload: Vec<u8>,
        waiter: oneshot::Sender<Result<()>>,
    ) -> Result<u64> {
        let mut log = self.log.lock();
        if log.closed {
            return Err(ReplicationError::Closed.into());
        }
        {
            let mut pending = self.pending.lock();
            if pending.detached {
                return Err(ReplicationError::Closed.into());
            }
            pending.waiters.insert(log.last_index + 1, waiter);
        }

        log.last_index += 1;
        let entry = CommittedEntry {
            index: log.last_index,
            payload,
        };
        log.replicas.retain(|replica| replica.send(entry.clone()).is_ok());
        debug!(index = entry.index, replicas = log.replicas.len(), "entry committed");

        Ok(entry.index)
    }
}

#[async_trait]
impl Replicator for InProcessReplicator {
    async fn replicate(
        &self,
        payload: Vec<u8>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let index = self.commit(payload, tx)?;

        match tokio::time::timeout(self.replication_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ReplicationError::Closed.into()),
            Err(_) => {
                self.pending.lock().waiters.remove(&index);
                warn!(index, timeout = ?self.replication_timeout, "no local acknowledgement");
                Err(ReplicationError::Timeout(self.replication_timeout).into())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut log = self.log.lock();
        if log.closed {
            debug!("replicator already closed");
            return Ok(());
        }
        log.closed = true;
        log.replicas.clear();
        self.pending.lock().waiters.clear();
        info!(last_index = log.last_index, "replicator closed");
        Ok(())
    }
}
