//! Redis-backed replicated store.
//!
//! Every replica runs its own Redis instance; the adapter owns exactly one
//! connection to it for its whole lifetime. Snapshots are made of the
//! engine-native `DUMP` payload of every key, so value type and expiry survive
//! a backup/restore cycle unchanged.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::constants::BACKUP_PAGE_SIZE;
use crate::constants::LOCAL_REDIS_HOST;
use crate::metrics::APPLIED_COMMANDS;
use crate::metrics::RESTORED_KEYS;
use crate::metrics::SNAPSHOT_SIZE_IN_BYTES_METRIC;
use crate::storage::adaptors::validate_namespace;
use crate::storage::RestoreOutcome;
use crate::ConfigurationError;
use crate::KeyspaceConnection;
use crate::KeyspaceSnapshot;
use crate::KvCommand;
use crate::KvOperation;
use crate::ReplicatedStore;
use crate::RestorePolicy;
use crate::Result;
use crate::SnapshotCodec;
use crate::StoreError;

const STORE_LABEL: &str = "redis";

pub struct RedisStore<C = MultiplexedConnection> {
    target: String,
    connection: Mutex<Option<C>>,
    restore_policy: RestorePolicy,
}

impl<C> std::fmt::Debug for RedisStore<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("target", &self.target)
            .field("restore_policy", &self.restore_policy)
            .finish()
    }
}

impl RedisStore<MultiplexedConnection> {
    /// Connect to the Redis instance on the local host.
    ///
    /// # Errors
    /// - [`ConfigurationError`] if `port` is 0 or `db_index` is outside `[0-15]`
    /// - [`StoreError::Connection`] if the connection or the `PING` fails
    pub async fn connect(
        port: u16,
        db_index: i64,
    ) -> Result<Self> {
        Self::connect_to(LOCAL_REDIS_HOST, port, db_index).await
    }

    pub async fn connect_to(
        host: &str,
        port: u16,
        db_index: i64,
    ) -> Result<Self> {
        if port == 0 {
            return Err(ConfigurationError::InvalidOption {
                option: "port",
                reason: "a valid Redis port must be given".to_string(),
            }
            .into());
        }
        let db = validate_namespace(db_index)?;

        let target = format!("redis://{}:{}/{}", host, port, db);
        let client = redis::Client::open(target.as_str())
            .map_err(|e| StoreError::Connection(format!("{}: {}", target, e)))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", target, e)))?;

        Self::with_connection(target, connection).await
    }
}

impl<C: KeyspaceConnection> RedisStore<C> {
    /// Take ownership of an established connection after a liveness check.
    pub async fn with_connection(
        target: impl Into<String>,
        mut connection: C,
    ) -> Result<Self> {
        let target = target.into();
        connection
            .ping()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: ping failed: {}", target, e)))?;

        info!(endpoint = %target, "redis store connected");
        Ok(Self {
            target,
            connection: Mutex::new(Some(connection)),
            restore_policy: RestorePolicy::default(),
        })
    }

    pub fn with_restore_policy(
        mut self,
        policy: RestorePolicy,
    ) -> Self {
        self.restore_policy = policy;
        self
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(StoreError::Closed)?;
        connection.set(key, value).await.map_err(|e| engine_error("set", e))
    }

    async fn del(
        &self,
        key: &str,
    ) -> Result<()> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(StoreError::Closed)?;
        connection.del(key).await.map_err(|e| engine_error("del", e))
    }

    /// Walks the keyspace with `SCAN` until the cursor returns to 0.
    ///
    /// The walk runs on a cloned handle so `save` is never queued behind it.
    async fn extract_all_data(&self) -> Result<KeyspaceSnapshot> {
        let mut connection = self
            .connection
            .lock()
            .await
            .as_ref()
            .ok_or(StoreError::Closed)?
            .clone();
        let mut snapshot = KeyspaceSnapshot::new();
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys) = connection
                .scan(cursor, BACKUP_PAGE_SIZE)
                .await
                .map_err(|e| StoreError::Backup(format!("scan at cursor {}: {}", cursor, e)))?;

            for key in keys {
                match connection
                    .dump(&key)
                    .await
                    .map_err(|e| StoreError::Backup(format!("dump of key '{}': {}", key, e)))?
                {
                    Some(dump) => snapshot.insert(key, dump),
                    None => debug!(%key, "key removed during backup scan"),
                }
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(snapshot)
    }

    async fn load_all_data(
        &self,
        snapshot: &KeyspaceSnapshot,
    ) -> Result<usize> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(StoreError::Closed)?;
        let mut outcome = RestoreOutcome::new(self.restore_policy);

        for (key, dump) in snapshot.iter() {
            match connection.restore_replace(key, dump).await {
                Ok(()) => outcome.restored(),
                Err(e) => outcome.failed(key, e.to_string())?,
            }
        }
        outcome.finish()
    }
}

#[async_trait]
impl<C: KeyspaceConnection> ReplicatedStore for RedisStore<C> {
    type Command = KvCommand;

    async fn close(&self) -> Result<()> {
        match self.connection.lock().await.take() {
            Some(connection) => {
                drop(connection);
                info!(endpoint = %self.target, "redis connection released");
                Ok(())
            }
            None => {
                warn!(endpoint = %self.target, "close called on a closed store");
                Err(StoreError::Closed.into())
            }
        }
    }

    #[instrument(skip(self, command), fields(verb = %command.verb, key = %command.key))]
    async fn save(
        &self,
        command: &KvCommand,
    ) -> Result<()> {
        match command.operation()? {
            KvOperation::Set { key, value } => {
                self.set(key, value).await?;
                APPLIED_COMMANDS.with_label_values(&[STORE_LABEL, "set"]).inc();
            }
            KvOperation::Del { key } => {
                self.del(key).await?;
                APPLIED_COMMANDS.with_label_values(&[STORE_LABEL, "del"]).inc();
            }
        }
        Ok(())
    }

    async fn backup(&self) -> Result<Vec<u8>> {
        let snapshot = self.extract_all_data().await?;
        let blob = SnapshotCodec::encode(&snapshot)?;

        SNAPSHOT_SIZE_IN_BYTES_METRIC
            .with_label_values(&[STORE_LABEL])
            .observe(blob.len() as f64);
        info!(endpoint = %self.target, keys = snapshot.len(), bytes = blob.len(), "backup completed");
        Ok(blob)
    }

    async fn restore(
        &self,
        blob: &[u8],
    ) -> Result<()> {
        let snapshot = SnapshotCodec::decode(blob)
            .map_err(|e| StoreError::Restore(format!("undecodable snapshot: {}", e)))?;

        let restored = self.load_all_data(&snapshot).await?;
        RESTORED_KEYS.with_label_values(&[STORE_LABEL]).inc_by(restored as u64);
        info!(endpoint = %self.target, restored, "restore completed");
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(StoreError::Closed)?;
        connection.get(key).await.map_err(|e| engine_error("get", e))
    }
}

fn engine_error(
    operation: &'static str,
    e: redis::RedisError,
) -> crate::Error {
    StoreError::Engine {
        operation,
        reason: e.to_string(),
    }
    .into()
}
