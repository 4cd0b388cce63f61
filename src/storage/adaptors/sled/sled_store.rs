//! It works as KV storage for replicated client writes on top of sled.
//!
//! sled has no native per-key dump primitive, so every exported key goes
//! through [`SledDump`], an explicit serialization of the value. The outer
//! snapshot framing is the same as for every other adapter.

use std::ops::Bound;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use sled::IVec;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::init_sled_keyspace_db;
use crate::constants::BACKUP_PAGE_SIZE;
use crate::constants::SLED_KEYSPACE_TREE_PREFIX;
use crate::metrics::APPLIED_COMMANDS;
use crate::metrics::RESTORED_KEYS;
use crate::metrics::SNAPSHOT_SIZE_IN_BYTES_METRIC;
use crate::storage::adaptors::validate_namespace;
use crate::storage::RestoreOutcome;
use crate::KeyspaceSnapshot;
use crate::KvCommand;
use crate::KvOperation;
use crate::ReplicatedStore;
use crate::RestorePolicy;
use crate::Result;
use crate::SnapshotCodec;
use crate::StoreError;

const STORE_LABEL: &str = "sled";
const SLED_DUMP_VERSION: u8 = 1;

/// Per-key export format of the sled adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SledDump {
    pub version: u8,
    pub value: Vec<u8>,
}

impl SledDump {
    pub fn export(value: &[u8]) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&SledDump {
            version: SLED_DUMP_VERSION,
            value: value.to_vec(),
        })?)
    }

    pub fn import(dump: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let dump: SledDump = bincode::deserialize(dump).map_err(|e| e.to_string())?;
        if dump.version != SLED_DUMP_VERSION {
            return Err(format!("unsupported dump version {}", dump.version));
        }
        Ok(dump.value)
    }
}

pub struct SledStore {
    db: sled::Db,
    namespace: u8,
    tree: RwLock<Option<sled::Tree>>,
    restore_policy: RestorePolicy,
}

impl std::fmt::Debug for SledStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("namespace", &self.namespace)
            .field("open", &self.tree.read().is_some())
            .field("restore_policy", &self.restore_policy)
            .finish()
    }
}

impl SledStore {
    /// Open the database under `path` and bind to the tree of `namespace`.
    pub fn open(
        path: impl AsRef<Path> + std::fmt::Debug,
        namespace: i64,
    ) -> Result<Self> {
        let namespace = validate_namespace(namespace)?;
        let db = init_sled_keyspace_db(path)?;
        Self::bind(db, namespace)
    }

    /// Reuse an already opened database handle.
    pub fn with_db(
        db: sled::Db,
        namespace: i64,
    ) -> Result<Self> {
        let namespace = validate_namespace(namespace)?;
        Self::bind(db, namespace)
    }

    fn bind(
        db: sled::Db,
        namespace: u8,
    ) -> Result<Self> {
        let tree = db
            .open_tree(Self::tree_name(namespace))
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        debug!(namespace, "sled keyspace opened");

        Ok(Self {
            db,
            namespace,
            tree: RwLock::new(Some(tree)),
            restore_policy: RestorePolicy::default(),
        })
    }

    pub fn tree_name(namespace: u8) -> String {
        format!("{}{}", SLED_KEYSPACE_TREE_PREFIX, namespace)
    }

    pub fn with_restore_policy(
        mut self,
        policy: RestorePolicy,
    ) -> Self {
        self.restore_policy = policy;
        self
    }

    /// Handle shared with other writers of the same database.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self) -> Result<sled::Tree> {
        self.tree.read().clone().ok_or_else(|| StoreError::Closed.into())
    }

    /// Pages through the ordered tree; the cursor is the last key of the
    /// previous page and `None` marks both start and end of the walk.
    fn extract_all_data(&self) -> Result<KeyspaceSnapshot> {
        let tree = self.tree()?;
        let mut snapshot = KeyspaceSnapshot::new();
        let mut cursor: Option<IVec> = None;

        loop {
            let lower = match cursor.take() {
                Some(last) => Bound::Excluded(last),
                None => Bound::Unbounded,
            };
            let page = tree
                .range::<IVec, _>((lower, Bound::Unbounded))
                .take(BACKUP_PAGE_SIZE)
                .collect::<std::result::Result<Vec<(IVec, IVec)>, sled::Error>>()
                .map_err(|e| StoreError::Backup(format!("page scan: {}", e)))?;

            let full_page = page.len() == BACKUP_PAGE_SIZE;
            cursor = page.last().map(|(key, _)| key.clone());

            for (key, value) in page {
                let key = String::from_utf8(key.to_vec())
                    .map_err(|e| StoreError::Backup(format!("non UTF-8 key: {}", e)))?;
                let dump = SledDump::export(&value)
                    .map_err(|e| StoreError::Backup(format!("dump of key '{}': {}", key, e)))?;
                snapshot.insert(key, dump);
            }

            if !full_page || cursor.is_none() {
                break;
            }
        }

        Ok(snapshot)
    }

    fn load_all_data(
        &self,
        snapshot: &KeyspaceSnapshot,
    ) -> Result<usize> {
        let tree = self.tree()?;
        let mut outcome = RestoreOutcome::new(self.restore_policy);

        for (key, dump) in snapshot.iter() {
            let imported = SledDump::import(dump)
                .and_then(|value| tree.insert(key, value).map_err(|e| e.to_string()));
            match imported {
                Ok(_) => outcome.restored(),
                Err(reason) => outcome.failed(key, reason)?,
            }
        }

        tree.flush().map_err(|e| StoreError::Restore(format!("flush: {}", e)))?;
        outcome.finish()
    }
}

#[async_trait]
impl ReplicatedStore for SledStore {
    type Command = KvCommand;

    async fn close(&self) -> Result<()> {
        let tree = self.tree.write().take().ok_or(StoreError::Closed)?;
        tree.flush_async().await.map_err(|e| {
            warn!(namespace = self.namespace, "flush on close failed: {}", e);
            StoreError::Engine {
                operation: "flush",
                reason: e.to_string(),
            }
        })?;
        info!(namespace = self.namespace, "sled keyspace released");
        Ok(())
    }

    #[instrument(skip(self, command), fields(verb = %command.verb, key = %command.key))]
    async fn save(
        &self,
        command: &KvCommand,
    ) -> Result<()> {
        let tree = self.tree()?;
        match command.operation()? {
            KvOperation::Set { key, value } => {
                tree.insert(key, value).map_err(|e| StoreError::Engine {
                    operation: "set",
                    reason: e.to_string(),
                })?;
                APPLIED_COMMANDS.with_label_values(&[STORE_LABEL, "set"]).inc();
            }
            KvOperation::Del { key } => {
                tree.remove(key).map_err(|e| StoreError::Engine {
                    operation: "del",
                    reason: e.to_string(),
                })?;
                APPLIED_COMMANDS.with_label_values(&[STORE_LABEL, "del"]).inc();
            }
        }
        Ok(())
    }

    async fn backup(&self) -> Result<Vec<u8>> {
        let snapshot = self.extract_all_data()?;
        let blob = SnapshotCodec::encode(&snapshot)?;

        SNAPSHOT_SIZE_IN_BYTES_METRIC
            .with_label_values(&[STORE_LABEL])
            .observe(blob.len() as f64);
        info!(
            namespace = self.namespace,
            keys = snapshot.len(),
            bytes = blob.len(),
            "backup completed"
        );
        Ok(blob)
    }

    async fn restore(
        &self,
        blob: &[u8],
    ) -> Result<()> {
        let snapshot = SnapshotCodec::decode(blob)
            .map_err(|e| StoreError::Restore(format!("undecodable snapshot: {}", e)))?;

        let restored = self.load_all_data(&snapshot)?;
        RESTORED_KEYS.with_label_values(&[STORE_LABEL]).inc_by(restored as u64);
        info!(namespace = self.namespace, restored, "restore completed");
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let tree = self.tree()?;
        let value = tree.get(key).map_err(|e| StoreError::Engine {
            operation: "get",
            reason: e.to_string(),
        })?;
        Ok(value.map(|v| v.to_vec()))
    }
}
