// -
// Engine limits

/// Highest Redis logical database index (`SELECT 0..=15`)
pub const MAX_NAMESPACE_INDEX: u8 = 15;

/// Host every Redis adapter connects to unless told otherwise
pub const LOCAL_REDIS_HOST: &str = "127.0.0.1";

/// Keys requested per `SCAN` round (and per sled page) during backup
pub(crate) const BACKUP_PAGE_SIZE: usize = 1000;

// -
// Snapshot blob framing

pub(crate) const SNAPSHOT_MAGIC: &[u8; 4] = b"NXSS";
pub(crate) const SNAPSHOT_FORMAT_VERSION: u8 = 1;

/// Sled tree namespaces
pub(crate) const SLED_KEYSPACE_TREE_PREFIX: &str = "keyspace_";

/// Snapshot files
pub(crate) const SNAPSHOT_FILE_PREFIX: &str = "snapshot-";
pub(crate) const SNAPSHOT_FILE_SUFFIX: &str = ".bin";
pub(crate) const SNAPSHOT_TEMP_PREFIX: &str = ".temp-";

/// Per node directory name
pub(crate) const NODE_DIR_PREFIX: &str = "node_";
