//! Replicated State Machine Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: node configuration,
//! the storage adapters, the snapshot/envelope codecs and the replication
//! boundary. Adapters never retry; every error is surfaced to the caller
//! (the apply loop or a manual tool).

use std::time::Duration;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid node options or unreadable configuration sources
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Engine adapter failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Snapshot blob or command envelope (de)serialization failures
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Failures at the command submission boundary
    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// An option value violated its constraint
    #[error("Invalid option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    /// Construction finished without the option ever being supplied
    #[error("Missing option `{0}`")]
    MissingOption(&'static str),

    /// Layered file/environment loading failed
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Engine connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// The owned connection has already been released
    #[error("Store connection already closed")]
    Closed,

    /// Envelope verb not recognised by the adapter; engine state unchanged
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),

    /// A primitive mutation (set/del) failed on the engine
    #[error("Engine operation `{operation}` failed: {reason}")]
    Engine {
        operation: &'static str,
        reason: String,
    },

    /// Enumeration or per-key export failure; no snapshot was produced
    #[error("Backup failed: {0}")]
    Backup(String),

    /// Blob decode or per-key import failure; the store may be partially restored
    #[error("Restore failed: {0}")]
    Restore(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Compression stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot blob does not start with the expected magic header")]
    BadMagic,

    #[error("Unsupported snapshot format version {0}")]
    UnsupportedVersion(u8),
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// The submitter stopped waiting; the entry may still commit later
    #[error("Replication outcome unknown: no local acknowledgement within {0:?}")]
    Timeout(Duration),

    /// The submission channel has been released
    #[error("Replication channel closed")]
    Closed,

    /// The local apply loop stopped after a failed entry
    #[error("Apply loop halted at index {index}: {reason}")]
    ApplyHalted { index: u64, reason: String },
}

impl Error {
    /// True when the command may or may not have been committed.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::Replication(ReplicationError::Timeout(_)))
    }
}

// ============== Conversion Implementations ============== //
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Encoding(EncodingError::Bincode(e))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Configuration(ConfigurationError::Load(e))
    }
}
