//! Snapshot codec.
//!
//! Every adapter's backup blob has the same outer framing so the consensus layer
//! can move snapshots between nodes without knowing which engine produced them:
//!
//! ```text
//! +-------+---------+-------------------------------------------+
//! | NXSS  | version | zlib( bincode( BTreeMap<String, Vec<u8>> ) ) |
//! +-------+---------+-------------------------------------------+
//! ```
//!
//! The per-key values are opaque engine-native dumps.

use std::collections::BTreeMap;
use std::io::Read;
use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use crate::constants::SNAPSHOT_FORMAT_VERSION;
use crate::constants::SNAPSHOT_MAGIC;
use crate::EncodingError;
use crate::Result;

/// Key -> engine-native dump of that key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyspaceSnapshot {
    entries: BTreeMap<String, Vec<u8>>,
}

impl KeyspaceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the dump of `key`.
    pub fn insert(
        &mut self,
        key: String,
        dump: Vec<u8>,
    ) {
        self.entries.insert(key, dump);
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl FromIterator<(String, Vec<u8>)> for KeyspaceSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

pub struct SnapshotCodec;

impl SnapshotCodec {
    pub fn encode(snapshot: &KeyspaceSnapshot) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&snapshot.entries)?;

        let mut blob = Vec::with_capacity(payload.len() / 2 + SNAPSHOT_MAGIC.len() + 1);
        blob.extend_from_slice(SNAPSHOT_MAGIC);
        blob.push(SNAPSHOT_FORMAT_VERSION);

        let mut encoder = ZlibEncoder::new(blob, Compression::default());
        encoder.write_all(&payload).map_err(EncodingError::Io)?;
        let blob = encoder.finish().map_err(EncodingError::Io)?;

        debug!(
            keys = snapshot.len(),
            raw_bytes = payload.len(),
            blob_bytes = blob.len(),
            "snapshot encoded"
        );
        Ok(blob)
    }

    pub fn decode(blob: &[u8]) -> Result<KeyspaceSnapshot> {
        let header_len = SNAPSHOT_MAGIC.len() + 1;
        if blob.len() < header_len || &blob[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(EncodingError::BadMagic.into());
        }
        let version = blob[SNAPSHOT_MAGIC.len()];
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(EncodingError::UnsupportedVersion(version).into());
        }

        let mut payload = Vec::new();
        ZlibDecoder::new(&blob[header_len..])
            .read_to_end(&mut payload)
            .map_err(EncodingError::Io)?;

        let entries: BTreeMap<String, Vec<u8>> = bincode::deserialize(&payload)?;
        Ok(KeyspaceSnapshot { entries })
    }
}
