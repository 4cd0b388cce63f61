//! Command envelopes.
//!
//! An envelope is the unit submitted to the consensus log. Each adapter family
//! defines its own shape; all of them are byte-encodable and must decode back
//! into identical field values on every replica.


use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;
use crate::StoreError;

/// Byte encoding shared by every envelope shape.
pub trait Envelope: Sized + Send + Sync + 'static {
    /// Exact payload handed to [`crate::Replicator::replicate`].
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Inverse of [`Envelope::to_bytes`], used by the apply loop.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Envelope understood by the key-value adapters.
///
/// The verb is carried verbatim so that an unrecognised verb can be reported
/// exactly as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvCommand {
    pub verb: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// Strongly typed operation decoded from a [`KvCommand`] verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOperation<'a> {
    Set { key: &'a str, value: &'a [u8] },
    Del { key: &'a str },
}

impl KvCommand {
    pub fn new(
        verb: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            verb: verb.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn set(
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new("set", key, value)
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self::new("del", key, Vec::new())
    }

    /// Decode the verb (trimmed, case-insensitive) into a typed operation.
    ///
    /// # Errors
    /// [`StoreError::UnknownCommand`] carrying the raw verb text.
    pub fn operation(&self) -> Result<KvOperation<'_>> {
        match self.verb.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(KvOperation::Set {
                key: &self.key,
                value: &self.value,
            }),
            "del" => Ok(KvOperation::Del { key: &self.key }),
            _ => Err(StoreError::UnknownCommand(self.verb.clone()).into()),
        }
    }

    /// Parse one interactive line: `<verb> <key> [value...]`.
    ///
    /// The verb is not validated here; the applying store rejects unknown verbs.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace)?;
        let rest = rest.trim_start();
        let (key, value) = match rest.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (rest, ""),
        };
        if key.is_empty() {
            return None;
        }
        Some(Self::new(verb, key, value.as_bytes()))
    }
}

impl Envelope for KvCommand {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
