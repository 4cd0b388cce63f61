mod redis;
mod sled;

pub use self::redis::*;
pub use self::sled::*;

use crate::constants::MAX_NAMESPACE_INDEX;
use crate::ConfigurationError;
use crate::Result;

/// Both adapters address one logical namespace in `0..=MAX_NAMESPACE_INDEX`.
pub(crate) fn validate_namespace(index: i64) -> Result<u8> {
    if !(0..=MAX_NAMESPACE_INDEX as i64).contains(&index) {
        return Err(ConfigurationError::InvalidOption {
            option: "namespace",
            reason: format!("index {} outside [0-{}]", index, MAX_NAMESPACE_INDEX),
        }
        .into());
    }
    Ok(index as u8)
}
