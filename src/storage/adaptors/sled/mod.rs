mod sled_store;

pub use sled_store::*;


use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::Result;
use crate::StoreError;

/// Open (or create) the sled database backing a [`SledStore`].
pub fn init_sled_keyspace_db(
    sled_db_root_path: impl AsRef<Path> + std::fmt::Debug
) -> Result<sled::Db> {
    debug!("init_sled_keyspace_db from path: {:?}", &sled_db_root_path);

    let path = sled_db_root_path.as_ref();
    let keyspace_db_path = path.join("keyspace");

    sled::Config::default()
        .path(&keyspace_db_path)
        .cache_capacity(10 * 1024 * 1024) //10MB
        .flush_every_ms(Some(3))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                keyspace_db_path, e
            );
            StoreError::Connection(format!("{}: {}", keyspace_db_path.display(), e)).into()
        })
}
