//! Shared fixtures for the unit tests of every module.
mod fake_keyspace;

pub use fake_keyspace::*;

use std::time::Duration;

use lazy_static::lazy_static;
use tracing_subscriber::EnvFilter;

use crate::NodeConfig;
use crate::NodeOption;
use crate::RedisStore;

lazy_static! {
    static ref LOGGER_INIT: () = {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    };
}

pub fn enable_logger() {
    lazy_static::initialize(&LOGGER_INIT);
}

/// A Redis-backed store talking to an in-memory keyspace.
pub async fn fake_redis_store(keyspace: &FakeKeyspace) -> RedisStore<FakeKeyspace> {
    RedisStore::with_connection("fake://0", keyspace.clone())
        .await
        .expect("fake keyspace always answers ping")
}

pub fn node_config(
    node_id: i64,
    root: &std::path::Path,
) -> NodeConfig {
    NodeConfig::new(vec![
        NodeOption::NodeId(node_id),
        NodeOption::LogDir(root.join("logs").display().to_string()),
        NodeOption::SnapDir(root.join("snapshots").display().to_string()),
        NodeOption::ClusterUrl("127.0.0.1:9081".to_string()),
        NodeOption::ReplicationTimeout(Duration::from_millis(200)),
    ])
    .expect("valid node options")
}
