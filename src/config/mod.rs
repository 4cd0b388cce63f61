//! Node configuration.
//!
//! A [`NodeConfig`] is always produced by [`NodeConfig::new`] from an ordered
//! list of [`NodeOption`]s. [`NodeConfig::load`] reads the same options from
//! layered sources, with priority:
//! 1. Config file passed by the caller
//! 2. Config file named by `NEXUS_CONFIG_PATH`
//! 3. Environment variables `NEXUS__NODE__*` (highest priority)

mod node;
pub use node::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use tracing::debug;

use crate::Result;

#[derive(Debug, Deserialize)]
struct FileConfig {
    node: RawNodeConfig,
}

/// Untrusted `[node]` table as found in files or environment.
#[derive(Debug, Deserialize)]
struct RawNodeConfig {
    node_id: i64,
    log_dir: String,
    snap_dir: String,
    cluster_url: String,
    replication_timeout_ms: u64,
}

impl RawNodeConfig {
    fn into_options(self) -> Vec<NodeOption> {
        vec![
            NodeOption::NodeId(self.node_id),
            NodeOption::LogDir(self.log_dir),
            NodeOption::SnapDir(self.snap_dir),
            NodeOption::ClusterUrl(self.cluster_url),
            NodeOption::ReplicationTimeout(Duration::from_millis(self.replication_timeout_ms)),
        ]
    }
}

impl NodeConfig {
    /// Load and validate the node configuration from files and environment.
    ///
    /// # Arguments
    /// * `config_path` - Optional TOML file containing a `[node]` table
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        if let Ok(path) = env::var("NEXUS_CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("NEXUS")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let raw: FileConfig = builder.build()?.try_deserialize()?;
        debug!(?raw.node, "loaded raw node config");

        NodeConfig::new(raw.node.into_options())
    }
}
