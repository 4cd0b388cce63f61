use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::constants::NODE_DIR_PREFIX;
use crate::ConfigurationError;
use crate::Result;

/// One independently validated setter of a [`NodeConfig`] field.
///
/// Options are applied in the order given to [`NodeConfig::new`]; the first
/// option whose value violates its constraint aborts construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOption {
    /// Node identity, strictly greater than 0
    NodeId(i64),
    /// Root of the per-node raft log directories
    LogDir(String),
    /// Root of the per-node snapshot directories
    SnapDir(String),
    /// Comma delimited peer addresses
    ClusterUrl(String),
    /// Upper bound a submitter waits for local commit acknowledgement
    ReplicationTimeout(Duration),
}

impl NodeOption {
    pub fn name(&self) -> &'static str {
        match self {
            NodeOption::NodeId(_) => "node_id",
            NodeOption::LogDir(_) => "log_dir",
            NodeOption::SnapDir(_) => "snap_dir",
            NodeOption::ClusterUrl(_) => "cluster_url",
            NodeOption::ReplicationTimeout(_) => "replication_timeout",
        }
    }

    fn apply(
        self,
        draft: &mut NodeConfigDraft,
    ) -> Result<()> {
        let option = self.name();
        match self {
            NodeOption::NodeId(id) => {
                if id <= 0 {
                    return Err(invalid(option, "must be strictly greater than 0"));
                }
                let id = u64::try_from(id).map_err(|e| invalid(option, &e.to_string()))?;
                draft.node_id = Some(id);
            }
            NodeOption::LogDir(dir) => {
                draft.log_dir_root = Some(non_blank(option, dir, "raft log dir must not be empty")?);
            }
            NodeOption::SnapDir(dir) => {
                draft.snap_dir_root =
                    Some(non_blank(option, dir, "raft snapshot dir must not be empty")?);
            }
            NodeOption::ClusterUrl(url) => {
                if url.trim().is_empty() {
                    return Err(invalid(option, "raft cluster url must not be empty"));
                }
                draft.cluster_url = Some(url);
            }
            NodeOption::ReplicationTimeout(timeout) => {
                if timeout.is_zero() {
                    return Err(invalid(option, "must be strictly greater than 0"));
                }
                draft.replication_timeout = Some(timeout);
            }
        }
        Ok(())
    }
}

fn invalid(
    option: &'static str,
    reason: &str,
) -> crate::Error {
    ConfigurationError::InvalidOption {
        option,
        reason: reason.to_string(),
    }
    .into()
}

fn non_blank(
    option: &'static str,
    dir: String,
    reason: &str,
) -> Result<PathBuf> {
    if dir.trim().is_empty() {
        return Err(invalid(option, reason));
    }
    Ok(PathBuf::from(dir))
}

#[derive(Default)]
struct NodeConfigDraft {
    node_id: Option<u64>,
    log_dir_root: Option<PathBuf>,
    snap_dir_root: Option<PathBuf>,
    cluster_url: Option<String>,
    replication_timeout: Option<Duration>,
}

/// Validated, read-only configuration of one cluster node.
///
/// Construction is the only mutation point; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    node_id: u64,
    log_dir_root: PathBuf,
    snap_dir_root: PathBuf,
    cluster_url: String,
    replication_timeout: Duration,
}

impl NodeConfig {
    /// Applies `options` in order and returns the validated configuration.
    ///
    /// # Errors
    /// - [`ConfigurationError::InvalidOption`] naming the first offending option
    /// - [`ConfigurationError::MissingOption`] if any field was never supplied
    pub fn new(options: impl IntoIterator<Item = NodeOption>) -> Result<Self> {
        let mut draft = NodeConfigDraft::default();
        for option in options {
            option.apply(&mut draft)?;
        }

        let config = NodeConfig {
            node_id: draft.node_id.ok_or(ConfigurationError::MissingOption("node_id"))?,
            log_dir_root: draft.log_dir_root.ok_or(ConfigurationError::MissingOption("log_dir"))?,
            snap_dir_root: draft
                .snap_dir_root
                .ok_or(ConfigurationError::MissingOption("snap_dir"))?,
            cluster_url: draft
                .cluster_url
                .ok_or(ConfigurationError::MissingOption("cluster_url"))?,
            replication_timeout: draft
                .replication_timeout
                .ok_or(ConfigurationError::MissingOption("replication_timeout"))?,
        };
        debug!(?config, "node config constructed");
        Ok(config)
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// `<log_dir_root>/node_<node_id>`
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir_root.join(self.node_dir_name())
    }

    /// `<snap_dir_root>/node_<node_id>`
    pub fn snap_dir(&self) -> PathBuf {
        self.snap_dir_root.join(self.node_dir_name())
    }

    /// Peer addresses in configured order. Entries are neither trimmed nor deduplicated.
    pub fn cluster_urls(&self) -> Vec<String> {
        self.cluster_url.split(',').map(str::to_string).collect()
    }

    pub fn replication_timeout(&self) -> Duration {
        self.replication_timeout
    }

    fn node_dir_name(&self) -> String {
        format!("{}{}", NODE_DIR_PREFIX, self.node_id)
    }
}
