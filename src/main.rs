use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use nexus_sm::constants::LOCAL_REDIS_HOST;
use nexus_sm::utils::file_io::open_file_for_append;
use nexus_sm::ApplyFailurePolicy;
use nexus_sm::ApplyLoop;
use nexus_sm::ConfigurationError;
use nexus_sm::execute_line;
use nexus_sm::InProcessReplicator;
use nexus_sm::KvCommand;
use nexus_sm::NodeConfig;
use nexus_sm::NodeOption;
use nexus_sm::RedisStore;
use nexus_sm::ReplicatedStore;
use nexus_sm::Replicator;
use nexus_sm::Result;
use nexus_sm::SledStore;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreKind {
    Redis,
    Sled,
}

impl StoreKind {
    fn prompt(self) -> &'static str {
        match self {
            StoreKind::Redis => "redis> ",
            StoreKind::Sled => "sled> ",
        }
    }
}

/// Apply key-value commands to a local store through the replicated log.
#[derive(Debug, Parser)]
#[command(name = "nexus-repl", version)]
struct Cli {
    /// Engine behind the store
    #[arg(value_enum)]
    kind: StoreKind,

    /// Redis `port` or `host:port`, or the sled data directory
    target: String,

    /// One command to apply, e.g. `set k v`; stdin is read when absent
    expression: Vec<String>,

    /// Logical keyspace [0-15]
    #[arg(long, default_value_t = 0)]
    namespace: i64,

    /// Node config file; defaults are used when neither this nor
    /// `NEXUS_CONFIG_PATH` is set
    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    #[arg(long, default_value = "./logs")]
    log_dir: String,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = node_config(&cli)?;

    // Initializing Logs
    let _guard = init_observability(settings.node_id(), &settings.log_dir())?;

    let expression = (!cli.expression.is_empty()).then(|| cli.expression.join(" "));
    match cli.kind {
        StoreKind::Redis => {
            let (host, port) = parse_redis_target(&cli.target)?;
            let store = RedisStore::connect_to(host, port, cli.namespace).await?;
            run_session(Arc::new(store), &settings, cli.kind, expression).await
        }
        StoreKind::Sled => {
            let store = SledStore::open(&cli.target, cli.namespace)?;
            run_session(Arc::new(store), &settings, cli.kind, expression).await
        }
    }
}

fn node_config(cli: &Cli) -> Result<NodeConfig> {
    if cli.config.is_some() || std::env::var("NEXUS_CONFIG_PATH").is_ok() {
        return NodeConfig::load(cli.config.as_deref());
    }
    NodeConfig::new(vec![
        NodeOption::NodeId(1),
        NodeOption::LogDir(cli.log_dir.clone()),
        NodeOption::SnapDir("./snapshots".to_string()),
        NodeOption::ClusterUrl(LOCAL_REDIS_HOST.to_string()),
        NodeOption::ReplicationTimeout(Duration::from_millis(cli.timeout_ms)),
    ])
}

fn parse_redis_target(target: &str) -> Result<(&str, u16)> {
    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (LOCAL_REDIS_HOST, target),
    };
    let port = port.parse::<u16>().map_err(|e| ConfigurationError::InvalidOption {
        option: "port",
        reason: format!("'{}': {}", port, e),
    })?;
    Ok((host, port))
}

/// Drives every command through a single-node loopback log so that the store
/// sees exactly what a replica would see.
async fn run_session<S>(
    store: Arc<S>,
    settings: &NodeConfig,
    kind: StoreKind,
    expression: Option<String>,
) -> Result<()>
where
    S: ReplicatedStore<Command = KvCommand>,
{
    let replicator = InProcessReplicator::for_node(settings);
    let (entry_rx, local_ack) = replicator.attach_local();
    let (graceful_tx, graceful_rx) = watch::channel(());

    let apply_loop = ApplyLoop::new(settings.node_id(), store.clone(), entry_rx, graceful_rx)
        .with_local_ack(local_ack)
        .with_policy(ApplyFailurePolicy::SkipAndLog);
    let apply_handle = tokio::spawn(apply_loop.run());
    info!(node_id = settings.node_id(), "session started");

    match expression {
        Some(line) => println!("{}", execute_line(&*store, &replicator, &line).await),
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("{}", kind.prompt());
                let _ = std::io::stdout().flush();

                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("stdin: {}", e);
                        break;
                    }
                };
                println!("{}", execute_line(&*store, &replicator, &line).await);
            }
        }
    }

    // Closing the log ends the apply loop once every entry is applied.
    replicator.close().await?;
    match apply_handle.await {
        Ok(Ok(last_applied)) => info!(last_applied, "apply loop stopped"),
        Ok(Err(e)) => error!("apply loop stopped: {}", e),
        Err(e) => error!("apply loop task failed: {:?}", e),
    }
    drop(graceful_tx);

    if let Err(e) = store.close().await {
        warn!("store close: {}", e);
    }
    Ok(())
}

pub fn init_observability(
    node_id: u64,
    log_dir: &Path,
) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(log_dir.join("nexus.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    info!(node_id, "logging to {}", log_dir.display());
    Ok(guard)
}
