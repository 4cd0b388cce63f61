use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::ConfigurationError;
use crate::Error;

fn cleanup_all_nexus_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("NEXUS__") || key == "NEXUS_CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

fn valid_options() -> Vec<NodeOption> {
    vec![
        NodeOption::NodeId(1),
        NodeOption::LogDir("/tmp/l".to_string()),
        NodeOption::SnapDir("/tmp/s".to_string()),
        NodeOption::ClusterUrl("10.0.0.1:9000,10.0.0.2:9000".to_string()),
        NodeOption::ReplicationTimeout(Duration::from_secs(5)),
    ]
}

fn assert_invalid_option(
    result: crate::Result<NodeConfig>,
    expected: &str,
) {
    match result {
        Err(Error::Configuration(ConfigurationError::InvalidOption { option, .. })) => {
            assert_eq!(option, expected)
        }
        other => panic!("expected invalid `{}` option, got {:?}", expected, other),
    }
}

#[test]
fn valid_options_should_build_config_with_derived_dirs() {
    let config = NodeConfig::new(valid_options()).expect("should succeed");

    assert_eq!(config.node_id(), 1);
    assert_eq!(config.log_dir(), PathBuf::from("/tmp/l/node_1"));
    assert_eq!(config.snap_dir(), PathBuf::from("/tmp/s/node_1"));
    assert_eq!(
        config.cluster_urls(),
        vec!["10.0.0.1:9000".to_string(), "10.0.0.2:9000".to_string()]
    );
    assert_eq!(config.replication_timeout(), Duration::from_secs(5));
}

#[test]
fn cluster_urls_should_split_without_trimming_or_dedup() {
    let mut options = valid_options();
    options[3] = NodeOption::ClusterUrl("a,b,c".to_string());
    let config = NodeConfig::new(options.clone()).unwrap();
    assert_eq!(config.cluster_urls(), vec!["a", "b", "c"]);

    options[3] = NodeOption::ClusterUrl("a".to_string());
    let config = NodeConfig::new(options.clone()).unwrap();
    assert_eq!(config.cluster_urls(), vec!["a"]);

    options[3] = NodeOption::ClusterUrl("a, b,a".to_string());
    let config = NodeConfig::new(options).unwrap();
    assert_eq!(config.cluster_urls(), vec!["a", " b", "a"]);
}

#[test]
fn each_invalid_option_should_fail_naming_that_option() {
    let cases = vec![
        (0, NodeOption::NodeId(0), "node_id"),
        (0, NodeOption::NodeId(-3), "node_id"),
        (1, NodeOption::LogDir("".to_string()), "log_dir"),
        (1, NodeOption::LogDir("   ".to_string()), "log_dir"),
        (2, NodeOption::SnapDir("\t".to_string()), "snap_dir"),
        (3, NodeOption::ClusterUrl(" ".to_string()), "cluster_url"),
        (4, NodeOption::ReplicationTimeout(Duration::ZERO), "replication_timeout"),
    ];

    for (position, bad, expected) in cases {
        let mut options = valid_options();
        options[position] = bad;
        assert_invalid_option(NodeConfig::new(options), expected);
    }
}

#[test]
fn first_failing_option_should_abort_construction() {
    let options = vec![
        NodeOption::NodeId(1),
        NodeOption::LogDir("".to_string()),
        NodeOption::SnapDir("".to_string()),
    ];
    assert_invalid_option(NodeConfig::new(options), "log_dir");
}

#[test]
fn missing_option_should_fail() {
    let mut options = valid_options();
    options.pop();

    match NodeConfig::new(options) {
        Err(Error::Configuration(ConfigurationError::MissingOption(name))) => {
            assert_eq!(name, "replication_timeout")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn later_option_should_overwrite_earlier_value() {
    let mut options = valid_options();
    options.push(NodeOption::NodeId(7));

    let config = NodeConfig::new(options).unwrap();
    assert_eq!(config.log_dir(), PathBuf::from("/tmp/l/node_7"));
}

#[test]
#[serial]
fn load_should_read_node_table_from_file() {
    cleanup_all_nexus_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("node.toml");
    std::fs::write(
        &config_path,
        r#"
        [node]
        node_id = 2
        log_dir = "/tmp/nexus/logs"
        snap_dir = "/tmp/nexus/snaps"
        cluster_url = "127.0.0.1:9001,127.0.0.1:9002"
        replication_timeout_ms = 1500
        "#,
    )
    .unwrap();

    let config = NodeConfig::load(Some(config_path.to_str().unwrap())).expect("should succeed");

    assert_eq!(config.node_id(), 2);
    assert_eq!(config.snap_dir(), PathBuf::from("/tmp/nexus/snaps/node_2"));
    assert_eq!(config.replication_timeout(), Duration::from_millis(1500));
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_nexus_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("node.toml");
    std::fs::write(
        &config_path,
        r#"
        [node]
        node_id = 2
        log_dir = "/tmp/nexus/logs"
        snap_dir = "/tmp/nexus/snaps"
        cluster_url = "127.0.0.1:9001"
        replication_timeout_ms = 1500
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("NEXUS_CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("NEXUS__NODE__NODE_ID", Some("9")),
        ],
        || {
            let config = NodeConfig::load(None).unwrap();
            assert_eq!(config.node_id(), 9);
            assert_eq!(config.log_dir(), PathBuf::from("/tmp/nexus/logs/node_9"));
        },
    );
}

#[test]
#[serial]
fn loaded_values_should_go_through_option_validation() {
    cleanup_all_nexus_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("node.toml");
    std::fs::write(
        &config_path,
        r#"
        [node]
        node_id = 1
        log_dir = "/tmp/nexus/logs"
        snap_dir = "/tmp/nexus/snaps"
        cluster_url = "127.0.0.1:9001"
        replication_timeout_ms = 0
        "#,
    )
    .unwrap();

    assert_invalid_option(
        NodeConfig::load(Some(config_path.to_str().unwrap())),
        "replication_timeout",
    );
}

#[test]
#[serial]
fn load_without_node_table_should_fail() {
    cleanup_all_nexus_env_vars();
    let result = NodeConfig::load(None);
    assert!(matches!(
        result,
        Err(Error::Configuration(ConfigurationError::Load(_)))
    ));
}
