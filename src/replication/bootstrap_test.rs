use tempfile::tempdir;

use super::*;
use crate::test_utils::fake_redis_store;
use crate::test_utils::node_config;
use crate::test_utils::FakeKeyspace;
use crate::KvCommand;
use crate::ReplicatedStore;
use crate::SledStore;
use crate::SnapshotFiles;

#[tokio::test]
async fn bootstrap_should_restore_newest_snapshot() {
    let dir = tempdir().unwrap();
    let files = SnapshotFiles::for_node(&node_config(1, dir.path()));

    let source = fake_redis_store(&FakeKeyspace::new()).await;
    source.save(&KvCommand::set("k", "old")).await.unwrap();
    persist_snapshot(&source, &files, 10).await.unwrap();
    source.save(&KvCommand::set("k", "new")).await.unwrap();
    persist_snapshot(&source, &files, 12).await.unwrap();

    let target = fake_redis_store(&FakeKeyspace::new()).await;
    let index = bootstrap_from_latest(&target, &files).await.unwrap();

    assert_eq!(index, Some(12));
    assert_eq!(target.get("k").await.unwrap(), Some(b"new".to_vec()));
}

#[tokio::test]
async fn bootstrap_without_snapshot_should_leave_store_untouched() {
    let dir = tempdir().unwrap();
    let files = SnapshotFiles::new(dir.path().join("missing"));
    let keyspace = FakeKeyspace::new();
    keyspace.insert("k", b"v");
    let store = fake_redis_store(&keyspace).await;

    assert_eq!(bootstrap_from_latest(&store, &files).await.unwrap(), None);
    assert_eq!(keyspace.value("k"), Some(b"v".to_vec()));
}

#[tokio::test]
async fn sled_replica_should_bootstrap_from_sled_snapshot() {
    let dir = tempdir().unwrap();
    let files = SnapshotFiles::new(dir.path().join("snapshots"));
    let db = sled::Config::new().temporary(true).open().unwrap();

    let source = SledStore::with_db(db.clone(), 0).unwrap();
    source.save(&KvCommand::set("k", "v")).await.unwrap();
    persist_snapshot(&source, &files, 3).await.unwrap();

    let target = SledStore::with_db(db, 1).unwrap();
    assert_eq!(bootstrap_from_latest(&target, &files).await.unwrap(), Some(3));
    assert_eq!(target.get("k").await.unwrap(), Some(b"v".to_vec()));
}

#[tokio::test]
async fn foreign_snapshot_should_fail_bootstrap() {
    let dir = tempdir().unwrap();
    let files = SnapshotFiles::new(dir.path());
    let db = sled::Config::new().temporary(true).open().unwrap();

    let sled_source = SledStore::with_db(db, 0).unwrap();
    sled_source.save(&KvCommand::set("k", "v")).await.unwrap();
    persist_snapshot(&sled_source, &files, 1).await.unwrap();

    let redis_target = fake_redis_store(&FakeKeyspace::new()).await;
    assert!(bootstrap_from_latest(&redis_target, &files).await.is_err());
}
