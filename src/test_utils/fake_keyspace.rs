use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::ErrorKind;
use redis::RedisError;
use redis::RedisResult;
use tokio::sync::oneshot;
use tokio::sync::Notify;

use crate::KeyspaceConnection;

const DUMP_HEADER: &[u8] = b"FAKEDUMP\x0b";

#[derive(Debug, Default)]
struct FakeState {
    data: BTreeMap<String, Vec<u8>>,
    fail_dump_for: Option<String>,
    fail_restore_for: Vec<String>,
    scan_calls: usize,
    /// Runs once per SCAN page, with the page already computed
    on_scan: Option<Vec<(String, Option<Vec<u8>>)>>,
    /// Next SCAN signals entry, then parks until released
    scan_hold: Option<(Arc<Notify>, oneshot::Receiver<()>)>,
}

/// In-memory stand-in for one Redis logical database.
///
/// Cloned handles share the same keyspace, so a test can mutate the "engine"
/// behind the adapter's back, the way another client would.
#[derive(Debug, Clone, Default)]
pub struct FakeKeyspace {
    state: Arc<Mutex<FakeState>>,
    page_size_override: Option<usize>,
}

impl FakeKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force small SCAN pages so pagination is exercised.
    pub fn with_page_size(
        mut self,
        page_size: usize,
    ) -> Self {
        self.page_size_override = Some(page_size);
        self
    }

    pub fn insert(
        &self,
        key: &str,
        value: &[u8],
    ) {
        self.state.lock().data.insert(key.to_string(), value.to_vec());
    }

    pub fn value(
        &self,
        key: &str,
    ) -> Option<Vec<u8>> {
        self.state.lock().data.get(key).cloned()
    }

    pub fn contents(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.lock().data.clone()
    }

    pub fn scan_calls(&self) -> usize {
        self.state.lock().scan_calls
    }

    pub fn fail_dump_for(
        &self,
        key: &str,
    ) {
        self.state.lock().fail_dump_for = Some(key.to_string());
    }

    pub fn fail_restore_for(
        &self,
        key: &str,
    ) {
        self.state.lock().fail_restore_for.push(key.to_string());
    }

    /// Mutations applied right after the first SCAN page is served
    /// (`None` deletes the key).
    pub fn mutate_during_scan(
        &self,
        mutations: Vec<(String, Option<Vec<u8>>)>,
    ) {
        self.state.lock().on_scan = Some(mutations);
    }

    /// Park the next SCAN call. Returns the "scan entered" signal and the
    /// sender that lets it continue.
    pub fn hold_next_scan(&self) -> (Arc<Notify>, oneshot::Sender<()>) {
        let entered = Arc::new(Notify::new());
        let (release_tx, release_rx) = oneshot::channel();
        self.state.lock().scan_hold = Some((entered.clone(), release_rx));
        (entered, release_tx)
    }

    pub fn fake_dump(value: &[u8]) -> Vec<u8> {
        let mut dump = DUMP_HEADER.to_vec();
        dump.extend_from_slice(value);
        dump
    }
}

#[async_trait]
impl KeyspaceConnection for FakeKeyspace {
    async fn ping(&mut self) -> RedisResult<()> {
        Ok(())
    }

    async fn get(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>> {
        Ok(self.value(key))
    }

    async fn set(
        &mut self,
        key: &str,
        value: &[u8],
    ) -> RedisResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn del(
        &mut self,
        key: &str,
    ) -> RedisResult<()> {
        self.state.lock().data.remove(key);
        Ok(())
    }

    async fn scan(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> RedisResult<(u64, Vec<String>)> {
        let hold = self.state.lock().scan_hold.take();
        if let Some((entered, release)) = hold {
            entered.notify_one();
            let _ = release.await;
        }

        let count = self.page_size_override.unwrap_or(count).max(1);
        let mut state = self.state.lock();
        state.scan_calls += 1;

        let start = cursor as usize;
        let keys: Vec<String> = state.data.keys().skip(start).take(count).cloned().collect();
        let next = start + keys.len();
        let next_cursor = if next >= state.data.len() { 0 } else { next as u64 };

        if let Some(mutations) = state.on_scan.take() {
            for (key, value) in mutations {
                match value {
                    Some(value) => state.data.insert(key, value),
                    None => state.data.remove(&key),
                };
            }
        }
        Ok((next_cursor, keys))
    }

    async fn dump(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>> {
        let state = self.state.lock();
        if state.fail_dump_for.as_deref() == Some(key) {
            return Err(RedisError::from((ErrorKind::IoError, "connection reset")));
        }
        Ok(state.data.get(key).map(|v| Self::fake_dump(v)))
    }

    async fn restore_replace(
        &mut self,
        key: &str,
        dump: &[u8],
    ) -> RedisResult<()> {
        let mut state = self.state.lock();
        if state.fail_restore_for.iter().any(|k| k == key) {
            return Err(RedisError::from((ErrorKind::ResponseError, "OOM command not allowed")));
        }
        let value = dump.strip_prefix(DUMP_HEADER).ok_or_else(|| {
            RedisError::from((
                ErrorKind::ResponseError,
                "DUMP payload version or checksum are wrong",
            ))
        })?;
        state.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
