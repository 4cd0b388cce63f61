use async_trait::async_trait;
#[cfg(test)]
use mockall::mock;
use redis::aio::MultiplexedConnection;
use redis::RedisResult;

/// The Redis primitives the adapter relies on.
///
/// `dump` / `restore_replace` are the engine-native point export/import pair:
/// the dump preserves value, type and expiry byte-for-byte.
///
/// Clones are extra handles onto the same server connection; a long SCAN walk
/// runs on its own clone.
#[async_trait]
pub trait KeyspaceConnection: Clone + Send + 'static {
    async fn ping(&mut self) -> RedisResult<()>;

    async fn get(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>>;

    /// `SET key value` without expiry
    async fn set(
        &mut self,
        key: &str,
        value: &[u8],
    ) -> RedisResult<()>;

    async fn del(
        &mut self,
        key: &str,
    ) -> RedisResult<()>;

    /// `SCAN cursor COUNT count`; a returned cursor of `0` ends the iteration
    async fn scan(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> RedisResult<(u64, Vec<String>)>;

    /// `DUMP key`; `None` if the key no longer exists
    async fn dump(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>>;

    /// `RESTORE key 0 dump REPLACE`
    async fn restore_replace(
        &mut self,
        key: &str,
        dump: &[u8],
    ) -> RedisResult<()>;
}

#[async_trait]
impl KeyspaceConnection for MultiplexedConnection {
    async fn ping(&mut self) -> RedisResult<()> {
        let _: String = redis::cmd("PING").query_async(self).await?;
        Ok(())
    }

    async fn get(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>> {
        redis::cmd("GET").arg(key).query_async(self).await
    }

    async fn set(
        &mut self,
        key: &str,
        value: &[u8],
    ) -> RedisResult<()> {
        redis::cmd("SET").arg(key).arg(value).query_async(self).await
    }

    async fn del(
        &mut self,
        key: &str,
    ) -> RedisResult<()> {
        let _: i64 = redis::cmd("DEL").arg(key).query_async(self).await?;
        Ok(())
    }

    async fn scan(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> RedisResult<(u64, Vec<String>)> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(self)
            .await
    }

    async fn dump(
        &mut self,
        key: &str,
    ) -> RedisResult<Option<Vec<u8>>> {
        redis::cmd("DUMP").arg(key).query_async(self).await
    }

    async fn restore_replace(
        &mut self,
        key: &str,
        dump: &[u8],
    ) -> RedisResult<()> {
        redis::cmd("RESTORE")
            .arg(key)
            .arg(0)
            .arg(dump)
            .arg("REPLACE")
            .query_async(self)
            .await
    }
}

#[cfg(test)]
mock! {
    pub RedisConnection {}

    impl Clone for RedisConnection {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl KeyspaceConnection for RedisConnection {
        async fn ping(&mut self) -> RedisResult<()>;
        async fn get(&mut self, key: &str) -> RedisResult<Option<Vec<u8>>>;
        async fn set(&mut self, key: &str, value: &[u8]) -> RedisResult<()>;
        async fn del(&mut self, key: &str) -> RedisResult<()>;
        async fn scan(&mut self, cursor: u64, count: usize) -> RedisResult<(u64, Vec<String>)>;
        async fn dump(&mut self, key: &str) -> RedisResult<Option<Vec<u8>>>;
        async fn restore_replace(&mut self, key: &str, dump: &[u8]) -> RedisResult<()>;
    }
}
