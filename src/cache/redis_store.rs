use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::OnceCell;

use super::store::{CacheError, KeyValueStore};

/// 基于 Redis 的键值存储，每个命令都有超时上限
///
/// 所有命令共用一个 `ConnectionManager`，首次使用时建立，断线后自动重连。
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<RedisClient>,
    conn: Arc<OnceCell<ConnectionManager>>,
    timeout: Duration,
}

/// INCR 与 EXPIRE NX 放在同一个事务里，计数键总会带上窗口过期时间
fn window_pipeline(key: &str, window_secs: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1)
        .cmd("EXPIRE")
        .arg(key)
        .arg(window_secs)
        .arg("NX")
        .ignore();
    pipe
}

impl RedisStore {
    pub fn new(client: Arc<RedisClient>, timeout: Duration) -> Self {
        Self {
            client,
            conn: Arc::new(OnceCell::new()),
            timeout,
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, redis::RedisError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.as_ref().clone()))
            .await?;
        Ok(conn.clone())
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.timed(async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, redis::RedisError>(value)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.timed(async {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(key, value, ttl_secs).await?;
            Ok::<_, redis::RedisError>(())
        })
        .await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        self.timed(async {
            let mut conn = self.connection().await?;
            // SCAN 不会像 KEYS 那样阻塞 Redis
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>((next, keys))
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.timed(async {
            let mut conn = self.connection().await?;
            let deleted: usize = conn.del(keys).await?;
            Ok::<_, redis::RedisError>(deleted)
        })
        .await
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<i64, CacheError> {
        self.timed(async {
            let mut conn = self.connection().await?;
            let (count,): (i64,) = window_pipeline(key, window_secs)
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(count)
        })
        .await
    }
}
