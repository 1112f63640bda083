use async_trait::async_trait;
use thiserror::Error;

/// 缓存存储错误，只在缓存层内部流转，不会传给 HTTP 调用方
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(String),
    #[error("cache operation timed out")]
    Timeout,
    #[error("cache payload error: {0}")]
    Payload(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Payload(err.to_string())
    }
}

/// 远端键值存储的最小接口
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// 游标扫描，游标为 0 表示开始，返回 0 表示结束
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// 计数加一，首次计数时设置窗口过期时间
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<i64, CacheError>;
}
