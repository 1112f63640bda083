use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use super::store::{CacheError, KeyValueStore};

/// 每次 SCAN 的建议数量
const SCAN_BATCH: usize = 100;

/// 缓存客户端
///
/// 缓存只是建议性的：读失败按未命中处理，写失败只记录日志。
/// 只有 `delete_matching` 会把错误交给调用方，由失效策略决定如何处理。
#[derive(Clone)]
pub struct PageCache {
    store: Arc<dyn KeyValueStore>,
}

impl PageCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                tracing::debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        match self.store.set_ex(key, &json, ttl.as_secs().max(1)).await {
            Ok(()) => tracing::debug!("Set cache: {} (ttl {}s)", key, ttl.as_secs()),
            Err(e) => tracing::warn!("Cache write failed for {}: {}", key, e),
        }
    }

    /// 删除所有匹配模式的键，返回删除数量
    pub async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys) = self.store.scan(cursor, pattern, SCAN_BATCH).await?;

            if !keys.is_empty() {
                total_deleted += self.store.del(&keys).await?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        if total_deleted > 0 {
            tracing::debug!("Deleted {} cache keys matching {}", total_deleted, pattern);
        }

        Ok(total_deleted)
    }

    /// 窗口计数，缓存不可用时返回 None
    pub async fn hit_window(&self, key: &str, window: Duration) -> Option<i64> {
        match self.store.incr_window(key, window.as_secs().max(1)).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Rate limit counter unavailable for {}: {}", key, e);
                None
            }
        }
    }
}
