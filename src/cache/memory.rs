use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::store::{CacheError, KeyValueStore};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    /// 进行中的扫描快照，游标高 32 位是快照编号，低 32 位是偏移
    scans: HashMap<u32, Vec<String>>,
    next_scan: u32,
}

impl State {
    /// 清掉已过期的条目，写入和新扫描开始时调用
    fn sweep_expired(&mut self, now: Instant) {
        self.entries.retain(|_, e| e.is_live(now));
    }
}

/// 进程内键值存储
///
/// 未配置 Redis 时使用，测试中也用它代替 Redis。`set_offline(true)`
/// 之后所有操作都返回传输错误，用来模拟缓存不可达。
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 当前未过期的键，按字典序
    pub async fn live_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CacheError::Transport("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                state.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.sweep_expired(now);
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let (scan_id, offset) = if cursor == 0 {
            state.sweep_expired(now);
            let snapshot: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, e)| e.is_live(now))
                .map(|(k, _)| k.clone())
                .collect();
            state.next_scan = state.next_scan.wrapping_add(1).max(1);
            let id = state.next_scan;
            state.scans.insert(id, snapshot);
            (id, 0usize)
        } else {
            ((cursor >> 32) as u32, (cursor & u32::MAX as u64) as usize)
        };

        let Some(snapshot) = state.scans.get(&scan_id) else {
            // 未知游标视为扫描已结束
            return Ok((0, Vec::new()));
        };

        let end = (offset + count.max(1)).min(snapshot.len());
        let batch: Vec<String> = snapshot[offset.min(end)..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        let finished = end >= snapshot.len();

        // 只返回仍然存在的键
        let batch = batch
            .into_iter()
            .filter(|k| state.entries.get(k).is_some_and(|e| e.is_live(now)))
            .collect();

        if finished {
            state.scans.remove(&scan_id);
            Ok((0, batch))
        } else {
            Ok((((scan_id as u64) << 32) | end as u64, batch))
        }
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = state.entries.remove(key) {
                if entry.is_live(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<i64, CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.sweep_expired(now);

        let current = match state.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some((
                entry.value.parse::<i64>().unwrap_or(0),
                entry.expires_at,
            )),
            _ => None,
        };

        let (count, expires_at) = match current {
            Some((n, expires_at)) => (n + 1, expires_at),
            None => (1, Some(now + Duration::from_secs(window_secs))),
        };
        state.entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count)
    }
}

/// Redis 风格的通配匹配，支持 `*` 和 `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
