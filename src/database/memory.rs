use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PostStore, StoreError, UserStore};
use crate::models::{NewPost, NewUser, Post, PostChanges, PostScope, User, UserProfile};

#[derive(Default)]
struct PostTable {
    rows: HashMap<Uuid, Post>,
    last_created: Option<DateTime<Utc>>,
}

/// 进程内文章存储，用于测试和本地调试
#[derive(Default)]
pub struct MemoryPostStore {
    table: RwLock<PostTable>,
    offline: AtomicBool,
    /// 数据库查询次数，用来观察缓存是否命中
    reads: AtomicUsize,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Database("memory store is offline".into()))
        } else {
            Ok(())
        }
    }

    fn in_scope(post: &Post, scope: PostScope) -> bool {
        match scope {
            PostScope::Global => true,
            PostScope::Author(id) => post.author_id == id,
        }
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn list(
        &self,
        scope: PostScope,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>, StoreError> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let table = self.table.read().await;
        let mut posts: Vec<Post> = table
            .rows
            .values()
            .filter(|p| Self::in_scope(p, scope))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, scope: PostScope) -> Result<i64, StoreError> {
        self.check_online()?;
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|p| Self::in_scope(p, scope))
            .count() as i64)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        self.check_online()?;
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
        self.check_online()?;
        let mut table = self.table.write().await;

        // 保证创建时间严格递增，测试中的先后顺序才稳定
        let mut created_at = Utc::now();
        if let Some(last) = table.last_created {
            if created_at <= last {
                created_at = last + Duration::microseconds(1);
            }
        }
        table.last_created = Some(created_at);

        let row = Post {
            id: Uuid::new_v4(),
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            author_id: post.author_id,
            created_at,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, StoreError> {
        self.check_online()?;
        let mut table = self.table.write().await;
        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.title = changes.title;
        row.content = changes.content;
        row.image_url = changes.image_url;
        Ok(row.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

/// 进程内用户存储
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email already exists".into()));
        }
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.rows.read().await.get(&id).map(UserProfile::from))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let user = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}
