// 数据库模块
// 存储接口定义，PostgreSQL 实现在 repositories 下，memory 为进程内实现

pub mod memory;
pub mod repositories;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPost, NewUser, Post, PostChanges, PostScope, User, UserProfile};

pub use memory::{MemoryPostStore, MemoryUserStore};
pub use repositories::{PgPostStore, PgUserStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("database timeout")]
    Timeout,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict("Email already exists".into())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// 按创建时间倒序、id 倒序取一页
    async fn list(&self, scope: PostScope, offset: i64, limit: i64)
    -> Result<Vec<Post>, StoreError>;

    async fn count(&self, scope: PostScope) -> Result<i64, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, StoreError>;

    /// 返回是否真的删除了记录
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// 邮箱重复时返回 `StoreError::Conflict`
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
}
