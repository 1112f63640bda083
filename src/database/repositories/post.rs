use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{PostStore, StoreError};
use crate::models::{NewPost, Post, PostChanges, PostScope};

/// 文章存储库实现
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn author_filter(scope: PostScope) -> Option<Uuid> {
    match scope {
        PostScope::Global => None,
        PostScope::Author(id) => Some(id),
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn list(
        &self,
        scope: PostScope,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, image_url, author_id, created_at
            FROM posts
            WHERE ($1::uuid IS NULL OR author_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_filter(scope))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn count(&self, scope: PostScope) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE ($1::uuid IS NULL OR author_id = $1)
            "#,
        )
        .bind(author_filter(scope))
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, image_url, author_id, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, title, content, image_url, author_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, title, content, image_url, author_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(post.author_id)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(created) => {
                tracing::info!("Created post {} by {}", created.id, created.author_id);
                Ok(created)
            }
            Err(e) => {
                tracing::error!("Failed to create post: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, StoreError> {
        // 找不到记录时 fetch_one 返回 RowNotFound
        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $1, content = $2, image_url = $3
            WHERE id = $4
            RETURNING id, title, content, image_url, author_id, created_at
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.image_url)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
