//! 文章分页查询，先读缓存，未命中时查库并回填
use std::sync::Arc;
use std::time::Duration;

use crate::cache::PageCache;
use crate::cache::keys::page_key;
use crate::database::{PostStore, UserStore};
use crate::error::AppError;
use crate::models::{Pagination, PostPage, PostScope};

/// 经过校正的分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// 页码从 1 开始；非法或缺失的值回落到默认值，每页数量不超过 `max_page_size`
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
        default_page_size: i64,
        max_page_size: i64,
    ) -> Self {
        let parse_positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
        };

        let page = parse_positive(page).unwrap_or(1);
        let page_size = parse_positive(page_size)
            .unwrap_or(default_page_size)
            .min(max_page_size.max(1));

        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Clone)]
pub struct PostListing {
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
    cache: PageCache,
    feed_ttl: Duration,
    user_ttl: Duration,
}

impl PostListing {
    pub fn new(
        posts: Arc<dyn PostStore>,
        users: Arc<dyn UserStore>,
        cache: PageCache,
        feed_ttl: Duration,
        user_ttl: Duration,
    ) -> Self {
        Self {
            posts,
            users,
            cache,
            feed_ttl,
            user_ttl,
        }
    }

    pub async fn list(&self, scope: PostScope, req: PageRequest) -> Result<PostPage, AppError> {
        let key = page_key(&scope, req.page, req.page_size);

        if let Some(cached) = self.cache.get::<PostPage>(&key).await {
            return Ok(cached);
        }

        let offset = req.offset();
        let (items, total, user) = match scope {
            PostScope::Global => {
                let (items, total) = futures_util::try_join!(
                    self.posts.list(scope, offset, req.page_size),
                    self.posts.count(scope),
                )?;
                (items, total, None)
            }
            PostScope::Author(user_id) => {
                let (items, total, profile) = futures_util::try_join!(
                    self.posts.list(scope, offset, req.page_size),
                    self.posts.count(scope),
                    self.users.profile(user_id),
                )?;
                // 令牌有效但用户已被删除
                let Some(profile) = profile else {
                    return Err(AppError::Unauthorized("user no longer exists".into()));
                };
                (items, total, Some(profile))
            }
        };

        // 页码超出范围时返回空列表，分页信息仍然正确
        let page = PostPage {
            user,
            items,
            pagination: Pagination::new(total, req.page_size, req.page),
        };

        let ttl = match scope {
            PostScope::Global => self.feed_ttl,
            PostScope::Author(_) => self.user_ttl,
        };
        self.cache.set(&key, &page, ttl).await;

        Ok(page)
    }
}
