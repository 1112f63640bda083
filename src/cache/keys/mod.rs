/// 缓存键模块
/// 文章分页结果的键按作用域加前缀，便于按模式整体清除
use uuid::Uuid;

use crate::models::PostScope;

/// 全站文章列表缓存键前缀
const PUBLIC_POSTS_PREFIX: &str = "blogs:public:";

/// 作者文章列表缓存键前缀
const USER_POSTS_PREFIX: &str = "blogs:user:";

/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

fn scope_prefix(scope: &PostScope) -> String {
    match scope {
        PostScope::Global => PUBLIC_POSTS_PREFIX.to_string(),
        PostScope::Author(user_id) => author_prefix(user_id),
    }
}

fn author_prefix(user_id: &Uuid) -> String {
    // UUID 中没有冒号，前缀之间不会互相包含
    format!("{}{}:", USER_POSTS_PREFIX, user_id)
}

/// 生成分页缓存键
pub fn page_key(scope: &PostScope, page: i64, limit: i64) -> String {
    format!("{}page={}:limit={}", scope_prefix(scope), page, limit)
}

/// 生成匹配某个作用域全部分页的模式
pub fn scope_pattern(scope: &PostScope) -> String {
    format!("{}*", scope_prefix(scope))
}

/// 生成限流计数键
pub fn rate_limit_key(client: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, client)
}
