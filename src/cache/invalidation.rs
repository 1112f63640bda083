//! 文章写入后的缓存失效
//!
//! 按作用域整体清除，不定位到具体某一页。
//! 已知的扩展性限制：每次可见的写入都会清空全站列表的全部分页缓存。
use uuid::Uuid;

use super::keys::scope_pattern;
use super::page_cache::PageCache;
use crate::models::PostScope;

/// 触发失效的写入类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostWrite {
    Created,
    /// `visible_change` 为 true 表示标题、正文或图片有变化
    Updated { visible_change: bool },
    Deleted,
}

pub fn affected_scopes(author_id: Uuid, write: PostWrite) -> Vec<PostScope> {
    match write {
        PostWrite::Created | PostWrite::Deleted => {
            vec![PostScope::Global, PostScope::Author(author_id)]
        }
        PostWrite::Updated {
            visible_change: true,
        } => vec![PostScope::Global, PostScope::Author(author_id)],
        PostWrite::Updated {
            visible_change: false,
        } => vec![PostScope::Author(author_id)],
    }
}

/// 清除受影响作用域的缓存，返回删除的键数量
///
/// 写入已经提交，失败只记录日志，过期时间兜底。
pub async fn invalidate_after_write(cache: &PageCache, author_id: Uuid, write: PostWrite) -> usize {
    let mut deleted = 0;

    for scope in affected_scopes(author_id, write) {
        let pattern = scope_pattern(&scope);
        match cache.delete_matching(&pattern).await {
            Ok(count) => deleted += count,
            Err(e) => {
                tracing::warn!(
                    "Cache invalidation failed for {} after {:?}: {}",
                    pattern,
                    write,
                    e
                );
            }
        }
    }

    tracing::debug!(
        "Invalidated {} cached pages after {:?} by {}",
        deleted,
        write,
        author_id
    );
    deleted
}
