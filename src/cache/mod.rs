// 缓存模块
// 文章分页结果的读穿缓存、按作用域失效，以及限流计数

pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod page_cache;
pub mod redis_store;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use invalidation::{PostWrite, invalidate_after_write};
pub use memory::MemoryStore;
pub use page_cache::PageCache;
pub use redis_store::RedisStore;
pub use store::{CacheError, KeyValueStore};
