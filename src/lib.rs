use std::sync::Arc;
use std::time::Duration;

use config::Config;

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;

use cache::{KeyValueStore, PageCache};
use database::{PostStore, UserStore};
use mail::Mailer;
use services::{AccountService, PostListing, PostService};
use storage::ImageStore;

/// 外部依赖，生产环境和测试各自装配
pub struct Backends {
    pub posts: Arc<dyn PostStore>,
    pub users: Arc<dyn UserStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub images: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: PageCache,
    pub listing: PostListing,
    pub posts: PostService,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> Self {
        let config = Arc::new(config);
        let cache = PageCache::new(backends.kv);

        let listing = PostListing::new(
            backends.posts.clone(),
            backends.users.clone(),
            cache.clone(),
            Duration::from_secs(config.feed_cache_ttl_secs),
            Duration::from_secs(config.user_cache_ttl_secs),
        );
        let posts = PostService::new(
            backends.posts,
            backends.images,
            cache.clone(),
            config.max_image_bytes,
        );
        let accounts = AccountService::new(backends.users, backends.mailer, config.clone());

        Self {
            config,
            cache,
            listing,
            posts,
            accounts,
        }
    }
}
