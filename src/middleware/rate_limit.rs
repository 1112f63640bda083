use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{cache::PageCache, cache::keys::rate_limit_key, config::Config, error::AppError};

/// 固定窗口限流，计数存放在缓存里
#[derive(Clone)]
pub struct RateLimiter {
    cache: PageCache,
    window: Duration,
    max_requests: i64,
}

impl RateLimiter {
    pub fn new(cache: PageCache, config: &Config) -> Self {
        Self {
            cache,
            window: config.rate_limit_window(),
            max_requests: i64::from(config.rate_limit_requests),
        }
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, AppError> {
        let ip = client_ip(&req);
        let key = rate_limit_key(&ip);

        // 缓存不可用时放行
        if let Some(count) = self.cache.hit_window(&key, self.window).await {
            if count > self.max_requests {
                tracing::warn!("Rate limit exceeded for {} ({} requests)", ip, count);
                return Err(AppError::RateLimited(self.window.as_secs()));
            }
        }

        Ok(next.run(req).await)
    }
}

/// 优先使用代理头，其次是连接地址
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}
