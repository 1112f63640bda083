use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes,
};

/// multipart 表单中除图片外的其余字段
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/posts", get(routes::post::list_posts))
        .route("/posts/{id}", get(routes::post::get_post))
        .route("/auth/signup", post(routes::user::signup))
        .route("/auth/login", post(routes::user::login))
        .route("/auth/logout", post(routes::user::logout))
        .route("/auth/forgot-password", post(routes::user::forgot_password))
        .route("/auth/reset-password", post(routes::user::reset_password));

    let protected_routes = Router::new()
        .route("/users/me/posts", get(routes::post::list_my_posts))
        .route("/posts", post(routes::post::create_post))
        .route(
            "/posts/{id}",
            patch(routes::post::update_post).delete(routes::post::delete_post),
        )
        // 只作用于已匹配的路由，未知路径仍然返回 404
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    // 空前缀或 "/" 时直接挂在根路径
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    let rate_limiter = Arc::new(RateLimiter::new(state.cache.clone(), &state.config));

    // 限流在最外层，其次是错误日志
    let body_limit = state.config.max_image_bytes + FORM_OVERHEAD_BYTES;
    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limiter,
                    rate_limit,
                ))
                .layer(axum::middleware::from_fn(log_errors))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
