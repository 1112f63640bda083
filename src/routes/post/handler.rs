use axum::{
    Extension,
    extract::{Json, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::Identity,
    error::AppError,
    models::{Post, PostPage, PostScope},
    services::PageRequest,
};

use super::model::{DeletePostResponse, PageQuery, read_post_form};

fn page_request(state: &AppState, query: &PageQuery) -> PageRequest {
    PageRequest::from_params(
        query.page.as_deref(),
        query.page_size.as_deref(),
        state.config.default_page_size,
        state.config.max_page_size,
    )
}

/// 非法 id 与不存在的文章同样返回 404
fn post_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Post"))
}

#[axum::debug_handler]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, AppError> {
    let req = page_request(&state, &query);
    let page = state.listing.list(PostScope::Global, req).await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn list_my_posts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, AppError> {
    let req = page_request(&state, &query);
    let page = state
        .listing
        .list(PostScope::Author(identity.user_id), req)
        .await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.get(post_id(&id)?).await?;
    Ok(Json(post))
}

#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_post_form(multipart).await?;
    let post = state.posts.create(&identity, form).await?;
    tracing::info!("User {} created post {}", identity.user_id, post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

#[axum::debug_handler]
pub async fn update_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Post>, AppError> {
    let id = post_id(&id)?;
    let form = read_post_form(multipart).await?;
    let post = state.posts.update(&identity, id, form).await?;
    Ok(Json(post))
}

#[axum::debug_handler]
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<DeletePostResponse>, AppError> {
    let id = post_id(&id)?;
    state.posts.delete(&identity, id).await?;
    tracing::info!("User {} deleted post {}", identity.user_id, id);
    Ok(Json(DeletePostResponse {
        message: "Post deleted successfully".to_string(),
    }))
}
