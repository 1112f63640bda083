use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};

use crate::{AppState, auth, error::AppError, utils::SESSION_COOKIE};

/// 先取 Authorization: Bearer，没有时再读 token cookie
fn extract_token(request: &Request<Body>) -> Option<String> {
    let headers = request.headers();
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request);
    let identity = auth::verify(token.as_deref(), &state.config.jwt_secret)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
