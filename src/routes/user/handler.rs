use axum::{
    extract::{Json, State},
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    models::UserProfile,
    services::Session,
    utils::{cleared_session_cookie, session_cookie},
};

use super::model::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest,
    SignupRequest,
};

/// 令牌同时放在响应体和 HttpOnly cookie 中
fn session_response(
    state: &AppState,
    status: StatusCode,
    message: &str,
    session: Session,
) -> (StatusCode, [(HeaderName, String); 1], Json<AuthResponse>) {
    let cookie = session_cookie(&session.token, &state.config);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: message.to_string(),
            user: UserProfile::from(&session.user),
            token: session.token,
        }),
    )
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .accounts
        .signup(&req.username, &req.email, &req.password)
        .await?;
    tracing::info!("User {} signed up", session.user.id);
    Ok(session_response(
        &state,
        StatusCode::CREATED,
        "User created successfully",
        session,
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.accounts.login(&req.email, &req.password).await?;
    Ok(session_response(
        &state,
        StatusCode::OK,
        "Login successful",
        session,
    ))
}

#[axum::debug_handler]
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cleared_session_cookie())],
        Json(MessageResponse::new("Logged out successfully")),
    )
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounts.request_password_reset(&req.email).await?;
    Ok(Json(MessageResponse::new("Password reset link sent to email")))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .accounts
        .reset_password(&req.token, &req.password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}
