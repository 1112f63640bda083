use std::collections::BTreeMap;

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::mail::MailError;
use crate::storage::StorageError;
use crate::utils::error_codes;

/// 字段名 -> 错误信息
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("rate limited for {0}s")]
    RateLimited(u64),
    /// 数据库、对象存储或邮件服务不可用，细节只记录日志
    #[error("dependency failure: {0}")]
    Dependency(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, errors) = match self {
            AppError::Validation(errors) => (
                error_codes::VALIDATION_ERROR,
                "Validation failed".to_string(),
                Some(errors),
            ),
            AppError::BadRequest(msg) => (error_codes::VALIDATION_ERROR, msg, None),
            AppError::Unauthorized(msg) => {
                (error_codes::AUTH_FAILED, format!("Unauthorized: {}", msg), None)
            }
            AppError::Forbidden => (
                error_codes::PERMISSION_DENIED,
                "Forbidden: not the owner of this resource".to_string(),
                None,
            ),
            AppError::NotFound(what) => {
                (error_codes::NOT_FOUND, format!("{} not found", what), None)
            }
            AppError::Conflict(msg) => (error_codes::ALREADY_EXISTS, msg, None),
            AppError::RateLimited(secs) => (
                error_codes::RATE_LIMIT,
                format!("Too many requests, retry in {} seconds", secs),
                None,
            ),
            AppError::Dependency(detail) => {
                // 不向调用方泄露内部细节
                tracing::error!("Dependency failure: {}", detail);
                (
                    error_codes::INTERNAL_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            code,
            message,
            errors,
        });

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized(reason) => AppError::Unauthorized(reason),
            AuthError::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Resource"),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Dependency(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Dependency(format!("image storage: {}", err))
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Dependency(format!("mail delivery: {}", err))
    }
}
