//! 身份校验与所有权检查
//!
//! 请求进入受保护路由时先经过 [`verify`]，成功后得到 [`Identity`]，
//! 由中间件放入请求扩展；修改或删除文章前再调用 [`authorize_owner`]。

use thiserror::Error;
use uuid::Uuid;

use crate::utils::{TokenKind, verify_token};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden,
}

/// 已验证的调用者身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

pub fn verify(token: Option<&str>, secret: &str) -> Result<Identity, AuthError> {
    let token = match token.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AuthError::Unauthorized("missing token".into())),
    };

    let claims = verify_token(token, secret).map_err(|e| {
        tracing::debug!("Token rejected: {}", e);
        AuthError::Unauthorized("invalid token".into())
    })?;

    if claims.kind != TokenKind::Session {
        return Err(AuthError::Unauthorized("invalid token".into()));
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AuthError::Unauthorized("invalid token payload".into()))?;

    Ok(Identity {
        user_id,
        email: claims.email,
    })
}

pub fn authorize_owner(identity: &Identity, author_id: Uuid) -> Result<(), AuthError> {
    if identity.user_id == author_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
