use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

pub const SESSION_COOKIE: &str = "token";

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 令牌用途，登录令牌和重置密码令牌不能互换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 用户ID
    pub email: String, // 用户邮箱
    pub exp: i64,      // 过期时间
    pub iat: i64,      // 签发时间
    pub kind: TokenKind,
}

fn issue(
    user_id: Uuid,
    email: &str,
    kind: TokenKind,
    lifetime_secs: u64,
    secret: &str,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(lifetime_secs as i64)).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration,
        iat: now.timestamp(),
        kind,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn generate_token(
    user_id: Uuid,
    email: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    issue(
        user_id,
        email,
        TokenKind::Session,
        config.jwt_expiration_secs,
        &config.jwt_secret,
    )
}

pub fn generate_reset_token(
    user_id: Uuid,
    email: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    tracing::debug!("Generating password reset token for user: {}", user_id);
    issue(
        user_id,
        email,
        TokenKind::PasswordReset,
        config.reset_token_expiration_secs,
        &config.jwt_secret,
    )
}

/// 校验签名和过期时间，不检查用途
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// 登录成功后下发的 Set-Cookie 值
pub fn session_cookie(token: &str, config: &Config) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; SameSite=Lax; HttpOnly",
        SESSION_COOKIE,
        token,
        config.jwt_expiration().as_secs()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn cleared_session_cookie() -> String {
    format!("{}=; Max-Age=0; Path=/; SameSite=Lax; HttpOnly", SESSION_COOKIE)
}

pub mod error_codes {
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const ALREADY_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}
