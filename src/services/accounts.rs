//! 注册、登录与找回密码
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::database::UserStore;
use crate::error::{AppError, FieldErrors};
use crate::mail::{Mailer, OutgoingMail};
use crate::models::{NewUser, User};
use crate::utils::{
    TokenKind, generate_reset_token, generate_token, hash_password, verify_password, verify_token,
};

const PASSWORD_MIN: usize = 6;
const RESET_PASSWORD_MIN: usize = 8;

/// 用户名以字母开头，之后 3 到 10 个字母、数字或下划线
fn valid_username(username: &str) -> bool {
    let mut chars = username.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    first.is_ascii_alphabetic()
        && (3..=10).contains(&rest.len())
        && rest.iter().all(|c| c.is_ascii_alphanumeric() || *c == '_')
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_signup(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if username.chars().count() < 3 {
        errors.insert("username".into(), "Username must be at least 3 characters".into());
    } else if !valid_username(username) {
        errors.insert("username".into(), "Invalid username".into());
    }
    if !valid_email(email) {
        errors.insert("email".into(), "Invalid email address".into());
    }
    if password.chars().count() < PASSWORD_MIN {
        errors.insert(
            "password".into(),
            format!("Password must be at least {} characters", PASSWORD_MIN),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// bcrypt 计算量大，放到阻塞线程池执行
async fn hash_blocking(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Dependency(format!("hash task failed: {}", e)))?
        .map_err(|e| AppError::Dependency(format!("failed to hash password: {}", e)))
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Dependency(format!("verify task failed: {}", e)))?
        .map_err(|e| AppError::Dependency(format!("failed to verify password: {}", e)))
}

/// 登录成功后的结果
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    config: Arc<Config>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>, config: Arc<Config>) -> Self {
        Self {
            users,
            mailer,
            config,
        }
    }

    fn issue_session(&self, user: User) -> Result<Session, AppError> {
        let (token, _) = generate_token(user.id, &user.email, &self.config)
            .map_err(|e| AppError::Dependency(format!("failed to sign token: {}", e)))?;
        Ok(Session { user, token })
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        validate_signup(username, &email, password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".into()));
        }

        let password_hash = hash_blocking(password.to_string(), self.config.bcrypt_cost).await?;
        // 并发注册时由唯一索引兜底，返回 Conflict
        let user = self
            .users
            .insert(NewUser {
                username: username.to_string(),
                email,
                password_hash,
            })
            .await?;

        self.issue_session(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = email.trim().to_lowercase();
        let mut errors = FieldErrors::new();
        if !valid_email(&email) {
            errors.insert("email".into(), "Invalid email address".into());
        }
        if password.is_empty() {
            errors.insert("password".into(), "Password is required".into());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Err(AppError::Unauthorized("User does not exist".into()));
        };

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            return Err(AppError::Unauthorized("Wrong password".into()));
        }

        tracing::info!("User {} logged in", user.id);
        self.issue_session(user)
    }

    /// 发送重置密码邮件
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::BadRequest("Email is required".into()));
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Err(AppError::NotFound("User"));
        };

        let (token, _) = generate_reset_token(user.id, &user.email, &self.config)
            .map_err(|e| AppError::Dependency(format!("failed to sign reset token: {}", e)))?;
        let reset_url = format!(
            "{}/reset-password/{}",
            self.config.client_url.trim_end_matches('/'),
            token
        );
        let minutes = self.config.reset_token_expiration_secs / 60;

        self.mailer
            .send(OutgoingMail {
                to: user.email.clone(),
                subject: "Password Reset Request".into(),
                html: format!(
                    "<p>You requested a password reset.</p>\
                     <p>Click <a href=\"{}\">here</a> to reset your password.</p>\
                     <p>This link will expire in {} minutes.</p>",
                    reset_url, minutes
                ),
            })
            .await?;

        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AppError> {
        if token.trim().is_empty() || password.chars().count() < RESET_PASSWORD_MIN {
            return Err(AppError::BadRequest(format!(
                "Token and a password of at least {} characters are required",
                RESET_PASSWORD_MIN
            )));
        }

        let invalid = || AppError::BadRequest("Reset token is invalid or has expired".into());
        let claims = verify_token(token.trim(), &self.config.jwt_secret).map_err(|_| invalid())?;
        if claims.kind != TokenKind::PasswordReset {
            return Err(invalid());
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid())?;

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User"));
        }

        let password_hash = hash_blocking(password.to_string(), self.config.bcrypt_cost).await?;
        self.users.update_password(user_id, &password_hash).await?;

        tracing::info!("Password reset for user {}", user_id);
        Ok(())
    }
}
