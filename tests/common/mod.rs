#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use blog_backend::{
    AppState, Backends,
    cache::MemoryStore,
    config::Config,
    database::{MemoryPostStore, MemoryUserStore, PostStore, UserStore},
    mail::MemoryMailer,
    models::{NewPost, NewUser, Post},
    router::build_router,
    storage::MemoryImageStore,
    utils::generate_token,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const BOUNDARY: &str = "blog-test-boundary";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: None,
        jwt_secret: "test-secret".into(),
        jwt_expiration_secs: 3600,
        reset_token_expiration_secs: 900,
        rate_limit_window_secs: 60,
        rate_limit_requests: 10_000,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        feed_cache_ttl_secs: 60,
        user_cache_ttl_secs: 60,
        default_page_size: 6,
        max_page_size: 50,
        db_timeout_ms: 5000,
        cache_timeout_ms: 500,
        http_timeout_ms: 10_000,
        supabase_url: String::new(),
        supabase_service_key: String::new(),
        storage_bucket: "blog-images".into(),
        resend_api_key: String::new(),
        mail_from: "no-reply@example.com".into(),
        client_url: "http://localhost:5173".into(),
        cookie_secure: false,
        max_image_bytes: 1024 * 1024,
        bcrypt_cost: 4,
    }
}

pub struct TestApp {
    pub router: Router,
    pub config: Config,
    pub posts: Arc<MemoryPostStore>,
    pub users: Arc<MemoryUserStore>,
    pub kv: Arc<MemoryStore>,
    pub images: Arc<MemoryImageStore>,
    pub mailer: Arc<MemoryMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// 注册到用户表的作者，附带登录令牌
pub struct Author {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let posts = Arc::new(MemoryPostStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let kv = Arc::new(MemoryStore::new());
        let images = Arc::new(MemoryImageStore::new());
        let mailer = Arc::new(MemoryMailer::new());

        let state = AppState::new(
            config.clone(),
            Backends {
                posts: posts.clone(),
                users: users.clone(),
                kv: kv.clone(),
                images: images.clone(),
                mailer: mailer.clone(),
            },
        );

        Self {
            router: build_router(state),
            config,
            posts,
            users,
            kv,
            images,
            mailer,
        }
    }

    pub async fn author(&self, username: &str) -> Author {
        let user = self
            .users
            .insert(NewUser {
                username: username.into(),
                email: format!("{}@example.com", username),
                password_hash: "unused".into(),
            })
            .await
            .unwrap();
        let (token, _) = generate_token(user.id, &user.email, &self.config).unwrap();
        Author { id: user.id, token }
    }

    /// 直接写库，绕过缓存失效
    pub async fn seed_post(&self, author: &Author, title: &str) -> Post {
        self.posts
            .insert(NewPost {
                title: title.into(),
                content: format!("{} has enough content to pass", title),
                image_url: None,
                author_id: author.id,
            })
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send_form(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        form: MultipartBody,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(form.finish())).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::DELETE).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

/// 手工拼接 multipart/form-data 请求体
#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn post(title: &str, content: &str) -> Self {
        Self::new().text("title", title).text("content", content)
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.buf
    }
}
