//! 文章图片的对象存储
//!
//! 生产环境使用 Supabase Storage 的 REST 接口，测试使用 [`MemoryImageStore`]。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("storage rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Request(err.to_string())
    }
}

/// 待上传的图片
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// 生成存储用的文件名：毫秒时间戳 + 随机 id + 原扩展名
    pub fn storage_name(&self) -> String {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| default_extension(&self.content_type).to_string());
        format!("{}_{}.{}", Utc::now().timestamp_millis(), Uuid::new_v4(), ext)
    }
}

fn default_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// 从公开 URL 中取出对象名
pub fn object_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 上传图片，返回公开访问 URL
    async fn upload(&self, image: &ImageUpload) -> Result<String, StorageError>;

    /// 按公开 URL 删除图片
    async fn remove(&self, url: &str) -> Result<(), StorageError>;
}

/// Supabase Storage 客户端
pub struct SupabaseStorage {
    base_url: String,
    service_key: String,
    bucket: String,
    http_client: Client,
}

impl SupabaseStorage {
    pub fn new(
        base_url: &str,
        service_key: &str,
        bucket: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        tracing::info!("Image storage initialized for bucket {}", bucket);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
            http_client,
        })
    }

    fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, name
        )
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected { status, body })
}

#[async_trait]
impl ImageStore for SupabaseStorage {
    async fn upload(&self, image: &ImageUpload) -> Result<String, StorageError> {
        let name = image.storage_name();
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, name
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("content-type", &image.content_type)
            .header("x-upsert", "false")
            .body(image.bytes.clone())
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!("Uploaded image {} ({} bytes)", name, image.bytes.len());
        Ok(self.public_url(&name))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let Some(name) = object_name_from_url(url) else {
            return Ok(());
        };

        let response = self
            .http_client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "prefixes": [name] }))
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!("Removed image {}", name);
        Ok(())
    }
}

/// 进程内图片存储
#[derive(Default)]
pub struct MemoryImageStore {
    objects: Mutex<HashMap<String, Bytes>>,
    offline: AtomicBool,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Request("memory image store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, image: &ImageUpload) -> Result<String, StorageError> {
        self.check_online()?;
        let name = image.storage_name();
        self.objects
            .lock()
            .await
            .insert(name.clone(), image.bytes.clone());
        Ok(format!("memory://blog-images/{}", name))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        self.check_online()?;
        if let Some(name) = object_name_from_url(url) {
            self.objects.lock().await.remove(name);
        }
        Ok(())
    }
}
