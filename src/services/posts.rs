//! 文章写操作：校验、所有权、图片存储、落库，最后清除缓存
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{Identity, authorize_owner};
use crate::cache::{PageCache, PostWrite, invalidate_after_write};
use crate::database::{PostStore, StoreError};
use crate::error::{AppError, FieldErrors};
use crate::models::{NewPost, Post, PostChanges};
use crate::storage::{ImageStore, ImageUpload};

const TITLE_MIN: usize = 4;
const TITLE_MAX: usize = 100;
const CONTENT_MIN: usize = 10;
const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// multipart 表单解析后的字段，更新时缺失的字段保留原值
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<ImageUpload>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn validate_post(
    title: Option<&str>,
    content: Option<&str>,
    image: Option<&ImageUpload>,
    max_image_bytes: usize,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    match title {
        None => {
            errors.insert("title".into(), "Title is required".into());
        }
        Some(t) if t.chars().count() < TITLE_MIN => {
            errors.insert(
                "title".into(),
                format!("Title must be at least {} characters", TITLE_MIN),
            );
        }
        Some(t) if t.chars().count() > TITLE_MAX => {
            errors.insert(
                "title".into(),
                format!("Title must be at most {} characters", TITLE_MAX),
            );
        }
        Some(t) if !t.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') => {
            errors.insert(
                "title".into(),
                "Title can only contain letters, numbers, and spaces".into(),
            );
        }
        Some(_) => {}
    }

    match content {
        None => {
            errors.insert("content".into(), "Content is required".into());
        }
        Some(c) if c.trim().chars().count() < CONTENT_MIN => {
            errors.insert(
                "content".into(),
                format!("Content must be at least {} characters", CONTENT_MIN),
            );
        }
        Some(c) if c.contains(['<', '>']) => {
            errors.insert(
                "content".into(),
                "Content contains disallowed characters (e.g. < or >)".into(),
            );
        }
        Some(_) => {}
    }

    if let Some(image) = image {
        if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
            errors.insert("image".into(), "Only image files are allowed".into());
        } else if image.bytes.len() > max_image_bytes {
            errors.insert(
                "image".into(),
                format!("Image must be at most {} bytes", max_image_bytes),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostStore>,
    images: Arc<dyn ImageStore>,
    cache: PageCache,
    max_image_bytes: usize,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        images: Arc<dyn ImageStore>,
        cache: PageCache,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            posts,
            images,
            cache,
            max_image_bytes,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Post, AppError> {
        self.posts
            .find(id)
            .await?
            .ok_or(AppError::NotFound("Post"))
    }

    pub async fn create(&self, identity: &Identity, form: PostForm) -> Result<Post, AppError> {
        let title = non_blank(form.title);
        let content = non_blank(form.content);
        validate_post(
            title.as_deref(),
            content.as_deref(),
            form.image.as_ref(),
            self.max_image_bytes,
        )?;
        let (Some(title), Some(content)) = (title, content) else {
            return Err(AppError::BadRequest("Title and content are required".into()));
        };

        let image_url = match &form.image {
            Some(image) => Some(self.images.upload(image).await?),
            None => None,
        };

        let created = self
            .posts
            .insert(NewPost {
                title,
                content,
                image_url: image_url.clone(),
                author_id: identity.user_id,
            })
            .await;

        let post = match created {
            Ok(post) => post,
            Err(e) => {
                if let Some(url) = image_url {
                    self.remove_image(&url).await;
                }
                return Err(e.into());
            }
        };

        invalidate_after_write(&self.cache, identity.user_id, PostWrite::Created).await;
        Ok(post)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: Uuid,
        form: PostForm,
    ) -> Result<Post, AppError> {
        let existing = self.get(id).await?;
        authorize_owner(identity, existing.author_id)?;

        let title = non_blank(form.title).unwrap_or_else(|| existing.title.clone());
        let content = non_blank(form.content).unwrap_or_else(|| existing.content.clone());
        validate_post(
            Some(&title),
            Some(&content),
            form.image.as_ref(),
            self.max_image_bytes,
        )?;

        let new_image_url = match &form.image {
            Some(image) => Some(self.images.upload(image).await?),
            None => None,
        };

        let changes = PostChanges {
            title,
            content,
            image_url: new_image_url.clone().or_else(|| existing.image_url.clone()),
        };
        let visible_change = changes.changes_visible_fields(&existing);

        let updated = match self.posts.update(id, changes).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(url) = &new_image_url {
                    self.remove_image(url).await;
                }
                return Err(match e {
                    StoreError::NotFound => AppError::NotFound("Post"),
                    other => other.into(),
                });
            }
        };

        // 新图片已经落库后再删除旧图片
        if new_image_url.is_some() {
            if let Some(old) = &existing.image_url {
                self.remove_image(old).await;
            }
        }

        invalidate_after_write(
            &self.cache,
            existing.author_id,
            PostWrite::Updated { visible_change },
        )
        .await;
        Ok(updated)
    }

    pub async fn delete(&self, identity: &Identity, id: Uuid) -> Result<(), AppError> {
        let existing = self.get(id).await?;
        authorize_owner(identity, existing.author_id)?;

        if !self.posts.delete(id).await? {
            return Err(AppError::NotFound("Post"));
        }

        if let Some(url) = &existing.image_url {
            self.remove_image(url).await;
        }

        invalidate_after_write(&self.cache, existing.author_id, PostWrite::Deleted).await;
        Ok(())
    }

    /// 图片删除失败不影响请求结果
    async fn remove_image(&self, url: &str) {
        if let Err(e) = self.images.remove(url).await {
            tracing::warn!("Failed to remove image {}: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn image(content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: "cover.png".into(),
            content_type: content_type.into(),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    fn field_errors(result: Result<(), AppError>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_a_well_formed_post() {
        assert!(
            validate_post(
                Some("Rust at work"),
                Some("Ownership makes caching honest."),
                Some(&image("image/png", 10)),
                1024,
            )
            .is_ok()
        );
    }

    #[test]
    fn reports_every_bad_field() {
        let errors = field_errors(validate_post(
            Some("Hi"),
            Some("<script>alert(1)</script>"),
            Some(&image("application/pdf", 10)),
            1024,
        ));
        assert_eq!(errors.len(), 3);
        assert!(errors["title"].contains("at least"));
        assert!(errors["content"].contains("disallowed"));
        assert!(errors["image"].contains("image files"));
    }

    #[test]
    fn missing_fields_and_oversized_images_are_rejected() {
        let errors = field_errors(validate_post(None, None, Some(&image("image/jpeg", 2048)), 1024));
        assert_eq!(errors["title"], "Title is required");
        assert_eq!(errors["content"], "Content is required");
        assert!(errors["image"].contains("at most"));

        let errors = field_errors(validate_post(
            Some("Title with punctuation!"),
            Some("long enough content"),
            None,
            1024,
        ));
        assert!(errors["title"].contains("letters, numbers"));
    }
}
