use axum::extract::Multipart;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, services::PostForm, storage::ImageUpload};

/// 分页参数按字符串接收，非法值回落到默认值
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize", alias = "limit")]
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {
    pub message: String,
}

fn bad_form(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid form data: {}", e))
}

/// 读取 multipart 表单：title、content 和可选的 image 文件
///
/// 没有文件名或内容为空的 image 字段视为未上传。
pub async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => form.title = Some(field.text().await.map_err(bad_form)?),
            Some("content") => form.content = Some(field.text().await.map_err(bad_form)?),
            Some("image") => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                if bytes.is_empty() {
                    continue;
                }
                form.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}
