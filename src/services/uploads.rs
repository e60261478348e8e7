use std::path::Path;

use chrono::Utc;
use tokio::fs;

use crate::{
    dto::products::UploadedImage,
    error::{AppError, AppResult},
};

/// URL prefix under which `UPLOAD_DIR` is served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Reduces a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Stores an uploaded product image and returns the URL path it is served from.
pub async fn save_image(upload_dir: &Path, image: UploadedImage) -> AppResult<String> {
    if !image.content_type.starts_with("image/") {
        return Err(AppError::bad_request(format!(
            "unsupported image type '{}'",
            image.content_type
        )));
    }
    if image.bytes.is_empty() {
        return Err(AppError::bad_request("uploaded image is empty"));
    }

    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let file_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(&image.file_name)
    );
    fs::write(upload_dir.join(&file_name), &image.bytes)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    tracing::debug!(file = %file_name, bytes = image.bytes.len(), "product image stored");
    Ok(format!("{UPLOADS_URL_PREFIX}/{file_name}"))
}
