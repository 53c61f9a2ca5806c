use std::path::Path;

use anyhow::Context;
use axum::{
    extract::multipart::{Field, MultipartError},
    http::StatusCode,
};
use bytes::Bytes;
use rand::Rng;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    storage::{key_from_public_path, ImageStore},
};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

pub struct UploadItem {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

impl UploadItem {
    /// Reads a whole multipart file field into memory.
    pub async fn from_field(field: Field<'_>) -> AppResult<Self> {
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field.bytes().await.map_err(multipart_error)?;
        Ok(Self { file_name, content_type, body })
    }

    /// Browsers send an empty part when no file was picked.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.file_name.as_deref().unwrap_or("").is_empty()
    }
}

/// A body cut off by the request limit is a 413, anything else a bad form.
pub fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit: MAX_UPLOAD_BYTES }
    } else {
        AppError::Validation(format!("Erro ao ler o formulário: {}", e.body_text()))
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn ext_from_file_name(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    let ok = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then(|| ext.to_ascii_lowercase())
}

pub fn validate_upload(item: &UploadItem) -> AppResult<()> {
    let ct = item.content_type.to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&ct.as_str()) {
        return Err(AppError::UnsupportedMediaType(item.content_type.clone()));
    }
    if item.body.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::PayloadTooLarge { limit: MAX_UPLOAD_BYTES });
    }
    Ok(())
}

/// `<unix-millis>-<random><.ext>`
fn generate_key(item: &UploadItem) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = item
        .file_name
        .as_deref()
        .and_then(ext_from_file_name)
        .or_else(|| ext_from_mime(&item.content_type.to_ascii_lowercase()).map(str::to_string));
    match ext {
        Some(ext) => format!("{}-{}.{}", millis, suffix, ext),
        None => format!("{}-{}", millis, suffix),
    }
}

/// Validates and stores a recipe image, returning its public path.
pub async fn store_recipe_image(store: &dyn ImageStore, item: UploadItem) -> AppResult<String> {
    validate_upload(&item)?;
    let key = generate_key(&item);
    let size = item.body.len();
    store
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%key, size, "image stored");
    Ok(store.public_path(&key))
}

/// Removes a previously stored image; failures are only logged.
pub async fn discard_image(store: &dyn ImageStore, public_path: Option<&str>) {
    let Some(path) = public_path else { return };
    let Some(key) = key_from_public_path(path) else {
        warn!(%path, "not a stored image path, skipping delete");
        return;
    };
    if let Err(e) = store.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete image");
    }
}
