//! Uploaded file metadata and the naming rules for storage keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
    "text/csv",
    "text/plain",
];

const MAX_SEGMENT_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// Strip parameters (`; charset=utf-8`) and check the allow-list.
pub fn normalize_content_type(content_type: &str) -> Result<String, AppError> {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if ALLOWED_CONTENT_TYPES.contains(&base.as_str()) {
        Ok(base)
    } else {
        Err(AppError::BadRequest(format!(
            "Content type not allowed: {content_type}"
        )))
    }
}

/// Keep `[A-Za-z0-9._-]`, replace the rest with `_`, drop leading dots.
pub fn sanitize_segment(value: &str) -> Result<String, AppError> {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_SEGMENT_LEN).collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return Err(AppError::BadRequest(format!("Invalid name: {value}")));
    }
    Ok(cleaned)
}

/// `tenant/folder/uuid-filename`.
pub fn build_key(tenant_id: Uuid, folder: &str, filename: &str) -> Result<String, AppError> {
    let folder = sanitize_segment(folder)?;
    let filename = sanitize_segment(filename)?;
    Ok(format!("{tenant_id}/{folder}/{}-{filename}", Uuid::new_v4()))
}

/// Keys must sit under the tenant's prefix and contain no traversal.
pub fn ensure_tenant_key(tenant_id: Uuid, key: &str) -> Result<(), AppError> {
    let prefix = format!("{tenant_id}/");
    let inside = key.starts_with(&prefix)
        && !key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if !inside {
        return Err(AppError::NotFound("File"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub folder: Option<String>,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileQuery {
    pub key: String,
}
