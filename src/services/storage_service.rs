//! File uploads on local disk or an S3-compatible object store.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use uuid::Uuid;

use super::Context;
use crate::config::{Config, StorageDriver};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::file::{StoredFile, build_key, ensure_tenant_key, normalize_content_type};
use crate::resilience::{self, Breaker};

const MODULE: &str = "files";
const DEFAULT_FOLDER: &str = "general";

/// Where file bytes live. Keys are already sanitised and tenant-prefixed.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, content_type: &str, data: &[u8]) -> Result<String, AppError>;

    /// Remove the object. A missing key is `NotFound("File")`.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

pub struct LocalDiskStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl FileStorage for LocalDiskStorage {
    async fn put(&self, key: &str, _content_type: &str, data: &[u8]) -> Result<String, AppError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound("File")),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

/// Plain HTTP PUT/DELETE against `{base_url}/{bucket}/{key}` with bearer auth.
pub struct S3Storage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
    breaker: Breaker,
}

impl S3Storage {
    pub fn new(base_url: &str, bucket: &str, token: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
            breaker: resilience::breaker(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.base_url, self.bucket)
    }

    /// Send through the breaker. Transport errors and 5xx count as failures.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<StatusCode, AppError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let call = async move {
            let response = request.send().await.map_err(|e| e.to_string())?;
            let status = response.status();
            if status.is_server_error() {
                return Err(format!("Object storage answered {status}"));
            }
            Ok(status)
        };
        resilience::guarded(&self.breaker, "object storage", call, AppError::Storage).await
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn put(&self, key: &str, content_type: &str, data: &[u8]) -> Result<String, AppError> {
        let url = self.object_url(key);
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(data.to_vec());
        let status = self.send(request).await?;
        if !status.is_success() {
            return Err(AppError::Storage(format!("Upload rejected with {status}")));
        }
        Ok(url)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let status = self.send(self.client.delete(self.object_url(key))).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("File"));
        }
        if !status.is_success() {
            return Err(AppError::Storage(format!("Delete rejected with {status}")));
        }
        Ok(())
    }
}

/// Pick the backend named by `STORAGE_DRIVER`.
pub fn from_config(config: &Config) -> Result<Box<dyn FileStorage>, AppError> {
    match config.storage_driver {
        StorageDriver::Local => Ok(Box::new(LocalDiskStorage::new(
            &config.storage_local_dir,
            &config.storage_public_base_url,
        ))),
        StorageDriver::S3 => {
            let (Some(base_url), Some(bucket)) = (&config.s3_base_url, &config.s3_bucket) else {
                return Err(AppError::Internal(
                    "S3 storage needs S3_BASE_URL and S3_BUCKET".to_string(),
                ));
            };
            Ok(Box::new(S3Storage::new(
                base_url,
                bucket,
                config.s3_bearer_token.clone(),
            )?))
        }
    }
}

pub struct Upload<'a> {
    pub folder: Option<String>,
    pub filename: String,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub async fn upload(
    ctx: &Context,
    storage: &dyn FileStorage,
    max_bytes: u64,
    auth: &AuthContext,
    upload: Upload<'_>,
) -> Result<StoredFile, AppError> {
    let size = upload.data.len() as u64;
    if size == 0 {
        return Err(AppError::bad_request("File is empty"));
    }
    if size > max_bytes {
        return Err(AppError::BadRequest(format!(
            "File exceeds the {max_bytes} byte limit"
        )));
    }
    let content_type = normalize_content_type(upload.content_type)?;
    let folder = upload.folder.as_deref().unwrap_or(DEFAULT_FOLDER);
    let key = build_key(auth.tenant_id, folder, &upload.filename)?;

    let url = storage.put(&key, &content_type, upload.data).await?;
    tracing::info!(tenant_id = %auth.tenant_id, key = %key, size, "File stored");

    let file = StoredFile {
        key,
        url,
        size,
        content_type,
    };
    ctx.audit(
        auth,
        AuditEntry {
            entity_id: None,
            ..AuditEntry::new(
                AuditAction::Create,
                MODULE,
                "file",
                Uuid::nil(),
                format!("File {} uploaded", file.key),
            )
            .with_new(&file)
        },
    )
    .await;
    Ok(file)
}

pub async fn delete(
    ctx: &Context,
    storage: &dyn FileStorage,
    auth: &AuthContext,
    key: &str,
) -> Result<(), AppError> {
    ensure_tenant_key(auth.tenant_id, key)?;
    storage.delete(key).await?;

    ctx.audit(
        auth,
        AuditEntry {
            entity_id: None,
            ..AuditEntry::new(
                AuditAction::Delete,
                MODULE,
                "file",
                Uuid::nil(),
                format!("File {key} deleted"),
            )
        },
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn pdf<'a>(filename: &str, data: &'a [u8]) -> Upload<'a> {
        Upload {
            folder: Some("absences".into()),
            filename: filename.into(),
            content_type: "application/pdf",
            data,
        }
    }

    #[tokio::test]
    async fn upload_writes_under_the_tenant_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path(), "/files/");
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let file = upload(&ctx, &storage, 1024, &auth, pdf("medical cert.pdf", b"%PDF-1.7"))
            .await
            .unwrap();
        assert!(file.key.starts_with(&format!("{}/absences/", auth.tenant_id)));
        assert!(file.key.ends_with("-medical_cert.pdf"));
        assert_eq!(file.url, format!("/files/{}", file.key));
        assert_eq!(file.size, 8);

        let on_disk = tokio::fs::read(storage.path(&file.key)).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.7");

        delete(&ctx, &storage, &auth, &file.key).await.unwrap();
        assert!(matches!(
            delete(&ctx, &storage, &auth, &file.key).await,
            Err(AppError::NotFound("File"))
        ));
    }

    #[tokio::test]
    async fn rejects_oversized_and_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path(), "/files");
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let big = upload(&ctx, &storage, 4, &auth, pdf("a.pdf", b"12345")).await;
        assert!(matches!(big, Err(AppError::BadRequest(_))));

        let mut exe = pdf("a.exe", b"MZ");
        exe.content_type = "application/x-msdownload";
        assert!(matches!(
            upload(&ctx, &storage, 1024, &auth, exe).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn other_tenants_keys_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path(), "/files");
        let ctx = testing::context();
        let owner = testing::admin(&ctx).await;
        let intruder = testing::admin(&ctx).await;

        let file = upload(&ctx, &storage, 1024, &owner, pdf("a.pdf", b"data"))
            .await
            .unwrap();
        assert!(matches!(
            delete(&ctx, &storage, &intruder, &file.key).await,
            Err(AppError::NotFound("File"))
        ));
        let traversal = format!("{}/../{}", intruder.tenant_id, file.key);
        assert!(delete(&ctx, &storage, &intruder, &traversal).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_object_store_is_a_storage_error() {
        let storage = S3Storage::new("http://127.0.0.1:9", "bucket", None).unwrap();
        let result = storage.put("t/general/a.txt", "text/plain", b"hi").await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
