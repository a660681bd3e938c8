use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::fs;
use tracing::debug;

use crate::error::ApiError;

/// Upload ceiling for category images.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// File storage for uploaded category images, addressed by generated
/// filename. `store` rejects bad uploads before anything touches the
/// database; `delete` is idempotent.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(
        &self,
        field: &str,
        original_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<String, ApiError>;

    async fn delete(&self, filename: &str) -> anyhow::Result<()>;

    /// Public path a stored filename is retrievable under.
    fn resolve(&self, filename: &str) -> String;
}

pub(crate) fn check_upload(content_type: &str, len: usize) -> Result<(), ApiError> {
    if !content_type.starts_with("image/") {
        return Err(ApiError::validation("only image uploads are allowed"));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::validation("image exceeds the 5 MiB limit"));
    }
    Ok(())
}

/// Collision-resistant filename: field, millisecond timestamp, random
/// component, original extension (content type as fallback).
pub(crate) fn generate_filename(field: &str, original_name: &str, content_type: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .or_else(|| ext_from_mime(content_type))
        .unwrap_or("bin");
    let millis = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    format!("{}-{}-{}.{}", field, millis, rand::random::<u32>(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(
        &self,
        field: &str,
        original_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<String, ApiError> {
        check_upload(content_type, body.len())?;
        let filename = generate_filename(field, original_name, content_type);
        let path = self.root.join(&filename);
        fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(%filename, bytes = body.len(), "stored upload");
        Ok(filename)
    }

    async fn delete(&self, filename: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.root.join(filename)).await {
            Ok(()) => Ok(()),
            // Already gone is fine.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, filename: &str) -> String {
        format!("/uploads/{}", filename)
    }
}
