//! Avatar storage on local disk.
//!
//! Files are written under `<upload_dir>/avatars/<uuid>.<ext>` and served back
//! by the static file service mounted at `/uploads`.

use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::DomainError;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Persist an uploaded image and return its public URL path.
    pub async fn save(&self, content_type: &str, bytes: &[u8]) -> Result<String, DomainError> {
        let ext = extension_for(content_type).ok_or_else(|| {
            DomainError::Validation(format!("unsupported image type '{}'", content_type))
        })?;
        if bytes.is_empty() {
            return Err(DomainError::Validation("empty upload".to_string()));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(DomainError::Validation(format!(
                "avatar exceeds {} bytes",
                MAX_AVATAR_BYTES
            )));
        }

        let dir = self.root.join("avatars");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DomainError::Internal(format!("create {:?}: {}", dir, e)))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DomainError::Internal(format!("write {:?}: {}", path, e)))?;

        tracing::info!("Stored avatar {:?} ({} bytes)", path, bytes.len());
        Ok(format!("/uploads/avatars/{}", file_name))
    }

    /// Remove a previously stored avatar; unknown or foreign URLs are ignored.
    pub async fn remove(&self, url: &str) {
        let Some(file_name) = url.strip_prefix("/uploads/avatars/") else {
            return;
        };
        if file_name.contains('/') || file_name.contains("..") {
            return;
        }
        let path = self.root.join("avatars").join(file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove avatar {:?}: {}", path, e);
        }
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
