use std::{path::Path, sync::Arc};

use agora_core::{CommunityId, UserId};
use anyhow::anyhow;
use bytes::Bytes;
use object_store::{
    local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath, ObjectStore, ObjectStoreExt,
};
use ulid::Ulid;

use super::errors::{ServiceError, ServiceResult};

/// Where an upload lands. Stored names are relative to the store root.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StoragePath {
    CommunityImage(CommunityId),
    CommunityBanner(CommunityId),
    UserAvatar(UserId),
}

impl StoragePath {
    fn prefix(self) -> String {
        match self {
            Self::CommunityImage(id) => format!("communities/{id}/images"),
            Self::CommunityBanner(id) => format!("communities/{id}/banners"),
            Self::UserAvatar(id) => format!("users/{id}/avatars"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct StoredFile {
    pub(crate) bytes: Bytes,
    pub(crate) mime_type: &'static str,
}

/// Image storage for community artwork and user avatars.
#[derive(Clone)]
pub(crate) struct FileStore {
    objects: Arc<dyn ObjectStore>,
    max_bytes: usize,
}

impl FileStore {
    pub(crate) fn new(root: Option<&Path>, max_bytes: usize) -> anyhow::Result<Self> {
        let objects: Arc<dyn ObjectStore> = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .map_err(|e| anyhow!("upload root init failed: {e}"))?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(root)
                        .map_err(|e| anyhow!("upload store init failed: {e}"))?,
                )
            }
            None => Arc::new(InMemory::new()),
        };
        Ok(Self { objects, max_bytes })
    }

    /// Stores an image and returns its stored name (`<prefix>/<ulid>.<ext>`).
    pub(crate) async fn save(&self, bytes: Vec<u8>, hint: StoragePath) -> ServiceResult<String> {
        if bytes.is_empty() {
            return Err(ServiceError::invalid_state("File is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::invalid_state(format!(
                "File exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        let Some(kind) = infer::get(&bytes) else {
            return Err(ServiceError::invalid_state("File type is not recognized"));
        };
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ServiceError::invalid_state("Only image files are accepted"));
        }

        let stored_name = format!("{}/{}.{}", hint.prefix(), Ulid::new(), kind.extension());
        let object_path = ObjectPath::from(stored_name.clone());
        let mut upload = self
            .objects
            .put_multipart(&object_path)
            .await
            .map_err(|e| ServiceError::unexpected(format!("file upload failed: {e}")))?;
        if let Err(error) = upload.put_part(Bytes::from(bytes).into()).await {
            let _ = upload.abort().await;
            return Err(ServiceError::unexpected(format!(
                "file upload failed: {error}"
            )));
        }
        upload
            .complete()
            .await
            .map_err(|e| ServiceError::unexpected(format!("file upload failed: {e}")))?;
        tracing::info!(event = "files.save", stored_name = %stored_name, mime_type = kind.mime_type());
        Ok(stored_name)
    }

    pub(crate) async fn load(&self, stored_name: &str) -> ServiceResult<StoredFile> {
        let object_path = ObjectPath::from(stored_name);
        let result = self
            .objects
            .get(&object_path)
            .await
            .map_err(|_| ServiceError::not_found("File not found"))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| ServiceError::unexpected(format!("file read failed: {e}")))?;
        let mime_type = infer::get(&bytes).map_or("application/octet-stream", |kind| kind.mime_type());
        Ok(StoredFile { bytes, mime_type })
    }

    /// Best effort; a missing object is not an error.
    pub(crate) async fn delete(&self, stored_name: &str) {
        let object_path = ObjectPath::from(stored_name);
        if let Err(error) = self.objects.delete(&object_path).await {
            tracing::warn!(event = "files.delete", stored_name = %stored_name, error = %error);
        }
    }
}
