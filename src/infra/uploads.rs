//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::posts::{
    ImageStore, ImageStoreError, ImageUpload, detect_image_extension,
};

const IMAGE_DIRECTORY: &str = "posts";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a supported image")]
    UnsupportedImage,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<UploadStorageError> for ImageStoreError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::Io(io) => ImageStoreError::Io(io),
            other => ImageStoreError::InvalidPath(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
}

/// Uploads kept under a single root directory, addressed by relative paths.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        let extension =
            detect_image_extension(&data).ok_or(UploadStorageError::UnsupportedImage)?;

        let stored_path = build_stored_path(original_name, extension);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        Ok(StoredUpload {
            stored_path,
            checksum,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for UploadStorage {
    async fn save(&self, upload: &ImageUpload) -> Result<String, ImageStoreError> {
        let stored = self.store(&upload.filename, upload.bytes.clone()).await?;
        tracing::debug!(
            target = "yatube::infra::uploads",
            path = %stored.stored_path,
            checksum = %stored.checksum,
            "image stored"
        );
        Ok(stored.stored_path)
    }

    async fn remove(&self, stored_path: &str) -> Result<(), ImageStoreError> {
        self.delete(stored_path).await.map_err(ImageStoreError::from)
    }
}

/// The client's extension is dropped; `extension` comes from the detected format.
fn build_stored_path(original_name: &str, extension: &str) -> String {
    let identifier = Uuid::new_v4().simple();
    let stem = sanitize_stem(original_name);
    format!("{IMAGE_DIRECTORY}/{identifier}-{stem}.{extension}")
}

fn sanitize_stem(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let base = slugify(stem);
    if base.is_empty() {
        "image".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
    ];

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_stem("My Cat.PNG"), "my-cat");
        assert_eq!(sanitize_stem("???"), "image");
        assert_eq!(sanitize_stem("noext"), "noext");
    }

    #[test]
    fn stored_paths_live_under_posts() {
        let path = build_stored_path("photo.jpg", "jpg");
        assert!(path.starts_with("posts/"));
        assert!(path.ends_with("-photo.jpg"));
    }

    #[test]
    fn stored_extension_ignores_the_client_name() {
        let path = build_stored_path("evil.html", "gif");
        assert!(path.ends_with("-evil.gif"));
    }

    #[tokio::test]
    async fn rejects_traversal_and_absolute_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(matches!(
            storage.read("../secret").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.read("").await,
            Err(UploadStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn store_read_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store("small.gif", Bytes::from_static(PIXEL_GIF))
            .await
            .expect("stored");
        assert_eq!(stored.checksum.len(), 64);
        assert!(stored.stored_path.ends_with("-small.gif"));
        assert_eq!(
            storage.read(&stored.stored_path).await.expect("read"),
            Bytes::from_static(PIXEL_GIF)
        );

        storage.delete(&stored.stored_path).await.expect("deleted");
        storage
            .delete(&stored.stored_path)
            .await
            .expect("missing file is fine");
        assert!(storage.read(&stored.stored_path).await.is_err());
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        assert!(matches!(
            storage.store("empty.png", Bytes::new()).await,
            Err(UploadStorageError::EmptyPayload)
        ));
    }

    #[tokio::test]
    async fn non_image_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        assert!(matches!(
            storage
                .store("page.gif", Bytes::from_static(b"<html><script>x</script></html>"))
                .await,
            Err(UploadStorageError::UnsupportedImage)
        ));
    }
}
