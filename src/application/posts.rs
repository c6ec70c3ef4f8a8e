use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostWithRefs, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::text::{TextKind, validate_text};

const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const UNKNOWN_GROUP_MESSAGE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// A file picked in the post form, not yet persisted.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("image storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid image path: {0}")]
    InvalidPath(String),
}

/// File extension for an image payload, judged from its leading bytes.
/// Returns `None` for anything that is not a web image format.
pub fn detect_image_extension(bytes: &[u8]) -> Option<&'static str> {
    use imagesize::ImageType;

    match imagesize::image_type(bytes).ok()? {
        ImageType::Gif => Some("gif"),
        ImageType::Jpeg => Some("jpg"),
        ImageType::Png => Some("png"),
        ImageType::Webp => Some("webp"),
        ImageType::Bmp => Some("bmp"),
        ImageType::Ico => Some("ico"),
        _ => None,
    }
}

/// Persists post images and hands back the stored relative path.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, upload: &ImageUpload) -> Result<String, ImageStoreError>;

    async fn remove(&self, stored_path: &str) -> Result<(), ImageStoreError>;
}

#[derive(Debug, Clone)]
pub struct PostForm {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<ImageUpload>,
    /// Edit only: drop the current image when no replacement is uploaded.
    pub clear_image: bool,
}

/// Per-field messages shown next to the offending inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post form is invalid")]
    Invalid(PostFormErrors),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] ImageStoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(PostRecord),
    /// The requester does not own the post; nothing was changed.
    NotOwner,
}

#[derive(Debug, Clone)]
pub enum EditAccess {
    Allowed(PostWithRefs),
    NotOwner,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    images: Arc<dyn ImageStore>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            images,
        }
    }

    pub async fn create(&self, author_id: Uuid, form: PostForm) -> Result<PostRecord, PostError> {
        let text = self.validate(&form).await?;
        let image_path = match form.image.as_ref() {
            Some(upload) => Some(self.images.save(upload).await?),
            None => None,
        };

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id,
                group_id: form.group_id,
                text,
                image_path: image_path.clone(),
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(err) => {
                if let Some(path) = image_path.as_deref() {
                    self.discard_image(path).await;
                }
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::application::posts",
            post_id = %post.id,
            author_id = %author_id,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for the edit form, refusing anyone but its author.
    pub async fn edit_access(
        &self,
        post_id: Uuid,
        requester: Uuid,
    ) -> Result<EditAccess, PostError> {
        let post = self
            .reader
            .find_post(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        if post.post.author_id != requester {
            return Ok(EditAccess::NotOwner);
        }
        Ok(EditAccess::Allowed(post))
    }

    pub async fn edit(
        &self,
        post_id: Uuid,
        requester: Uuid,
        form: PostForm,
    ) -> Result<EditOutcome, PostError> {
        let existing = match self.edit_access(post_id, requester).await? {
            EditAccess::Allowed(post) => post.post,
            EditAccess::NotOwner => {
                info!(
                    target = "yatube::application::posts",
                    post_id = %post_id,
                    requester = %requester,
                    "edit refused for non-owner"
                );
                return Ok(EditOutcome::NotOwner);
            }
        };

        let text = self.validate(&form).await?;
        let uploaded = match form.image.as_ref() {
            Some(upload) => Some(self.images.save(upload).await?),
            None => None,
        };
        let image_path = match (uploaded.as_ref(), form.clear_image) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => None,
            (None, false) => existing.image_path.clone(),
        };

        let updated = match self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                group_id: form.group_id,
                text,
                image_path: image_path.clone(),
            })
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                if let Some(path) = uploaded.as_deref() {
                    self.discard_image(path).await;
                }
                return Err(err.into());
            }
        };

        if let Some(previous) = existing.image_path.as_deref()
            && image_path.as_deref() != Some(previous)
        {
            self.discard_image(previous).await;
        }

        info!(
            target = "yatube::application::posts",
            post_id = %post_id,
            "post updated"
        );
        Ok(EditOutcome::Updated(updated))
    }

    pub async fn delete(&self, post_id: Uuid) -> Result<(), PostError> {
        let post = self
            .reader
            .find_post(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        self.writer.delete_post(post_id).await?;
        if let Some(path) = post.post.image_path.as_deref() {
            self.discard_image(path).await;
        }
        info!(
            target = "yatube::application::posts",
            post_id = %post_id,
            "post deleted"
        );
        Ok(())
    }

    async fn validate(&self, form: &PostForm) -> Result<String, PostError> {
        let mut errors = PostFormErrors::default();

        let text = validate_text(TextKind::Post, &form.text)
            .map_err(|err| errors.text = Some(err.field_message()))
            .ok();

        if let Some(group_id) = form.group_id
            && self.groups.find_group_by_id(group_id).await?.is_none()
        {
            errors.group = Some(UNKNOWN_GROUP_MESSAGE.to_string());
        }

        if let Some(upload) = form.image.as_ref()
            && (detect_image_extension(&upload.bytes).is_none()
                || imagesize::blob_size(&upload.bytes).is_err())
        {
            errors.image = Some(INVALID_IMAGE_MESSAGE.to_string());
        }

        match text {
            Some(text) if errors.is_empty() => Ok(text),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn discard_image(&self, path: &str) {
        if let Err(err) = self.images.remove(path).await {
            warn!(
                target = "yatube::application::posts",
                path = %path,
                error = %err,
                "failed to remove image file"
            );
        }
    }
}
