use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::text::{TextKind, validate_text};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment is invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        raw_text: &str,
    ) -> Result<CommentRecord, CommentError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(CommentError::PostNotFound);
        }

        let text = validate_text(TextKind::Comment, raw_text)
            .map_err(|err| CommentError::Invalid(err.field_message()))?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text,
            })
            .await?;

        info!(
            target = "yatube::application::comments",
            post_id = %post_id,
            comment_id = %comment.id,
            "comment added"
        );
        Ok(comment)
    }
}
