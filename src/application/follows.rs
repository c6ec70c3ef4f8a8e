use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{AuthorsRepo, FollowsRepo, RepoError};
use crate::domain::entities::AuthorRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    authors: Arc<dyn AuthorsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(authors: Arc<dyn AuthorsRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { authors, follows }
    }

    /// Follow `username`. Following someone twice leaves a single edge.
    pub async fn follow(
        &self,
        follower_id: Uuid,
        username: &str,
    ) -> Result<AuthorRecord, FollowError> {
        let target = self.target(username).await?;
        let created = self.follows.follow(follower_id, target.id).await?;
        if created {
            info!(
                target = "yatube::application::follows",
                follower_id = %follower_id,
                author_id = %target.id,
                "author followed"
            );
        }
        Ok(target)
    }

    /// Stop following `username`; a missing edge is not an error.
    pub async fn unfollow(
        &self,
        follower_id: Uuid,
        username: &str,
    ) -> Result<AuthorRecord, FollowError> {
        let target = self.target(username).await?;
        let removed = self.follows.unfollow(follower_id, target.id).await?;
        if removed {
            info!(
                target = "yatube::application::follows",
                follower_id = %follower_id,
                author_id = %target.id,
                "author unfollowed"
            );
        }
        Ok(target)
    }

    async fn target(&self, username: &str) -> Result<AuthorRecord, FollowError> {
        self.authors
            .find_author_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
