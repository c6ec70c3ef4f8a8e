use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title must not be empty")]
    EmptyTitle,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("group `{0}` already exists")]
    Duplicate(String),
    #[error("unknown group `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = cmd.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }
        let slug = match cmd.slug.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => {
                validate_slug(explicit)?;
                explicit.to_string()
            }
            _ => derive_slug(&title)?,
        };

        let group = self
            .repo
            .create_group(CreateGroupParams {
                slug: slug.clone(),
                title,
                description: cmd.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::Duplicate(slug),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "yatube::application::groups",
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    /// Delete a group; its posts remain, detached from any group.
    pub async fn delete(&self, slug: &str) -> Result<(), GroupError> {
        let group = self
            .repo
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| GroupError::NotFound(slug.to_string()))?;
        self.repo.delete_group(group.id).await?;
        info!(
            target = "yatube::application::groups",
            slug = %group.slug,
            "group deleted"
        );
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        self.repo.list_groups().await.map_err(GroupError::from)
    }
}
