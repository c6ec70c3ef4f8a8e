use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    AuthorsRepo, CommentWithAuthor, CommentsRepo, FollowsRepo, GroupsRepo, PostFilter,
    PostWithRefs, PostsRepo, RepoError,
};
use crate::domain::entities::{AuthorRecord, GroupRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post `{0}`")]
    UnknownPost(Uuid),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostWithRefs>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: AuthorRecord,
    pub page: Page<PostWithRefs>,
    pub posts_amount: u64,
    /// `None` when the viewer is anonymous or looking at their own profile.
    pub following: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostWithRefs,
    pub comments: Vec<CommentWithAuthor>,
    pub posts_amount: u64,
    pub can_edit: bool,
}

/// Read side of the site: every paginated listing plus the post detail view.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    authors: Arc<dyn AuthorsRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        authors: Arc<dyn AuthorsRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            authors,
            groups,
            comments,
            follows,
            paginator,
        }
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    /// Resolve `requested` to the page number that will actually be shown for `filter`.
    pub async fn resolve_page(&self, filter: PostFilter, requested: u64) -> Result<u64, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        Ok(self.paginator.clamp(requested, total))
    }

    pub async fn index(&self, requested: u64) -> Result<Page<PostWithRefs>, FeedError> {
        self.paginate(PostFilter::All, requested).await
    }

    pub async fn group(&self, slug: &str, requested: u64) -> Result<GroupListing, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let page = self.paginate(PostFilter::Group(group.id), requested).await?;
        Ok(GroupListing { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        requested: u64,
        viewer: Option<Uuid>,
    ) -> Result<ProfileListing, FeedError> {
        let author = self
            .authors
            .find_author_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;
        let page = self.paginate(PostFilter::Author(author.id), requested).await?;
        let following = match viewer {
            Some(viewer_id) if viewer_id != author.id => {
                Some(self.follows.is_following(viewer_id, author.id).await?)
            }
            _ => None,
        };

        Ok(ProfileListing {
            posts_amount: page.total,
            author,
            page,
            following,
        })
    }

    /// Posts by every author `viewer` follows, newest first.
    pub async fn follow_feed(
        &self,
        viewer: Uuid,
        requested: u64,
    ) -> Result<Page<PostWithRefs>, FeedError> {
        self.paginate(PostFilter::FollowedBy(viewer), requested).await
    }

    pub async fn post_detail(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(FeedError::UnknownPost(post_id))?;
        let comments = self.comments.list_comments(post_id).await?;
        let posts_amount = self
            .posts
            .count_posts(PostFilter::Author(post.post.author_id))
            .await?;
        let can_edit = viewer == Some(post.post.author_id);

        Ok(PostDetail {
            post,
            comments,
            posts_amount,
            can_edit,
        })
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        requested: u64,
    ) -> Result<Page<PostWithRefs>, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let number = self.paginator.clamp(requested, total);
        let items = self
            .posts
            .list_posts(filter, self.paginator.window(number))
            .await?;
        Ok(Page::new(
            items,
            number,
            self.paginator.num_pages(total),
            total,
        ))
    }
}
