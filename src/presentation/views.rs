use crate::application::accounts::SignupErrors;
use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{GroupListing, PostDetail, ProfileListing};
use crate::application::pagination::Page;
use crate::application::posts::PostFormErrors;
use crate::application::repos::{CommentWithAuthor, PostWithRefs};
use crate::domain::entities::{AuthorRecord, GroupRecord};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_fragment(template).map(Html)
}

/// Render a template to a bare string, e.g. for storing in the fragment cache.
pub fn render_fragment<T: Template>(template: T) -> Result<String, HttpError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in author as shown in the navigation bar.
#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
}

#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub viewer: Option<ViewerView>,
    pub title: String,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&AuthorRecord>) -> Self {
        Self {
            viewer: viewer.map(|author| ViewerView {
                username: author.username.clone(),
            }),
            title: String::new(),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            viewer: chrome.viewer,
            title: chrome.title,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: Uuid,
    pub text: String,
    pub author_username: String,
    pub published: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
}

impl From<PostWithRefs> for PostCard {
    fn from(value: PostWithRefs) -> Self {
        Self {
            id: value.post.id,
            published: format_date(value.post.created_at),
            image_url: value.post.image_path.as_deref().map(media_url),
            text: value.post.text,
            author_username: value.author_username,
            group: value.group.map(|group| GroupBadge {
                slug: group.slug,
                title: group.title,
            }),
        }
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

impl PaginationView {
    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

/// A page of post cards plus its navigation, shared by every listing template.
#[derive(Clone)]
pub struct PostListView {
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl From<Page<PostWithRefs>> for PostListView {
    fn from(page: Page<PostWithRefs>) -> Self {
        let pagination = PaginationView {
            number: page.number,
            num_pages: page.num_pages,
            previous: page.has_previous().then(|| page.number - 1),
            next: page.has_next().then(|| page.number + 1),
        };
        Self {
            posts: page.items.into_iter().map(PostCard::from).collect(),
            pagination,
        }
    }
}

/// A page of post cards with its navigation. Rendered on its own so the home
/// page can keep it in the fragment cache and other listings can embed it.
#[derive(Template)]
#[template(path = "includes/post_list.html")]
pub struct PostListTemplate {
    pub listing: PostListView,
}

pub fn render_post_list(page: Page<PostWithRefs>) -> Result<String, HttpError> {
    render_fragment(PostListTemplate {
        listing: page.into(),
    })
}

/// Listing pages embed an already rendered post list.
pub struct IndexView {
    pub listing: String,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct GroupView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub listing: String,
}

impl GroupView {
    pub fn new(value: GroupListing) -> Result<Self, HttpError> {
        Ok(Self {
            listing: render_post_list(value.page)?,
            slug: value.group.slug,
            title: value.group.title,
            description: value.group.description,
        })
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupView>,
}

pub struct ProfileView {
    pub username: String,
    pub posts_amount: u64,
    pub following: Option<bool>,
    pub listing: String,
}

impl ProfileView {
    pub fn new(value: ProfileListing) -> Result<Self, HttpError> {
        Ok(Self {
            listing: render_post_list(value.page)?,
            username: value.author.username,
            posts_amount: value.posts_amount,
            following: value.following,
        })
    }

    pub fn can_follow(&self) -> bool {
        self.following == Some(false)
    }

    pub fn can_unfollow(&self) -> bool {
        self.following == Some(true)
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct FollowFeedView {
    pub listing: String,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowFeedTemplate {
    pub view: LayoutContext<FollowFeedView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub published: String,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(value: CommentWithAuthor) -> Self {
        Self {
            published: format_date(value.comment.created_at),
            text: value.comment.text,
            author_username: value.author_username,
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub posts_amount: u64,
    pub can_edit: bool,
    pub comment_text: String,
    pub comment_error: Option<String>,
}

impl From<PostDetail> for PostDetailView {
    fn from(value: PostDetail) -> Self {
        Self {
            post: value.post.into(),
            comments: value.comments.into_iter().map(CommentView::from).collect(),
            posts_amount: value.posts_amount,
            can_edit: value.can_edit,
            comment_text: String::new(),
            comment_error: None,
        }
    }
}

impl PostDetailView {
    /// Keep the rejected comment text in the form alongside its message.
    pub fn with_comment_error(self, text: String, error: String) -> Self {
        Self {
            comment_text: text,
            comment_error: Some(error),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: Uuid,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub image_url: Option<String>,
    pub errors: PostFormErrors,
}

impl PostFormView {
    pub fn new(
        action: String,
        is_edit: bool,
        groups: &[GroupRecord],
        selected: Option<Uuid>,
    ) -> Self {
        Self {
            is_edit,
            action,
            text: String::new(),
            groups: groups
                .iter()
                .map(|group| GroupOption {
                    id: group.id,
                    title: group.title.clone(),
                    selected: Some(group.id) == selected,
                })
                .collect(),
            image_url: None,
            errors: PostFormErrors::default(),
        }
    }

    pub fn no_group_selected(&self) -> bool {
        !self.groups.iter().any(|group| group.selected)
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Default)]
pub struct LoginView {
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Default)]
pub struct SignupView {
    pub username: String,
    pub errors: SignupErrors,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub heading: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            heading: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "errors/404.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

pub fn format_date(value: OffsetDateTime) -> String {
    value.format(DATE_FORMAT).unwrap_or_default()
}
