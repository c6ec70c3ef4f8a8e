mod accounts;
mod follows;
mod middleware;
mod posts;
mod public;
mod session;

pub use middleware::RequestContext;
pub use session::{CurrentAuthor, SESSION_COOKIE, Viewer};

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    accounts::AccountService, comments::CommentService, error::HttpError, feed::FeedError,
    feed::FeedService, follows::FollowService, groups::GroupService, posts::PostService,
};
use crate::cache::FragmentCache;
use crate::infra::uploads::UploadStorage;
use crate::presentation::views::{LayoutChrome, render_not_found_response};

use middleware::{log_responses, require_author, resolve_session, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub groups: Arc<GroupService>,
    pub fragments: Arc<FragmentCache>,
    pub index_cache_ttl: Duration,
    pub upload_storage: Arc<UploadStorage>,
    pub upload_limit_bytes: usize,
    pub secure_cookies: bool,
}

pub fn build_router(state: HttpState) -> Router {
    let public_routes = Router::new()
        .route("/", get(public::index))
        .route("/group/{slug}", get(public::group_posts))
        .route("/profile/{username}", get(public::profile))
        .route("/posts/{post_id}", get(public::post_detail))
        .route("/about/author", get(public::about_author))
        .route("/about/tech", get(public::about_tech))
        .route("/auth/signup", get(accounts::signup_form).post(accounts::signup))
        .route("/auth/login", get(accounts::login_form).post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
        .route("/media/{*path}", get(public::serve_media))
        .route("/static/{*path}", get(crate::infra::assets::serve_static));

    let author_routes = Router::new()
        .route("/create", get(posts::create_form).post(posts::create))
        .route(
            "/posts/{post_id}/edit",
            get(posts::edit_form).post(posts::edit),
        )
        .route("/posts/{post_id}/comment", post(posts::add_comment))
        .route("/follow", get(follows::follow_index))
        .route("/profile/{username}/follow", post(follows::follow))
        .route("/profile/{username}/unfollow", post(follows::unfollow))
        .route_layer(axum_middleware::from_fn(require_author));

    public_routes
        .merge(author_routes)
        .fallback(public::not_found)
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_session,
        ))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

/// Unknown groups, authors and posts render the not-found page; everything else is a server error.
fn feed_error_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_) => {
            render_not_found_response(chrome)
        }
        FeedError::Repo(err) => HttpError::from(err).into_response(),
    }
}
