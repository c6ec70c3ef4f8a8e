use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{error::HttpError, follows::FollowError, pagination::PageQuery},
    domain::entities::AuthorRecord,
    presentation::views::{
        FollowFeedTemplate, FollowFeedView, LayoutChrome, LayoutContext,
        render_not_found_response, render_post_list, render_template_response,
    },
};

use super::{CurrentAuthor, HttpState, feed_error_response};

/// Posts by the authors the current author follows.
pub(super) async fn follow_index(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&author)).with_title("Following");
    let page = match state.feed.follow_feed(author.id, query.requested()).await {
        Ok(page) => page,
        Err(err) => return feed_error_response(err, chrome),
    };

    match render_post_list(page) {
        Ok(listing) => {
            let view = LayoutContext::new(chrome, FollowFeedView { listing });
            render_template_response(FollowFeedTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

pub(super) async fn follow(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Path(username): Path<String>,
) -> Response {
    let result = state.follows.follow(author.id, &username).await;
    follow_response(result, &author)
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Path(username): Path<String>,
) -> Response {
    let result = state.follows.unfollow(author.id, &username).await;
    follow_response(result, &author)
}

fn follow_response(result: Result<AuthorRecord, FollowError>, viewer: &AuthorRecord) -> Response {
    match result {
        Ok(target) => Redirect::to(&format!("/profile/{}", target.username)).into_response(),
        Err(FollowError::UnknownAuthor(_)) => {
            render_not_found_response(LayoutChrome::new(Some(viewer)))
        }
        Err(FollowError::Repo(err)) => HttpError::from(err).into_response(),
    }
}
