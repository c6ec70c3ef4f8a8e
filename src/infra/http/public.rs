use std::io::ErrorKind;

use axum::{
    Extension,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{error::HttpError, feed::FeedError, pagination::PageQuery, repos::PostFilter},
    cache::FragmentKey,
    infra::uploads::UploadStorageError,
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, GroupTemplate, GroupView, IndexTemplate,
        IndexView, LayoutChrome, LayoutContext, PostDetailTemplate, PostDetailView,
        ProfileTemplate, ProfileView, render_not_found_response, render_post_list,
        render_template_response,
    },
};

use super::{HttpState, Viewer, feed_error_response};

/// Home page. The post list is served from the fragment cache, so new or removed
/// posts show up only once the cached page expires.
pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.author());

    let number = match state
        .feed
        .resolve_page(PostFilter::All, query.requested())
        .await
    {
        Ok(number) => number,
        Err(err) => return feed_error_response(err, chrome),
    };

    let feed = &state.feed;
    let listing = state
        .fragments
        .get_or_compute(
            FragmentKey::index_page(number),
            state.index_cache_ttl,
            || async move {
                let page = feed.index(number).await.map_err(|err| match err {
                    FeedError::Repo(err) => HttpError::from(err),
                    other => HttpError::internal("infra::http::public::index", &other),
                })?;
                render_post_list(page)
            },
        )
        .await;

    match listing {
        Ok(listing) => {
            let view = LayoutContext::new(chrome, IndexView { listing });
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.author());
    let listing = match state.feed.group(&slug, query.requested()).await {
        Ok(listing) => listing,
        Err(err) => return feed_error_response(err, chrome),
    };

    let title = listing.group.title.clone();
    match GroupView::new(listing) {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.author());
    let listing = match state
        .feed
        .profile(&username, query.requested(), viewer.id())
        .await
    {
        Ok(listing) => listing,
        Err(err) => return feed_error_response(err, chrome),
    };

    let title = format!("Profile of {}", listing.author.username);
    match ProfileView::new(listing) {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.author());
    let Ok(post_id) = Uuid::parse_str(&post_id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(post_id, viewer.id()).await {
        Ok(detail) => {
            let title = post_title(&detail.post.post.text);
            let view = LayoutContext::new(chrome.with_title(title), PostDetailView::from(detail));
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(err, chrome),
    }
}

pub(super) async fn about_author(Extension(viewer): Extension<Viewer>) -> Response {
    let chrome = LayoutChrome::new(viewer.author()).with_title("About the author");
    let view = LayoutContext::new(chrome, ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

pub(super) async fn about_tech(Extension(viewer): Extension<Viewer>) -> Response {
    let chrome = LayoutChrome::new(viewer.author()).with_title("Technologies");
    let view = LayoutContext::new(chrome, ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}

pub(super) async fn not_found(Extension(viewer): Extension<Viewer>) -> Response {
    render_not_found_response(LayoutChrome::new(viewer.author()))
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::internal(SOURCE, &err).into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// First thirty characters of the post text, used as the page title.
fn post_title(text: &str) -> String {
    text.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_title_truncates_on_char_boundaries() {
        assert_eq!(post_title("short"), "short");
        let long = "ж".repeat(40);
        assert_eq!(post_title(&long).chars().count(), 30);
    }
}
