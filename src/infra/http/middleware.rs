use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::{accounts::SessionError, error::ErrorReport};

use super::HttpState;
use super::session::{CurrentAuthor, SESSION_COOKIE, Viewer, login_redirect_target};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the session cookie into a [`Viewer`] for every request.
///
/// Unknown, expired or malformed tokens leave the request anonymous.
pub async fn resolve_session(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let author = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.accounts.authenticate(cookie.value()).await {
            Ok(author) => Some(author),
            Err(SessionError::Repo(err)) => {
                warn!(
                    target = "yatube::http::session",
                    error = %err,
                    "session lookup failed; treating request as anonymous"
                );
                None
            }
            Err(err) => {
                debug!(
                    target = "yatube::http::session",
                    reason = %err,
                    "ignoring session cookie"
                );
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer::new(author));
    next.run(request).await
}

/// Let signed-in authors through; send everyone else to the login form.
pub async fn require_author(mut request: Request<Body>, next: Next) -> Response {
    let author = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.author().cloned());

    match author {
        Some(author) => {
            request.extensions_mut().insert(CurrentAuthor(author));
            next.run(request).await
        }
        None => Redirect::to(&login_redirect_target(request.uri())).into_response(),
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let author_id = request
        .extensions()
        .get::<Viewer>()
        .and_then(Viewer::id)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                author_id = author_id,
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                author_id = author_id,
                "client request error",
            );
        }
    }

    response
}
