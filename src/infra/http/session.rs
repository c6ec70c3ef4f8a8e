//! Session cookies and the request-scoped view of the signed-in author.

use axum::http::Uri;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;
use url::form_urlencoded;
use uuid::Uuid;

use crate::domain::entities::AuthorRecord;

pub const SESSION_COOKIE: &str = "yatube_session";

const LOGIN_PATH: &str = "/auth/login";

/// Who is making the request. Inserted for every request by `resolve_session`.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    author: Option<AuthorRecord>,
}

impl Viewer {
    pub fn new(author: Option<AuthorRecord>) -> Self {
        Self { author }
    }

    pub fn author(&self) -> Option<&AuthorRecord> {
        self.author.as_ref()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.author.as_ref().map(|author| author.id)
    }
}

/// Signed-in author on routes guarded by `require_author`.
#[derive(Debug, Clone)]
pub struct CurrentAuthor(pub AuthorRecord);

pub fn session_cookie(
    jar: CookieJar,
    token: String,
    expires_at: OffsetDateTime,
    secure: bool,
) -> CookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .expires(expires_at),
    )
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// `/auth/login?next=...` pointing back at `uri`.
pub fn login_redirect_target(uri: &Uri) -> String {
    let original = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let encoded: String = form_urlencoded::byte_serialize(original.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={encoded}")
}

/// Accept `next` only when it points back into this site.
pub fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}
