use axum::{
    Extension, Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        accounts::{AccountError, SessionError, SignupCommand},
        error::HttpError,
    },
    presentation::views::{
        LayoutChrome, LayoutContext, LoginTemplate, LoginView, SignupTemplate, SignupView,
        render_template_response,
    },
};

use super::session::{SESSION_COOKIE, clear_session_cookie, safe_next, session_cookie};
use super::{HttpState, Viewer};

const SOURCE: &str = "infra::http::accounts";
const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    password: String,
    password_confirm: String,
}

fn account_error(err: AccountError) -> Response {
    match err {
        AccountError::Repo(err) => HttpError::from(err).into_response(),
        other => HttpError::internal(SOURCE, &other).into_response(),
    }
}

pub(super) async fn login_form(
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<NextQuery>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.author()).with_title("Log in");
    let content = LoginView {
        next: safe_next(query.next.as_deref()),
        ..LoginView::default()
    };
    let view = LayoutContext::new(chrome, content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref());

    match state.accounts.login(form.username.trim(), &form.password).await {
        Ok(issued) => {
            info!(
                target = "yatube::http::accounts",
                author_id = %issued.author.id,
                "author logged in"
            );
            let jar = session_cookie(jar, issued.token, issued.expires_at, state.secure_cookies);
            (jar, Redirect::to(&next)).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let chrome = LayoutChrome::default().with_title("Log in");
            let content = LoginView {
                username: form.username,
                next,
                error: Some(INVALID_LOGIN_MESSAGE.to_string()),
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error(err),
    }
}

pub(super) async fn signup_form(Extension(viewer): Extension<Viewer>) -> Response {
    let chrome = LayoutChrome::new(viewer.author()).with_title("Sign up");
    let view = LayoutContext::new(chrome, SignupView::default());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let command = SignupCommand {
        username: form.username.clone(),
        password: form.password,
        password_confirm: form.password_confirm,
    };

    match state.accounts.signup(command).await {
        Ok(issued) => {
            let jar = session_cookie(jar, issued.token, issued.expires_at, state.secure_cookies);
            (jar, Redirect::to("/")).into_response()
        }
        Err(AccountError::Invalid(errors)) => {
            let chrome = LayoutChrome::default().with_title("Sign up");
            let content = SignupView {
                username: form.username,
                errors,
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error(err),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.accounts.logout(cookie.value()).await {
            Ok(()) | Err(SessionError::Malformed) => {}
            Err(err) => {
                warn!(
                    target = "yatube::http::accounts",
                    error = %err,
                    "failed to revoke session during logout"
                );
            }
        }
    }

    (clear_session_cookie(jar), Redirect::to("/")).into_response()
}
