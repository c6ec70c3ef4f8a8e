use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        comments::CommentError,
        error::HttpError,
        groups::GroupError,
        posts::{EditAccess, EditOutcome, ImageUpload, PostError, PostForm, PostFormErrors},
    },
    domain::entities::GroupRecord,
    presentation::views::{
        LayoutChrome, LayoutContext, PostDetailTemplate, PostDetailView, PostFormTemplate,
        PostFormView, media_url, render_not_found_response, render_template_response,
    },
};

use super::{CurrentAuthor, HttpState, feed_error_response};

const SOURCE: &str = "infra::http::posts";

/// Raw fields of the multipart post form.
#[derive(Debug, Default)]
struct PostFormPayload {
    text: String,
    group: Option<Uuid>,
    image: Option<ImageUpload>,
    clear_image: bool,
}

impl PostFormPayload {
    fn into_form(self) -> PostForm {
        PostForm {
            text: self.text,
            group_id: self.group,
            image: self.image,
            clear_image: self.clear_image,
        }
    }
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormPayload, HttpError> {
    let mut payload = PostFormPayload::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(HttpError::from_error(
                    SOURCE,
                    err.status(),
                    "Invalid form data",
                    &err,
                ));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                payload.text = field.text().await.map_err(invalid_form_data)?;
            }
            Some("group") => {
                let raw = field.text().await.map_err(invalid_form_data)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = Uuid::parse_str(raw).map_err(|err| {
                        HttpError::from_error(
                            SOURCE,
                            StatusCode::BAD_REQUEST,
                            "Invalid group",
                            &err,
                        )
                    })?;
                    payload.group = Some(id);
                }
            }
            Some("clear_image") => {
                let raw = field.text().await.map_err(invalid_form_data)?;
                payload.clear_image = matches!(
                    raw.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "yes"
                );
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string();
                let bytes = field.bytes().await.map_err(invalid_form_data)?;
                // An untouched file input still submits an empty part.
                if !filename.is_empty() || !bytes.is_empty() {
                    payload.image = Some(ImageUpload {
                        filename: if filename.is_empty() {
                            "image".to_string()
                        } else {
                            filename
                        },
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(payload)
}

fn invalid_form_data(err: axum_extra::extract::multipart::MultipartError) -> HttpError {
    HttpError::from_error(SOURCE, err.status(), "Invalid form data", &err)
}

fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

async fn load_groups(state: &HttpState) -> Result<Vec<GroupRecord>, HttpError> {
    state.groups.list().await.map_err(|err| match err {
        GroupError::Repo(err) => HttpError::from(err),
        other => HttpError::internal(SOURCE, &other),
    })
}

fn post_error_response(err: PostError, chrome: LayoutChrome) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(chrome),
        PostError::Repo(err) => HttpError::from(err).into_response(),
        other => HttpError::internal(SOURCE, &other).into_response(),
    }
}

struct FormPage {
    chrome: LayoutChrome,
    action: String,
    is_edit: bool,
    text: String,
    group: Option<Uuid>,
    image_path: Option<String>,
    errors: PostFormErrors,
}

async fn render_form(state: &HttpState, page: FormPage) -> Response {
    let groups = match load_groups(state).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    let mut content = PostFormView::new(page.action, page.is_edit, &groups, page.group);
    content.text = page.text;
    content.image_url = page.image_path.as_deref().map(media_url);
    content.errors = page.errors;

    let title = if page.is_edit { "Edit post" } else { "New post" };
    let view = LayoutContext::new(page.chrome.with_title(title), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
) -> Response {
    render_form(
        &state,
        FormPage {
            chrome: LayoutChrome::new(Some(&author)),
            action: "/create".to_string(),
            is_edit: false,
            text: String::new(),
            group: None,
            image_path: None,
            errors: PostFormErrors::default(),
        },
    )
    .await
}

pub(super) async fn create(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    mut multipart: Multipart,
) -> Response {
    let payload = match read_post_form(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };
    let text = payload.text.clone();
    let group = payload.group;
    let chrome = LayoutChrome::new(Some(&author));

    match state.posts.create(author.id, payload.into_form()).await {
        Ok(_) => Redirect::to(&format!("/profile/{}", author.username)).into_response(),
        Err(PostError::Invalid(errors)) => {
            render_form(
                &state,
                FormPage {
                    chrome,
                    action: "/create".to_string(),
                    is_edit: false,
                    text,
                    group,
                    image_path: None,
                    errors,
                },
            )
            .await
        }
        Err(err) => post_error_response(err, chrome),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Path(post_id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&author));
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.edit_access(post_id, author.id).await {
        Ok(EditAccess::Allowed(post)) => {
            render_form(
                &state,
                FormPage {
                    chrome,
                    action: format!("/posts/{post_id}/edit"),
                    is_edit: true,
                    text: post.post.text,
                    group: post.post.group_id,
                    image_path: post.post.image_path,
                    errors: PostFormErrors::default(),
                },
            )
            .await
        }
        Ok(EditAccess::NotOwner) => Redirect::to(&format!("/posts/{post_id}")).into_response(),
        Err(err) => post_error_response(err, chrome),
    }
}

pub(super) async fn edit(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Path(post_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&author));
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };
    let payload = match read_post_form(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };
    let text = payload.text.clone();
    let group = payload.group;

    match state.posts.edit(post_id, author.id, payload.into_form()).await {
        Ok(EditOutcome::Updated(_)) | Ok(EditOutcome::NotOwner) => {
            Redirect::to(&format!("/posts/{post_id}")).into_response()
        }
        Err(PostError::Invalid(errors)) => {
            let image_path = match state.posts.edit_access(post_id, author.id).await {
                Ok(EditAccess::Allowed(post)) => post.post.image_path,
                Ok(EditAccess::NotOwner) => None,
                Err(err) => return post_error_response(err, chrome),
            };
            render_form(
                &state,
                FormPage {
                    chrome,
                    action: format!("/posts/{post_id}/edit"),
                    is_edit: true,
                    text,
                    group,
                    image_path,
                    errors,
                },
            )
            .await
        }
        Err(err) => post_error_response(err, chrome),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Extension(CurrentAuthor(author)): Extension<CurrentAuthor>,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&author));
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome);
    };

    match state
        .comments
        .add_comment(post_id, author.id, &form.text)
        .await
    {
        Ok(_) => Redirect::to(&format!("/posts/{post_id}")).into_response(),
        Err(CommentError::PostNotFound) => render_not_found_response(chrome),
        Err(CommentError::Invalid(message)) => {
            match state.feed.post_detail(post_id, Some(author.id)).await {
                Ok(detail) => {
                    let content = PostDetailView::from(detail).with_comment_error(form.text, message);
                    let view = LayoutContext::new(chrome, content);
                    render_template_response(PostDetailTemplate { view }, StatusCode::OK)
                }
                Err(err) => feed_error_response(err, chrome),
            }
        }
        Err(CommentError::Repo(err)) => HttpError::from(err).into_response(),
    }
}
