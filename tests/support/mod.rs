//! In-memory repositories and router helpers shared by the integration tests.
#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::accounts::{AccountService, AccountSettings, SignupCommand};
use yatube::application::comments::CommentService;
use yatube::application::feed::FeedService;
use yatube::application::follows::FollowService;
use yatube::application::groups::GroupService;
use yatube::application::pagination::{PageRequest, Paginator};
use yatube::application::posts::PostService;
use yatube::application::repos::{
    AuthorsRepo, CommentWithAuthor, CommentsRepo, CreateAuthorParams, CreateCommentParams,
    CreateGroupParams, CreatePostParams, CreateSessionParams, FollowsRepo, GroupRef, GroupsRepo,
    PostFilter, PostWithRefs, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
    UpdatePostParams,
};
use yatube::cache::{CacheConfig, FragmentCache};
use yatube::domain::entities::{
    AuthorRecord, CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord,
};
use yatube::infra::http::{HttpState, SESSION_COOKIE, build_router};
use yatube::infra::uploads::UploadStorage;

pub const INDEX_TTL: Duration = Duration::from_secs(20);

#[derive(Default)]
struct Tables {
    seq: u64,
    authors: Vec<AuthorRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<(u64, PostRecord)>,
    comments: Vec<(u64, CommentRecord)>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn with_refs(&self, post: &PostRecord) -> PostWithRefs {
        let author_username = self
            .authors
            .iter()
            .find(|author| author.id == post.author_id)
            .map(|author| author.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        PostWithRefs {
            post: post.clone(),
            author_username,
            group,
        }
    }

    fn matches(&self, post: &PostRecord, filter: PostFilter) -> bool {
        if post.text.is_empty() {
            return false;
        }
        match filter {
            PostFilter::All => true,
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::FollowedBy(follower_id) => self
                .follows
                .iter()
                .any(|edge| edge.follower_id == follower_id && edge.author_id == post.author_id),
        }
    }

    fn newest_first(&self, filter: PostFilter) -> Vec<&PostRecord> {
        let mut matching: Vec<&(u64, PostRecord)> = self
            .posts
            .iter()
            .filter(|(_, post)| self.matches(post, filter))
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));
        matching.into_iter().map(|(_, post)| post).collect()
    }
}

/// Every repository trait over one set of in-memory tables, with the same
/// cascade rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn post_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.tables.lock().await.comments.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.tables.lock().await.follows.len()
    }

    pub async fn post(&self, id: Uuid) -> Option<PostRecord> {
        self.tables
            .lock()
            .await
            .posts
            .iter()
            .find(|(_, post)| post.id == id)
            .map(|(_, post)| post.clone())
    }
}

#[async_trait]
impl AuthorsRepo for MemoryStore {
    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .authors
            .iter()
            .any(|author| author.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "authors_username_key".to_string(),
            });
        }
        let record = AuthorRecord {
            id: Uuid::new_v4(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.authors.push(record.clone());
        Ok(record)
    }

    async fn find_author_by_id(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.authors.iter().find(|author| author.id == id).cloned())
    }

    async fn find_author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .authors
            .iter()
            .find(|author| author.username == username)
            .cloned())
    }

    async fn delete_author(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let owned_posts: Vec<Uuid> = tables
            .posts
            .iter()
            .filter(|(_, post)| post.author_id == id)
            .map(|(_, post)| post.id)
            .collect();
        tables.authors.retain(|author| author.id != id);
        tables.posts.retain(|(_, post)| post.author_id != id);
        tables.comments.retain(|(_, comment)| {
            comment.author_id != id && !owned_posts.contains(&comment.post_id)
        });
        tables
            .follows
            .retain(|edge| edge.follower_id != id && edge.author_id != id);
        tables.sessions.retain(|session| session.author_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "post_groups_slug_key".to_string(),
            });
        }
        let record = GroupRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.groups.push(record.clone());
        Ok(record)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut groups = tables.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.groups.retain(|group| group.id != id);
        for (_, post) in tables.posts.iter_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostWithRefs>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .newest_first(filter)
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|post| tables.with_refs(post))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.newest_first(filter).len() as u64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostWithRefs>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .find(|(_, post)| post.id == id)
            .map(|(_, post)| tables.with_refs(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables
            .authors
            .iter()
            .any(|author| author.id == params.author_id)
        {
            return Err(RepoError::InvalidInput {
                message: "posts_author_id_fkey".to_string(),
            });
        }
        let record = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            group_id: params.group_id,
            text: params.text,
            image_path: params.image_path,
            created_at: OffsetDateTime::now_utc(),
        };
        let seq = tables.next_seq();
        tables.posts.push((seq, record.clone()));
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let (_, post) = tables
            .posts
            .iter_mut()
            .find(|(_, post)| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.group_id = params.group_id;
        post.text = params.text;
        post.image_path = params.image_path;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.posts.retain(|(_, post)| post.id != id);
        tables.comments.retain(|(_, comment)| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        let seq = tables.next_seq();
        tables.comments.push((seq, record.clone()));
        Ok(record)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let tables = self.tables.lock().await;
        let mut comments: Vec<&(u64, CommentRecord)> = tables
            .comments
            .iter()
            .filter(|(_, comment)| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(comments
            .into_iter()
            .map(|(_, comment)| CommentWithAuthor {
                comment: comment.clone(),
                author_username: tables
                    .authors
                    .iter()
                    .find(|author| author.id == comment.author_id)
                    .map(|author| author.username.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .follows
            .iter()
            .any(|edge| edge.follower_id == follower_id && edge.author_id == author_id)
        {
            return Ok(false);
        }
        tables.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            follower_id,
            author_id,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn unfollow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.follower_id == follower_id && edge.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn is_following(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .follows
            .iter()
            .any(|edge| edge.follower_id == follower_id && edge.author_id == author_id))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let record = SessionRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        tables.sessions.push(record.clone());
        Ok(record)
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, prefix: &str) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.sessions.retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| !session.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

/// Services wired over a [`MemoryStore`], plus the router built from them.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    pub router: Router,
    _uploads: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(CacheConfig::default())
}

pub fn test_app_with(cache: CacheConfig) -> TestApp {
    let store = MemoryStore::new();
    let uploads = tempfile::tempdir().expect("temporary upload directory");
    let upload_storage =
        Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));
    let paginator = Paginator::new(NonZeroU32::new(10).expect("non-zero page size"));

    let state = HttpState {
        feed: Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            paginator,
        )),
        posts: Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            upload_storage.clone(),
        )),
        comments: Arc::new(CommentService::new(store.clone(), store.clone())),
        follows: Arc::new(FollowService::new(store.clone(), store.clone())),
        accounts: Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            AccountSettings {
                bcrypt_cost: 4,
                session_ttl: Duration::from_secs(3600),
            },
        )),
        groups: Arc::new(GroupService::new(store.clone())),
        fragments: Arc::new(FragmentCache::new(cache)),
        index_cache_ttl: INDEX_TTL,
        upload_storage,
        upload_limit_bytes: 5 * 1024 * 1024,
        secure_cookies: false,
    };

    TestApp {
        router: build_router(state.clone()),
        store,
        state,
        _uploads: uploads,
    }
}

/// A signed-up author and the `Cookie` header value carrying their session.
pub struct SignedIn {
    pub author: AuthorRecord,
    pub cookie: String,
}

impl TestApp {
    pub async fn sign_up(&self, username: &str) -> SignedIn {
        let issued = self
            .state
            .accounts
            .signup(SignupCommand {
                username: username.to_string(),
                password: "correct-horse".to_string(),
                password_confirm: "correct-horse".to_string(),
            })
            .await
            .expect("signup succeeds");
        SignedIn {
            author: issued.author,
            cookie: format!("{SESSION_COOKIE}={}", issued.token),
        }
    }

    pub async fn author(&self, username: &str) -> AuthorRecord {
        self.store
            .create_author(CreateAuthorParams {
                username: username.to_string(),
                password_hash: "unused".to_string(),
            })
            .await
            .expect("author created")
    }

    pub async fn group(&self, slug: &str, title: &str) -> GroupRecord {
        self.store
            .create_group(CreateGroupParams {
                slug: slug.to_string(),
                title: title.to_string(),
                description: format!("All about {title}"),
            })
            .await
            .expect("group created")
    }

    pub async fn post(&self, author: &AuthorRecord, text: &str, group: Option<Uuid>) -> PostRecord {
        self.store
            .create_post(CreatePostParams {
                author_id: author.id,
                group_id: group,
                text: text.to_string(),
                image_path: None,
            })
            .await
            .expect("post created")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: Multipart,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, form.content_type());
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

const BOUNDARY: &str = "yatube-test-boundary";

/// Minimal multipart/form-data encoder for driving the post forms.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collected")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Count rendered post cards in an HTML page.
pub fn post_cards(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}

/// Smallest valid GIF: 1x1 transparent pixel.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub fn small_page_size() -> NonZeroU32 {
    NonZeroU32::new(10).expect("non-zero")
}
