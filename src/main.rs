use std::{process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::{AccountError, AccountService, AccountSettings},
        comments::CommentService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::{CreateGroupCommand, GroupError, GroupService},
        pagination::Paginator,
        posts::{ImageStore, PostError, PostService},
        repos::{
            AuthorsRepo, CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo,
        },
    },
    cache::{CacheConfig, FragmentCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
        config::Command::Authors(args) => run_authors(settings, args.command).await,
        config::Command::Posts(args) => run_posts(settings, args.command).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn init_upload_storage(settings: &config::Settings) -> Result<Arc<UploadStorage>, AppError> {
    UploadStorage::new(settings.uploads.directory.clone())
        .map(Arc::new)
        .map_err(|err| AppError::from(InfraError::Io(err)))
}

fn account_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> AccountService {
    let authors_repo: Arc<dyn AuthorsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    AccountService::new(
        authors_repo,
        sessions_repo,
        AccountSettings {
            bcrypt_cost: settings.auth.bcrypt_cost,
            session_ttl: settings.auth.session_ttl,
        },
    )
}

fn post_service(
    repositories: &Arc<PostgresRepositories>,
    upload_storage: Arc<UploadStorage>,
) -> PostService {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let images: Arc<dyn ImageStore> = upload_storage;
    PostService::new(posts_repo, posts_write_repo, groups_repo, images)
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let authors_repo: Arc<dyn AuthorsRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();

    let upload_storage = init_upload_storage(settings)?;

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        authors_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
        Paginator::new(settings.feed.page_size),
    ));
    let posts = Arc::new(post_service(&repositories, upload_storage.clone()));
    let comments = Arc::new(CommentService::new(posts_repo, comments_repo));
    let follows = Arc::new(FollowService::new(authors_repo, follows_repo));
    let accounts = Arc::new(account_service(&repositories, settings));
    let groups = Arc::new(GroupService::new(groups_repo));
    let fragments = Arc::new(FragmentCache::new(CacheConfig::from(&settings.cache)));

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds addressable memory"))?;

    Ok(HttpState {
        feed,
        posts,
        comments,
        follows,
        accounts,
        groups,
        fragments,
        index_cache_ttl: settings.feed.index_cache_ttl,
        upload_storage,
        upload_limit_bytes,
        secure_cookies: settings.auth.secure_cookies,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let accounts = account_service(&repositories, &settings);
    match accounts.purge_expired_sessions().await {
        Ok(removed) if removed > 0 => info!(
            target = "yatube::serve",
            removed,
            "purged expired sessions"
        ),
        Ok(_) => {}
        Err(err) => warn!(
            target = "yatube::serve",
            error = %err,
            "failed to purge expired sessions"
        ),
    }

    let http_state = build_http_state(repositories, &settings)?;
    serve_http(&settings, http_state).await
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);
    let addr = settings.server.addr;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))?;

    info!(target = "yatube::serve", addr = %addr, "listening");

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    // Bound the drain phase: once the signal fires, give in-flight requests `grace`.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "yatube::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "yatube::serve", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "yatube::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "yatube::serve", "shutdown signal received");
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    match command {
        config::GroupsCommand::Create(args) => {
            let group = service
                .create(CreateGroupCommand {
                    title: args.title,
                    slug: args.slug,
                    description: args.description,
                })
                .await
                .map_err(group_error)?;
            println!("{}\t{}\t{}", group.id, group.slug, group.title);
        }
        config::GroupsCommand::Delete { slug } => {
            service.delete(&slug).await.map_err(group_error)?;
            println!("deleted group {slug}");
        }
        config::GroupsCommand::List => {
            for group in service.list().await.map_err(group_error)? {
                println!("{}\t{}\t{}", group.id, group.slug, group.title);
            }
        }
    }
    Ok(())
}

async fn run_authors(
    settings: config::Settings,
    command: config::AuthorsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let service = account_service(&repositories, &settings);

    match command {
        config::AuthorsCommand::Delete { username } => {
            let author = service
                .delete_account(&username)
                .await
                .map_err(|err| match err {
                    AccountError::UnknownAuthor(_) => AppError::NotFound,
                    AccountError::Repo(err) => AppError::from(err),
                    other => AppError::unexpected(other.to_string()),
                })?;
            println!("deleted author {} ({})", author.username, author.id);
        }
    }
    Ok(())
}

async fn run_posts(
    settings: config::Settings,
    command: config::PostsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let upload_storage = init_upload_storage(&settings)?;
    let service = post_service(&repositories, upload_storage);

    match command {
        config::PostsCommand::Delete { post_id } => {
            service.delete(post_id).await.map_err(|err| match err {
                PostError::NotFound => AppError::NotFound,
                PostError::Repo(err) => AppError::from(err),
                other => AppError::unexpected(other.to_string()),
            })?;
            println!("deleted post {post_id}");
        }
    }
    Ok(())
}

fn group_error(err: GroupError) -> AppError {
    match err {
        GroupError::NotFound(_) => AppError::NotFound,
        GroupError::Repo(err) => AppError::from(err),
        other => AppError::validation(other.to_string()),
    }
}
