//! Author accounts and cookie sessions.
//!
//! A session token has the shape `ys_{prefix}_{secret}`. Only the prefix and a
//! SHA-256 digest of the secret are stored, so a leaked sessions table cannot be
//! replayed as cookies.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    AuthorsRepo, CreateAuthorParams, CreateSessionParams, RepoError, SessionsRepo,
};
use crate::domain::accounts::{validate_password, validate_username};
use crate::domain::entities::AuthorRecord;

const TOKEN_PREFIX: &str = "ys";
const MIN_SECRET_LEN: usize = 32;
const DUPLICATE_USERNAME_MESSAGE: &str = "A user with that username already exists.";
const PASSWORD_MISMATCH_MESSAGE: &str = "The two password fields didn't match.";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignupErrors {
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl SignupErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.password_confirm.is_none()
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("signup form is invalid")]
    Invalid(SignupErrors),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("unknown session")]
    Unknown,
    #[error("expired session")]
    Expired,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct SignupCommand {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub author: AuthorRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct AccountSettings {
    pub bcrypt_cost: u32,
    pub session_ttl: Duration,
}

#[derive(Clone)]
pub struct AccountService {
    authors: Arc<dyn AuthorsRepo>,
    sessions: Arc<dyn SessionsRepo>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        authors: Arc<dyn AuthorsRepo>,
        sessions: Arc<dyn SessionsRepo>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            authors,
            sessions,
            settings,
        }
    }

    pub async fn signup(&self, cmd: SignupCommand) -> Result<SessionIssued, AccountError> {
        let mut errors = SignupErrors::default();

        let username = validate_username(&cmd.username)
            .map_err(|err| errors.username = Some(err.field_message()))
            .ok();
        if let Err(err) = validate_password(&cmd.password) {
            errors.password = Some(err.field_message());
        }
        if cmd.password != cmd.password_confirm {
            errors.password_confirm = Some(PASSWORD_MISMATCH_MESSAGE.to_string());
        }
        if let Some(name) = username.as_deref()
            && self.authors.find_author_by_username(name).await?.is_some()
        {
            errors.username = Some(DUPLICATE_USERNAME_MESSAGE.to_string());
        }

        let username = match username {
            Some(username) if errors.is_empty() => username,
            _ => return Err(AccountError::Invalid(errors)),
        };

        let password_hash = self.hash_password(cmd.password).await?;
        let author = match self
            .authors
            .create_author(CreateAuthorParams {
                username,
                password_hash,
            })
            .await
        {
            Ok(author) => author,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AccountError::Invalid(SignupErrors {
                    username: Some(DUPLICATE_USERNAME_MESSAGE.to_string()),
                    ..SignupErrors::default()
                }));
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            target = "yatube::application::accounts",
            author_id = %author.id,
            username = %author.username,
            "author signed up"
        );
        self.issue_session(author).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionIssued, AccountError> {
        let author = self
            .authors
            .find_author_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let hash = author.password_hash.clone();
        let candidate = password.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
            .await
            .map_err(|err| AccountError::Hashing(err.to_string()))?
            .map_err(|err| AccountError::Hashing(err.to_string()))?;
        if !verified {
            return Err(AccountError::InvalidCredentials);
        }

        info!(
            target = "yatube::application::accounts",
            author_id = %author.id,
            "author logged in"
        );
        self.issue_session(author).await
    }

    /// Resolve a session cookie to its author.
    pub async fn authenticate(&self, token: &str) -> Result<AuthorRecord, SessionError> {
        let parsed = parse_token(token).ok_or(SessionError::Malformed)?;
        let session = self
            .sessions
            .find_session_by_prefix(&parsed.prefix)
            .await?
            .ok_or(SessionError::Unknown)?;

        if session.is_expired(OffsetDateTime::now_utc()) {
            return Err(SessionError::Expired);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionError::Unknown);
        }

        self.authors
            .find_author_by_id(session.author_id)
            .await?
            .ok_or(SessionError::Unknown)
    }

    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let parsed = parse_token(token).ok_or(SessionError::Malformed)?;
        self.sessions.delete_session(&parsed.prefix).await?;
        Ok(())
    }

    /// Remove an author and everything they own.
    pub async fn delete_account(&self, username: &str) -> Result<AuthorRecord, AccountError> {
        let author = self
            .authors
            .find_author_by_username(username)
            .await?
            .ok_or_else(|| AccountError::UnknownAuthor(username.to_string()))?;
        self.authors.delete_author(author.id).await?;
        info!(
            target = "yatube::application::accounts",
            author_id = %author.id,
            username = %author.username,
            "author deleted"
        );
        Ok(author)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, SessionError> {
        let removed = self
            .sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }

    async fn issue_session(&self, author: AuthorRecord) -> Result<SessionIssued, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.settings.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                author_id: author.id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(SessionIssued {
            author,
            token,
            expires_at,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let cost = self.settings.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| AccountError::Hashing(err.to_string()))?
            .map_err(|err| AccountError::Hashing(err.to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_token() {
        let secret = "a".repeat(64);
        let parsed = parse_token(&format!("ys_abc123_{secret}")).expect("token");
        assert_eq!(parsed.prefix, "abc123");
        assert_eq!(parsed.secret, secret);
    }

    #[test]
    fn rejects_foreign_or_short_tokens() {
        let secret = "b".repeat(64);
        assert!(parse_token(&format!("sk_abc_{secret}")).is_none());
        assert!(parse_token("ys_abc_short").is_none());
        assert!(parse_token(&format!("ys__{secret}")).is_none());
        assert!(parse_token("garbage").is_none());
    }

    #[test]
    fn generated_tokens_round_trip_through_parser() {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let parsed = parse_token(&format!("{TOKEN_PREFIX}_{prefix}_{secret}")).expect("token");
        assert_eq!(parsed.prefix, prefix);
        assert_eq!(hash_secret(&parsed.secret), hash_secret(&secret));
    }
}
