//! Bearer credential checking
//!
//! The sync core only ever sees an identity string; where it comes from is
//! behind [`Authenticator`].

use async_trait::async_trait;
use sqlx::SqlitePool;
use tagsync_common::api::auth::{lookup_token_identity, ApiAuthError};
use tagsync_common::config::AuthConfig;
use thiserror::Error;
use tracing::debug;

/// Identity used for every connection when authentication is disabled
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    Missing,

    #[error("invalid bearer credential")]
    Invalid,

    #[error("token lookup failed: {0}")]
    Store(String),
}

impl From<ApiAuthError> for AuthError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::MissingCredential => AuthError::Missing,
            ApiAuthError::InvalidCredential => AuthError::Invalid,
            ApiAuthError::DatabaseError(e) => AuthError::Store(e),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a credential to an identity
    async fn authenticate(&self, credential: Option<&str>) -> Result<String, AuthError>;

    /// Whether connections are accepted without a credential
    fn is_disabled(&self) -> bool {
        false
    }
}

/// Static config tokens first, then the hashed `api_tokens` table
pub struct TokenAuthenticator {
    config: AuthConfig,
    db: Option<SqlitePool>,
}

impl TokenAuthenticator {
    pub fn new(config: AuthConfig, db: Option<SqlitePool>) -> Self {
        Self { config, db }
    }

    /// Accepts everything as [`ANONYMOUS`]
    pub fn disabled() -> Self {
        Self::new(
            AuthConfig {
                disabled: true,
                tokens: Vec::new(),
            },
            None,
        )
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, credential: Option<&str>) -> Result<String, AuthError> {
        if self.config.disabled {
            return Ok(ANONYMOUS.to_string());
        }

        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;

        if let Some(entry) = self.config.tokens.iter().find(|e| e.token == token) {
            debug!("Authenticated {} from config token", entry.identity);
            return Ok(entry.identity.clone());
        }

        let Some(db) = &self.db else {
            return Err(AuthError::Invalid);
        };
        match lookup_token_identity(db, token).await? {
            Some(identity) => {
                debug!("Authenticated {} from token table", identity);
                Ok(identity)
            }
            None => Err(AuthError::Invalid),
        }
    }

    fn is_disabled(&self) -> bool {
        self.config.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_common::api::auth::store_token;
    use tagsync_common::config::TokenEntry;
    use tagsync_common::db::init_memory_database;

    #[tokio::test]
    async fn test_disabled_is_anonymous() {
        let auth = TokenAuthenticator::disabled();
        assert_eq!(auth.authenticate(None).await.unwrap(), ANONYMOUS);
        assert!(auth.is_disabled());
    }

    #[tokio::test]
    async fn test_config_and_table_tokens() {
        let db = init_memory_database().await.unwrap();
        store_token(&db, "db-secret", "bob").await.unwrap();

        let auth = TokenAuthenticator::new(
            AuthConfig {
                disabled: false,
                tokens: vec![TokenEntry {
                    token: "cfg-secret".to_string(),
                    identity: "alice".to_string(),
                }],
            },
            Some(db),
        );

        assert_eq!(auth.authenticate(Some("cfg-secret")).await.unwrap(), "alice");
        assert_eq!(auth.authenticate(Some(" db-secret ")).await.unwrap(), "bob");
        assert_eq!(auth.authenticate(Some("nope")).await, Err(AuthError::Invalid));
        assert_eq!(auth.authenticate(Some("")).await, Err(AuthError::Missing));
        assert_eq!(auth.authenticate(None).await, Err(AuthError::Missing));
    }
}
