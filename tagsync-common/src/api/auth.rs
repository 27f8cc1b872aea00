//! Bearer token handling
//!
//! # Architecture
//!
//! - Clients present an opaque bearer token (HTTP `Authorization` header,
//!   WebSocket query parameter or `auth` message)
//! - Tokens are never stored in clear text: the `api_tokens` table keys
//!   rows by the SHA-256 hex digest of the token
//! - Each row maps to an identity string, which is all the sync core
//!   knows about a user
//!
//! # Pure Functions
//!
//! Only hashing, header parsing and database operations live here. The
//! axum middleware and the WebSocket handshake are in the server crate.

use sha2::{Digest, Sha256};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No credential was presented
    MissingCredential,

    /// Credential does not match any known token
    InvalidCredential,

    /// Database error looking up the token
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredential => write!(f, "Missing bearer credential"),
            ApiAuthError::InvalidCredential => write!(f, "Invalid bearer credential"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Token Hashing
// ========================================

/// SHA-256 hex digest of a token
///
/// # Examples
///
/// ```
/// use tagsync_common::api::auth::hash_token;
///
/// let hash = hash_token("secret-token");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_token("secret-token"));
/// ```
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// # Examples
///
/// ```
/// use tagsync_common::api::auth::parse_bearer;
///
/// assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
/// assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
/// assert_eq!(parse_bearer("Basic abc"), None);
/// assert_eq!(parse_bearer("Bearer "), None);
/// ```
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

// ========================================
// Token Storage
// ========================================

/// Look up the identity owning a token
#[cfg(feature = "sqlx")]
pub async fn lookup_token_identity(
    db: &SqlitePool,
    token: &str,
) -> Result<Option<String>, ApiAuthError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT identity FROM api_tokens WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(row.map(|(identity,)| identity))
}

/// Store (or re-assign) a token for an identity
#[cfg(feature = "sqlx")]
pub async fn store_token(db: &SqlitePool, token: &str, identity: &str) -> Result<(), ApiAuthError> {
    sqlx::query(
        r#"
        INSERT INTO api_tokens (token_hash, identity, created_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(token_hash) DO UPDATE SET identity = excluded.identity
        "#,
    )
    .bind(hash_token(token))
    .bind(identity)
    .execute(db)
    .await
    .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(feature = "sqlx")]
pub async fn count_tokens(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_tokens")
        .fetch_one(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;
    Ok(count)
}

/// Generate an admin token if the table is empty
///
/// Returns the clear-text token only when one was created; the caller
/// shows it once; afterwards only its hash exists.
#[cfg(feature = "sqlx")]
pub async fn initialize_admin_token(db: &SqlitePool) -> Result<Option<String>, ApiAuthError> {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    if count_tokens(db).await? > 0 {
        return Ok(None);
    }

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();

    store_token(db, &token, "admin").await?;
    Ok(Some(token))
}
