use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::User;

/// Backend contract for user records.
///
/// Passwords never reach this layer in the clear; callers hash them first and hand over an opaque
/// digest string.
#[async_trait]
pub trait AuthManagement: Send + Sync {
    /// Creates a new user. Atomic; a taken login fails with [`AuthApiError::DuplicateLogin`].
    async fn insert_user(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError>;

    /// Fetches the user record for the given login, if one exists.
    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, AuthApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Login {0} is already taken")]
    DuplicateLogin(String),
    #[error("Login may not be empty")]
    InvalidLogin,
    #[error("The supplied credentials do not match any user")]
    InvalidCredentials,
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}
