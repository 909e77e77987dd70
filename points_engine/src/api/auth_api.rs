use log::{debug, info};

use crate::traits::{AuthApiError, AuthManagement};

/// User registration and credential checks. Works on opaque password digests; hashing is the
/// server boundary's job.
#[derive(Debug, Clone)]
pub struct AuthApi<B> {
    db: B,
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Registers a new user and returns their id.
    pub async fn register_user(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError> {
        if login.is_empty() {
            return Err(AuthApiError::InvalidLogin);
        }
        let user_id = self.db.insert_user(login, password_digest).await?;
        info!("🔑️ New user '{login}' registered with id {user_id}");
        Ok(user_id)
    }

    /// Checks a login/digest pair and returns the user id on a match. A missing user and a wrong
    /// digest are indistinguishable to the caller.
    pub async fn verify_credentials(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError> {
        match self.db.fetch_user_by_login(login).await? {
            Some(user) if user.password_digest == password_digest => {
                debug!("🔑️ User '{login}' logged in");
                Ok(user.id)
            },
            _ => {
                info!("🔑️ Unsuccessful login attempt for '{login}'");
                Err(AuthApiError::InvalidCredentials)
            },
        }
    }
}
