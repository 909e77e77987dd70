use log::debug;
use sqlx::PgConnection;

use super::is_unique_violation;
use crate::{db_types::User, traits::AuthApiError};

pub async fn insert_user(login: &str, password_digest: &str, conn: &mut PgConnection) -> Result<i64, AuthApiError> {
    let result = sqlx::query_scalar::<_, i64>("INSERT INTO users (login, password) VALUES ($1, $2) RETURNING id")
        .bind(login)
        .bind(password_digest)
        .fetch_one(conn)
        .await;
    match result {
        Ok(id) => {
            debug!("🧑️ User '{login}' inserted with id {id}");
            Ok(id)
        },
        Err(e) if is_unique_violation(&e) => Err(AuthApiError::DuplicateLogin(login.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_user_by_login(login: &str, conn: &mut PgConnection) -> Result<Option<User>, AuthApiError> {
    let row: Option<(i64, String, String)> =
        sqlx::query_as("SELECT id, login, password FROM users WHERE login = $1")
            .bind(login)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|(id, login, password_digest)| User { id, login, password_digest }))
}
