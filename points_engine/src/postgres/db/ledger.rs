use chrono::{DateTime, Utc};
use pts_common::Point;
use sqlx::PgConnection;

use super::is_unique_violation;
use crate::{
    db_types::{Balance, JournalType, Withdrawal},
    traits::{AccountApiError, LedgerError},
};

/// Locks the user row for the remainder of the transaction, serializing ledger writes per user.
pub async fn lock_user(user_id: i64, conn: &mut PgConnection) -> Result<(), LedgerError> {
    let row: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    row.map(|_| ()).ok_or(LedgerError::UserNotFound(user_id))
}

pub async fn insert_journal(
    kind: JournalType,
    order_number: Option<&str>,
    conn: &mut PgConnection,
) -> Result<i64, LedgerError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO balance_journal (type, order_number, created_at) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(kind.to_string())
    .bind(order_number)
    .bind(Utc::now().timestamp())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Inserts one posting. A second positive posting for the same order trips the partial unique
/// index, which surfaces as [`LedgerError::AlreadyCredited`].
pub async fn insert_posting(
    user_id: i64,
    order_id: Option<i64>,
    journal_id: i64,
    amount: Point,
    conn: &mut PgConnection,
) -> Result<(), LedgerError> {
    let result =
        sqlx::query("INSERT INTO posting (user_id, order_id, journal_id, amount) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(order_id)
            .bind(journal_id)
            .bind(amount.value())
            .execute(conn)
            .await;
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(LedgerError::AlreadyCredited(order_id.unwrap_or_default())),
        Err(e) => Err(e.into()),
    }
}

/// The user's current balance, read inside the caller's transaction.
pub async fn current_balance(user_id: i64, conn: &mut PgConnection) -> Result<Point, LedgerError> {
    let sum: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM posting WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(Point::from(sum))
}

/// Current and withdrawn totals in one snapshot. Empty ledgers collapse to zero on both sides.
pub async fn balance_for_user(user_id: i64, conn: &mut PgConnection) -> Result<Balance, AccountApiError> {
    let (current, withdrawn): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(p.amount), 0)::BIGINT AS current, \
                COALESCE(ABS(SUM(p.amount) FILTER (WHERE j.type = 'withdrawal')), 0)::BIGINT AS withdrawn \
         FROM posting p JOIN balance_journal j ON p.journal_id = j.id \
         WHERE p.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(Balance { current: Point::from(current), withdrawn: Point::from(withdrawn) })
}

pub async fn fetch_withdrawals_for_user(
    user_id: i64,
    conn: &mut PgConnection,
) -> Result<Vec<Withdrawal>, AccountApiError> {
    let rows: Vec<(Option<String>, i64, i64)> = sqlx::query_as(
        "SELECT j.order_number, ABS(p.amount)::BIGINT AS amount, j.created_at \
         FROM posting p JOIN balance_journal j ON p.journal_id = j.id \
         WHERE p.user_id = $1 AND j.type = 'withdrawal' AND p.amount < 0 \
         ORDER BY j.created_at ASC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(order_number, amount, created_at)| Withdrawal {
            order_number: order_number.unwrap_or_default(),
            amount: Point::from(amount),
            processed_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
        })
        .collect())
}
