use chrono::{DateTime, Utc};
use log::{debug, trace};
use pts_common::Point;
use sqlx::{FromRow, PgConnection};

use super::is_unique_violation;
use crate::{
    db_types::{Order, OrderStatus, PendingOrder},
    traits::LedgerError,
};

/// Row shape shared by the order queries. Timestamps are stored as epoch seconds; the accrual
/// column is only joined in by [`fetch_orders_for_user`].
#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    number: String,
    user_id: i64,
    status: String,
    uploaded_at: i64,
    processed_at: Option<i64>,
    accrual: Option<i64>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            number: row.number,
            user_id: row.user_id,
            status: OrderStatus::from(row.status),
            uploaded_at: DateTime::from_timestamp(row.uploaded_at, 0).unwrap_or_default(),
            processed_at: row.processed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
            accrual: row.accrual.map(Point::from),
        }
    }
}

pub async fn insert_order(number: &str, user_id: i64, conn: &mut PgConnection) -> Result<i64, LedgerError> {
    let result = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders (number, user_id, status, uploaded_at) VALUES ($1, $2, 'NEW', $3) RETURNING id",
    )
    .bind(number)
    .bind(user_id)
    .bind(Utc::now().timestamp())
    .fetch_one(conn)
    .await;
    match result {
        Ok(id) => {
            debug!("📝️ Order {number} inserted with id {id} for user {user_id}");
            Ok(id)
        },
        Err(e) if is_unique_violation(&e) => Err(LedgerError::DuplicateOrder(number.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_number(number: &str, conn: &mut PgConnection) -> Result<Option<Order>, LedgerError> {
    let row: Option<OrderRow> = sqlx::query_as(
        "SELECT id, number, user_id, status, uploaded_at, processed_at, NULL::BIGINT AS accrual \
         FROM orders WHERE number = $1",
    )
    .bind(number)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Order::from))
}

/// All orders uploaded by the user, oldest first, each credited order carrying its user-side
/// accrual amount. One query, one snapshot.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut PgConnection) -> Result<Vec<Order>, sqlx::Error> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        "SELECT o.id, o.number, o.user_id, o.status, o.uploaded_at, o.processed_at, p.amount AS accrual \
         FROM orders o \
         LEFT JOIN posting p ON p.order_id = o.id AND p.user_id = o.user_id AND p.amount > 0 \
            AND o.status = 'PROCESSED' \
         WHERE o.user_id = $1 \
         ORDER BY o.uploaded_at ASC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    trace!("📝️ Fetched {} orders for user {user_id}", rows.len());
    Ok(rows.into_iter().map(Order::from).collect())
}

/// Moves the order to `status`. Terminal rows are excluded by the WHERE clause, so a late update
/// against a resolved order changes nothing.
pub async fn update_order_status(
    number: &str,
    status: OrderStatus,
    processed_at: Option<DateTime<Utc>>,
    conn: &mut PgConnection,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $1, processed_at = COALESCE($2, processed_at) \
         WHERE number = $3 AND status NOT IN ('INVALID', 'PROCESSED')",
    )
    .bind(status.to_string())
    .bind(processed_at.map(|t| t.timestamp()))
    .bind(number)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("📝️ Order {number} is unknown or already terminal. Status update to {status} skipped");
    } else {
        debug!("📝️ Order {number} moved to {status}");
    }
    Ok(())
}

pub async fn fetch_unresolved_orders(conn: &mut PgConnection) -> Result<Vec<PendingOrder>, LedgerError> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, number, user_id FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id, number, user_id)| PendingOrder { id, number, user_id }).collect())
}
