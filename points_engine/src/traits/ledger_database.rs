use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pts_common::Point;
use thiserror::Error;

use crate::db_types::{Order, OrderStatus, PendingOrder};

/// Write flows of the order lifecycle and the double-entry points ledger.
///
/// Every ledger mutation is a single atomic transaction that writes one journal row plus a pair of
/// postings summing to zero, the user side mirrored on the system account
/// ([`SYSTEM_USER_ID`](crate::db_types::SYSTEM_USER_ID)).
#[async_trait]
pub trait LedgerDatabase: Clone + Send + Sync + 'static {
    /// Fetches the order with the given number, if any. Used to classify re-submissions.
    async fn fetch_order_by_number(&self, number: &str) -> Result<Option<Order>, LedgerError>;

    /// Inserts a new order with status `NEW` and the current time as upload time, returning its
    /// id. A number that is already present fails with [`LedgerError::DuplicateOrder`].
    async fn insert_order(&self, number: &str, user_id: i64) -> Result<i64, LedgerError>;

    /// Moves the order to `status`, recording `processed_at` for terminal statuses. Orders that
    /// are already terminal are never modified; a late update is a no-op.
    async fn update_order_status(
        &self,
        number: &str,
        status: OrderStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), LedgerError>;

    /// Credits `amount` to the user for the given order: one `deposit` journal, a positive posting
    /// for the user and the matching negative posting for the system account, all bound to the
    /// order row. At most one credit can ever land per order; a second attempt fails with
    /// [`LedgerError::AlreadyCredited`].
    async fn credit_accrual(&self, user_id: i64, amount: Point, order_id: i64) -> Result<(), LedgerError>;

    /// Debits `amount` from the user against a client-supplied order reference: one `withdrawal`
    /// journal, a negative posting for the user and the matching positive posting for the system
    /// account. The solvency check happens inside the same transaction, under a lock on the user
    /// row; an uncovered debit fails with [`LedgerError::InsufficientFunds`] and writes nothing.
    async fn withdraw(&self, user_id: i64, amount: Point, order_ref: &str) -> Result<(), LedgerError>;

    /// All orders still in `NEW` or `PROCESSING`, oldest first. Used to resume polling after a
    /// restart.
    async fn fetch_unresolved_orders(&self) -> Result<Vec<PendingOrder>, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Order {0} has already been uploaded")]
    DuplicateOrder(String),
    #[error("Order #{0} has already been credited")]
    AlreadyCredited(i64),
    #[error("The balance does not cover the requested withdrawal")]
    InsufficientFunds,
    #[error("User {0} does not exist")]
    UserNotFound(i64),
    #[error("The transaction conflicted with a concurrent one and can be retried: {0}")]
    Conflict(String),
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
                return LedgerError::Conflict(db.message().to_string());
            }
        }
        LedgerError::DatabaseError(e.to_string())
    }
}
