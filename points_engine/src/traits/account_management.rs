use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{Balance, Order, Withdrawal};

/// Read-side queries over a user's orders and ledger.
#[async_trait]
pub trait AccountManagement: Send + Sync {
    /// All orders uploaded by the user, ordered by upload time ascending, taken in a single
    /// snapshot. Credited orders carry their user-side accrual amount.
    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError>;

    /// The user's current balance and the total amount ever withdrawn. Both are non-negative;
    /// empty ledgers collapse to zero.
    async fn balance_for_user(&self, user_id: i64) -> Result<Balance, AccountApiError>;

    /// The user's withdrawals, oldest first.
    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}
