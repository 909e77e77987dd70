use crate::{
    db_types::{Balance, Order, Withdrawal},
    traits::{AccountApiError, AccountManagement},
};

/// Read-side queries behind the user-facing GET endpoints.
#[derive(Debug, Clone)]
pub struct AccountApi<B> {
    db: B,
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError> {
        self.db.orders_for_user(user_id).await
    }

    pub async fn balance_for_user(&self, user_id: i64) -> Result<Balance, AccountApiError> {
        self.db.balance_for_user(user_id).await
    }

    pub async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        self.db.withdrawals_for_user(user_id).await
    }
}
