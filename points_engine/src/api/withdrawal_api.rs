use log::{debug, info};
use pts_common::Point;
use thiserror::Error;

use crate::{
    helpers::luhn,
    traits::{AccountManagement, LedgerDatabase, LedgerError},
};

#[derive(Debug, Clone, Error)]
pub enum WithdrawalError {
    #[error("Order number {0} failed validation")]
    InvalidOrderNumber(String),
    #[error("The balance does not cover the requested withdrawal")]
    InsufficientFunds,
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

/// Debits points from a user's balance against a client-supplied order reference.
#[derive(Debug, Clone)]
pub struct WithdrawalApi<B> {
    db: B,
}

impl<B> WithdrawalApi<B>
where B: LedgerDatabase + AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Withdraws `amount` from the user's balance.
    ///
    /// The balance read here is only a fast-path rejection; the authoritative solvency check runs
    /// inside the store transaction, so concurrent withdrawals cannot overdraw the account.
    pub async fn withdraw(&self, user_id: i64, amount: Point, order_ref: &str) -> Result<(), WithdrawalError> {
        if !luhn::is_valid(order_ref) {
            return Err(WithdrawalError::InvalidOrderNumber(order_ref.to_string()));
        }
        let balance =
            self.db.balance_for_user(user_id).await.map_err(|e| WithdrawalError::DatabaseError(e.to_string()))?;
        if balance.current < amount {
            debug!(
                "💸️ User {user_id} asked to withdraw {amount} but only has {}. Rejecting",
                balance.current
            );
            return Err(WithdrawalError::InsufficientFunds);
        }
        match self.db.withdraw(user_id, amount, order_ref).await {
            Ok(()) => {
                info!("💸️ User {user_id} withdrew {amount} against order {order_ref}");
                Ok(())
            },
            Err(LedgerError::InsufficientFunds) => Err(WithdrawalError::InsufficientFunds),
            Err(e) => Err(WithdrawalError::DatabaseError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use pts_common::Point;

    use super::*;
    use crate::{
        db_types::Balance,
        dummy::DummyDatabase,
        traits::{AccountManagement, AuthManagement},
    };

    async fn seeded_db(balance: i64) -> (DummyDatabase, i64) {
        let db = DummyDatabase::new();
        let alice = db.insert_user("alice", "digest").await.unwrap();
        if balance > 0 {
            let order_id = db.insert_order("6122", alice).await.unwrap();
            db.credit_accrual(alice, Point::from(balance), order_id).await.unwrap();
        }
        (db, alice)
    }

    #[tokio::test]
    async fn rejects_invalid_order_references() {
        let (db, alice) = seeded_db(10_000).await;
        let api = WithdrawalApi::new(db);
        let err = api.withdraw(alice, Point::from(100), "1234").await.unwrap_err();
        assert!(matches!(err, WithdrawalError::InvalidOrderNumber(_)));
    }

    #[tokio::test]
    async fn rejects_uncovered_withdrawals_and_keeps_the_balance() {
        let (db, alice) = seeded_db(100).await;
        let api = WithdrawalApi::new(db.clone());
        let err = api.withdraw(alice, Point::from(200), "79927398713").await.unwrap_err();
        assert!(matches!(err, WithdrawalError::InsufficientFunds));
        let balance = db.balance_for_user(alice).await.unwrap();
        assert_eq!(balance, Balance { current: Point::from(100), withdrawn: Point::from(0) });
        assert!(db.withdrawals_for_user(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdraws_and_records_the_reference() {
        let (db, alice) = seeded_db(50_000).await;
        let api = WithdrawalApi::new(db.clone());
        api.withdraw(alice, Point::from(30_000), "79927398713").await.unwrap();

        let balance = db.balance_for_user(alice).await.unwrap();
        assert_eq!(balance, Balance { current: Point::from(20_000), withdrawn: Point::from(30_000) });
        let withdrawals = db.withdrawals_for_user(alice).await.unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].order_number, "79927398713");
        assert_eq!(withdrawals[0].amount, Point::from(30_000));
    }

    #[tokio::test]
    async fn withdrawing_the_exact_balance_is_allowed() {
        let (db, alice) = seeded_db(30_000).await;
        let api = WithdrawalApi::new(db.clone());
        api.withdraw(alice, Point::from(30_000), "79927398713").await.unwrap();
        assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(0));
    }
}
