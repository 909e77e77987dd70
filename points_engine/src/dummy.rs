//! In-memory backend.
//!
//! `DummyDatabase` implements the same contracts as the Postgres backend, with the same invariants
//! (unique logins and order numbers, terminal statuses never overwritten, at most one credit per
//! order, solvency checked atomically with the debit). Everything lives behind one mutex, which
//! makes each operation trivially transactional. Useful for tests and for running the server
//! without a database at hand.
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pts_common::Point;

use crate::{
    db_types::{Balance, JournalType, Order, OrderStatus, PendingOrder, User, Withdrawal, SYSTEM_USER_ID},
    traits::{
        AccountApiError,
        AccountManagement,
        AuthApiError,
        AuthManagement,
        LedgerDatabase,
        LedgerError,
    },
};

#[derive(Debug, Clone)]
struct StoredOrder {
    id: i64,
    number: String,
    user_id: i64,
    status: OrderStatus,
    uploaded_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredJournal {
    id: i64,
    kind: JournalType,
    order_number: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredPosting {
    user_id: i64,
    order_id: Option<i64>,
    journal_id: i64,
    amount: Point,
}

#[derive(Debug)]
struct State {
    users: Vec<User>,
    orders: Vec<StoredOrder>,
    journals: Vec<StoredJournal>,
    postings: Vec<StoredPosting>,
    next_user_id: i64,
    next_order_id: i64,
    next_journal_id: i64,
}

impl Default for State {
    fn default() -> Self {
        // User id 1 is the reserved system account, as in the SQL schema.
        Self {
            users: vec![User { id: SYSTEM_USER_ID, login: "points.system".to_string(), password_digest: String::new() }],
            orders: Vec::new(),
            journals: Vec::new(),
            postings: Vec::new(),
            next_user_id: SYSTEM_USER_ID + 1,
            next_order_id: 1,
            next_journal_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DummyDatabase {
    state: Arc<Mutex<State>>,
}

impl DummyDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn current_balance(&self, user_id: i64) -> Point {
        self.postings.iter().filter(|p| p.user_id == user_id).map(|p| p.amount).sum()
    }

    fn insert_journal(&mut self, kind: JournalType, order_number: Option<&str>) -> i64 {
        let id = self.next_journal_id;
        self.next_journal_id += 1;
        self.journals.push(StoredJournal {
            id,
            kind,
            order_number: order_number.map(String::from),
            created_at: Utc::now(),
        });
        id
    }
}

#[async_trait]
impl AuthManagement for DummyDatabase {
    async fn insert_user(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.login == login) {
            return Err(AuthApiError::DuplicateLogin(login.to_string()));
        }
        let id = state.next_user_id;
        state.next_user_id += 1;
        state.users.push(User { id, login: login.to_string(), password_digest: password_digest.to_string() });
        Ok(id)
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, AuthApiError> {
        Ok(self.state().users.iter().find(|u| u.login == login).cloned())
    }
}

#[async_trait]
impl LedgerDatabase for DummyDatabase {
    async fn fetch_order_by_number(&self, number: &str) -> Result<Option<Order>, LedgerError> {
        let state = self.state();
        Ok(state.orders.iter().find(|o| o.number == number).map(|o| Order {
            id: o.id,
            number: o.number.clone(),
            user_id: o.user_id,
            status: o.status,
            uploaded_at: o.uploaded_at,
            processed_at: o.processed_at,
            accrual: None,
        }))
    }

    async fn insert_order(&self, number: &str, user_id: i64) -> Result<i64, LedgerError> {
        let mut state = self.state();
        if state.orders.iter().any(|o| o.number == number) {
            return Err(LedgerError::DuplicateOrder(number.to_string()));
        }
        let id = state.next_order_id;
        state.next_order_id += 1;
        state.orders.push(StoredOrder {
            id,
            number: number.to_string(),
            user_id,
            status: OrderStatus::New,
            uploaded_at: Utc::now(),
            processed_at: None,
        });
        Ok(id)
    }

    async fn update_order_status(
        &self,
        number: &str,
        status: OrderStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state();
        if let Some(order) = state.orders.iter_mut().find(|o| o.number == number && !o.status.is_terminal()) {
            order.status = status;
            if processed_at.is_some() {
                order.processed_at = processed_at;
            }
        }
        Ok(())
    }

    async fn credit_accrual(&self, user_id: i64, amount: Point, order_id: i64) -> Result<(), LedgerError> {
        let mut state = self.state();
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(LedgerError::UserNotFound(user_id));
        }
        if state.postings.iter().any(|p| p.order_id == Some(order_id) && p.amount > Point::from(0)) {
            return Err(LedgerError::AlreadyCredited(order_id));
        }
        let journal_id = state.insert_journal(JournalType::Deposit, None);
        state.postings.push(StoredPosting { user_id, order_id: Some(order_id), journal_id, amount });
        state.postings.push(StoredPosting {
            user_id: SYSTEM_USER_ID,
            order_id: Some(order_id),
            journal_id,
            amount: -amount,
        });
        Ok(())
    }

    async fn withdraw(&self, user_id: i64, amount: Point, order_ref: &str) -> Result<(), LedgerError> {
        let mut state = self.state();
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(LedgerError::UserNotFound(user_id));
        }
        if state.current_balance(user_id) < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let journal_id = state.insert_journal(JournalType::Withdrawal, Some(order_ref));
        state.postings.push(StoredPosting { user_id, order_id: None, journal_id, amount: -amount });
        state.postings.push(StoredPosting { user_id: SYSTEM_USER_ID, order_id: None, journal_id, amount });
        Ok(())
    }

    async fn fetch_unresolved_orders(&self) -> Result<Vec<PendingOrder>, LedgerError> {
        let state = self.state();
        let mut pending: Vec<_> = state.orders.iter().filter(|o| !o.status.is_terminal()).collect();
        pending.sort_by_key(|o| o.uploaded_at);
        Ok(pending
            .into_iter()
            .map(|o| PendingOrder { id: o.id, number: o.number.clone(), user_id: o.user_id })
            .collect())
    }
}

#[async_trait]
impl AccountManagement for DummyDatabase {
    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError> {
        let state = self.state();
        let mut orders: Vec<_> = state.orders.iter().filter(|o| o.user_id == user_id).collect();
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders
            .into_iter()
            .map(|o| {
                let accrual = (o.status == OrderStatus::Processed)
                    .then(|| {
                        state
                            .postings
                            .iter()
                            .find(|p| p.order_id == Some(o.id) && p.user_id == user_id && p.amount > Point::from(0))
                            .map(|p| p.amount)
                    })
                    .flatten();
                Order {
                    id: o.id,
                    number: o.number.clone(),
                    user_id: o.user_id,
                    status: o.status,
                    uploaded_at: o.uploaded_at,
                    processed_at: o.processed_at,
                    accrual,
                }
            })
            .collect())
    }

    async fn balance_for_user(&self, user_id: i64) -> Result<Balance, AccountApiError> {
        let state = self.state();
        let current = state.current_balance(user_id);
        let withdrawn: Point = state
            .postings
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.amount < Point::from(0)
                    && state
                        .journals
                        .iter()
                        .any(|j| j.id == p.journal_id && j.kind == JournalType::Withdrawal)
            })
            .map(|p| -p.amount)
            .sum();
        Ok(Balance { current, withdrawn })
    }

    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        let state = self.state();
        let mut withdrawals: Vec<_> = state
            .postings
            .iter()
            .filter(|p| p.user_id == user_id && p.amount < Point::from(0))
            .filter_map(|p| {
                state
                    .journals
                    .iter()
                    .find(|j| j.id == p.journal_id && j.kind == JournalType::Withdrawal)
                    .map(|j| Withdrawal {
                        order_number: j.order_number.clone().unwrap_or_default(),
                        amount: -p.amount,
                        processed_at: j.created_at,
                    })
            })
            .collect();
        withdrawals.sort_by_key(|w| w.processed_at);
        Ok(withdrawals)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn journals_always_sum_to_zero() {
        let db = DummyDatabase::new();
        let alice = db.insert_user("alice", "digest").await.unwrap();
        let order_id = db.insert_order("6122", alice).await.unwrap();
        db.credit_accrual(alice, Point::from(30012), order_id).await.unwrap();
        db.withdraw(alice, Point::from(10_000), "79927398713").await.unwrap();

        let state = db.state();
        for journal in &state.journals {
            let sum: Point =
                state.postings.iter().filter(|p| p.journal_id == journal.id).map(|p| p.amount).sum();
            assert_eq!(sum, Point::from(0), "journal {} does not balance", journal.id);
        }
    }

    #[tokio::test]
    async fn duplicate_logins_are_rejected() {
        let db = DummyDatabase::new();
        db.insert_user("alice", "digest").await.unwrap();
        assert!(matches!(
            db.insert_user("alice", "other").await.unwrap_err(),
            AuthApiError::DuplicateLogin(_)
        ));
    }

    #[tokio::test]
    async fn credits_are_idempotent_per_order() {
        let db = DummyDatabase::new();
        let alice = db.insert_user("alice", "digest").await.unwrap();
        let order_id = db.insert_order("6122", alice).await.unwrap();
        db.credit_accrual(alice, Point::from(100), order_id).await.unwrap();
        assert!(matches!(
            db.credit_accrual(alice, Point::from(100), order_id).await.unwrap_err(),
            LedgerError::AlreadyCredited(_)
        ));
        assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(100));
    }

    #[tokio::test]
    async fn terminal_statuses_are_never_overwritten() {
        let db = DummyDatabase::new();
        let alice = db.insert_user("alice", "digest").await.unwrap();
        db.insert_order("6122", alice).await.unwrap();
        db.update_order_status("6122", OrderStatus::Invalid, Some(Utc::now())).await.unwrap();
        db.update_order_status("6122", OrderStatus::Processing, None).await.unwrap();
        let order = db.fetch_order_by_number("6122").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Invalid);
    }

    #[tokio::test]
    async fn concurrent_withdrawals_cannot_overdraw() {
        let db = DummyDatabase::new();
        let alice = db.insert_user("alice", "digest").await.unwrap();
        let order_id = db.insert_order("6122", alice).await.unwrap();
        db.credit_accrual(alice, Point::from(10_000), order_id).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move { db.withdraw(alice, Point::from(3000), "79927398713").await }));
        }
        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 3);
        let balance = db.balance_for_user(alice).await.unwrap();
        assert_eq!(balance.current, Point::from(1000));
        assert_eq!(balance.withdrawn, Point::from(9000));
    }
}
