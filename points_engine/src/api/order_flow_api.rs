use chrono::Utc;
use log::*;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    accrual::{AccrualOrder, AccrualStatus},
    db_types::OrderStatus,
    helpers::luhn,
    poller::{PollScheduler, PollSchedulerError},
    traits::{LedgerDatabase, LedgerError},
};

/// Outcome of a successful order admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAdmission {
    /// The order is new; it has been stored and queued for accrual polling.
    Accepted,
    /// The caller uploaded this number before. Nothing was changed.
    AlreadyUploaded,
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order number {0} failed validation")]
    InvalidOrderNumber(String),
    #[error("Order {0} was already uploaded by another user")]
    OwnedByAnotherUser(String),
    #[error("{0}")]
    SchedulerClosed(#[from] PollSchedulerError),
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<LedgerError> for OrderFlowError {
    fn from(e: LedgerError) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

/// Order admission and lifecycle orchestration.
///
/// `create_new_order` validates and stores the order, then queues it on the poll scheduler and
/// spawns a resolver task that owns the order's update stream. The resolver applies accrual
/// updates to the store strictly in arrival order and performs the ledger credit when the accrual
/// system reports the order as processed.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    poller: PollScheduler,
}

impl<B> std::fmt::Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B>
where B: LedgerDatabase
{
    pub fn new(db: B, poller: PollScheduler) -> Self {
        Self { db, poller }
    }

    /// Admits a new order for `user_id`.
    ///
    /// Validation and deduplication happen here; polling and crediting happen in the background.
    /// The admission result says nothing about the eventual accrual outcome.
    pub async fn create_new_order(&self, number: &str, user_id: i64) -> Result<OrderAdmission, OrderFlowError> {
        if !luhn::is_valid(number) {
            return Err(OrderFlowError::InvalidOrderNumber(number.to_string()));
        }
        if let Some(admission) = self.classify_existing(number, user_id).await? {
            return Ok(admission);
        }
        let order_id = match self.db.insert_order(number, user_id).await {
            Ok(id) => id,
            Err(LedgerError::DuplicateOrder(_)) => {
                // Lost an admission race; whoever won owns the number now.
                return match self.classify_existing(number, user_id).await? {
                    Some(admission) => Ok(admission),
                    None => Err(OrderFlowError::DatabaseError(format!("order {number} vanished during admission"))),
                };
            },
            Err(e) => return Err(e.into()),
        };
        let updates = self.poller.submit(number.to_string()).await?;
        debug!("📦️ Order {number} admitted with id {order_id}. Accrual polling scheduled");
        self.spawn_resolver(number.to_string(), user_id, order_id, updates);
        Ok(OrderAdmission::Accepted)
    }

    /// Re-queues polling for every order that was left in a non-terminal status, e.g. by a
    /// restart. Credits that already landed before the interruption resurface as
    /// `AlreadyCredited` and only the missing status update is repeated.
    pub async fn resume_unresolved_orders(&self) -> Result<usize, OrderFlowError> {
        let pending = self.db.fetch_unresolved_orders().await?;
        let count = pending.len();
        for order in pending {
            let updates = self.poller.submit(order.number.clone()).await?;
            self.spawn_resolver(order.number, order.user_id, order.id, updates);
        }
        if count > 0 {
            info!("📦️ Resumed accrual polling for {count} unresolved orders");
        }
        Ok(count)
    }

    async fn classify_existing(&self, number: &str, user_id: i64) -> Result<Option<OrderAdmission>, OrderFlowError> {
        match self.db.fetch_order_by_number(number).await? {
            Some(order) if order.user_id == user_id => Ok(Some(OrderAdmission::AlreadyUploaded)),
            Some(_) => Err(OrderFlowError::OwnedByAnotherUser(number.to_string())),
            None => Ok(None),
        }
    }

    fn spawn_resolver(&self, number: String, user_id: i64, order_id: i64, mut updates: mpsc::Receiver<AccrualOrder>) {
        let db = self.db.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                apply_accrual_update(&db, &number, user_id, order_id, update).await;
            }
            trace!("📦️ Resolver for order {number} finished");
        });
    }
}

/// Applies one accrual update to the store. Failures are logged and swallowed: a missed status
/// update is repaired by the next one, and a failed credit leaves the order non-terminal so that
/// startup reconciliation retries it.
async fn apply_accrual_update<B: LedgerDatabase>(
    db: &B,
    number: &str,
    user_id: i64,
    order_id: i64,
    update: AccrualOrder,
) {
    match update.status {
        AccrualStatus::Registered | AccrualStatus::Processing => {
            if let Err(e) = db.update_order_status(number, OrderStatus::Processing, None).await {
                error!("📦️ Unable to mark order {number} as processing: {e}");
            }
        },
        AccrualStatus::Invalid => {
            if let Err(e) = db.update_order_status(number, OrderStatus::Invalid, Some(Utc::now())).await {
                error!("📦️ Unable to mark order {number} as invalid: {e}");
            }
        },
        AccrualStatus::Processed => {
            match db.credit_accrual(user_id, update.accrual, order_id).await {
                Ok(()) => {
                    debug!("📦️ Credited {} to user {user_id} for order {number}", update.accrual);
                },
                Err(LedgerError::AlreadyCredited(_)) => {
                    debug!("📦️ Order {number} was already credited. Repeating the status update only");
                },
                Err(e) => {
                    error!(
                        "📦️ Unable to credit {} to user {user_id} for order {number}: {e}. The order stays \
                         unresolved",
                        update.accrual
                    );
                    return;
                },
            }
            if let Err(e) = db.update_order_status(number, OrderStatus::Processed, Some(Utc::now())).await {
                error!("📦️ Unable to mark order {number} as processed: {e}");
            }
        },
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pts_common::Point;

    use super::*;
    use crate::{
        accrual::AccrualApiError,
        db_types::Balance,
        dummy::DummyDatabase,
        poller::PollConfig,
        test_utils::{accrual_update, ScriptedAccrual},
        traits::{AccountManagement, AuthManagement},
    };

    fn quick_config() -> PollConfig {
        PollConfig { workers: 2, poll_period: Duration::from_millis(5), max_backoff: Duration::from_millis(40) }
    }

    async fn wait_for_status(db: &DummyDatabase, user_id: i64, number: &str, status: OrderStatus) {
        for _ in 0..400 {
            let orders = db.orders_for_user(user_id).await.unwrap();
            if orders.iter().any(|o| o.number == number && o.status == status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("order {number} never reached {status}");
    }

    async fn register(db: &DummyDatabase, login: &str) -> i64 {
        db.insert_user(login, "digest").await.unwrap()
    }

    #[tokio::test]
    async fn happy_credit_path() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        let client = ScriptedAccrual::new([
            Ok(accrual_update("6122", AccrualStatus::Registered, 0)),
            Ok(accrual_update("6122", AccrualStatus::Processing, 0)),
            Ok(accrual_update("6122", AccrualStatus::Processed, 30012)),
        ]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());

        let admission = api.create_new_order("6122", alice).await.unwrap();
        assert_eq!(admission, OrderAdmission::Accepted);
        wait_for_status(&db, alice, "6122", OrderStatus::Processed).await;

        let balance = db.balance_for_user(alice).await.unwrap();
        assert_eq!(balance, Balance { current: Point::from(30012), withdrawn: Point::from(0) });
        let orders = db.orders_for_user(alice).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].accrual, Some(Point::from(30012)));
        assert!(orders[0].processed_at.is_some());
        assert!(db.withdrawals_for_user(alice).await.unwrap().is_empty());
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_accrual_leaves_balance_untouched() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        let client = ScriptedAccrual::new([Ok(accrual_update("6122", AccrualStatus::Invalid, 0))]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());

        api.create_new_order("6122", alice).await.unwrap();
        wait_for_status(&db, alice, "6122", OrderStatus::Invalid).await;

        let balance = db.balance_for_user(alice).await.unwrap();
        assert_eq!(balance.current, Point::from(0));
        let orders = db.orders_for_user(alice).await.unwrap();
        assert_eq!(orders[0].accrual, None);
        assert!(orders[0].processed_at.is_some());
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn rate_limited_orders_are_retried_not_abandoned() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        let client = ScriptedAccrual::new([
            Err(AccrualApiError::RateLimited),
            Ok(accrual_update("6122", AccrualStatus::Processed, 500)),
        ]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());

        api.create_new_order("6122", alice).await.unwrap();
        wait_for_status(&db, alice, "6122", OrderStatus::Processed).await;
        assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(500));
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn upstream_failure_leaves_the_order_unresolved() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        let client = ScriptedAccrual::new([Err(AccrualApiError::Upstream("connection refused".to_string()))]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());

        api.create_new_order("6122", alice).await.unwrap();
        // Give the poll loop time to fail and close the stream.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let unresolved = db.fetch_unresolved_orders().await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].number, "6122");
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_numbers_failing_the_checksum() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let poller = PollScheduler::start(ScriptedAccrual::unavailable(), quick_config());
        let api = OrderFlowApi::new(db, poller.clone());
        let err = api.create_new_order("1234", 2).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidOrderNumber(_)));
        let err = api.create_new_order("", 2).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidOrderNumber(_)));
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn resubmission_is_classified_by_owner() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        let bob = register(&db, "bob").await;
        let client = ScriptedAccrual::new([Ok(accrual_update("79927398713", AccrualStatus::Invalid, 0))]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());

        assert_eq!(api.create_new_order("79927398713", alice).await.unwrap(), OrderAdmission::Accepted);
        assert_eq!(api.create_new_order("79927398713", alice).await.unwrap(), OrderAdmission::AlreadyUploaded);
        let err = api.create_new_order("79927398713", bob).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::OwnedByAnotherUser(_)));
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn resume_requeues_unresolved_orders() {
        let _ = env_logger::try_init().ok();
        let db = DummyDatabase::new();
        let alice = register(&db, "alice").await;
        // An order left behind in NEW by a previous run.
        db.insert_order("6122", alice).await.unwrap();

        let client = ScriptedAccrual::new([Ok(accrual_update("6122", AccrualStatus::Processed, 30012))]);
        let poller = PollScheduler::start(client, quick_config());
        let api = OrderFlowApi::new(db.clone(), poller.clone());
        let resumed = api.resume_unresolved_orders().await.unwrap();
        assert_eq!(resumed, 1);
        wait_for_status(&db, alice, "6122", OrderStatus::Processed).await;
        assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(30012));
        poller.shutdown().await;
    }
}
