//! `PostgresDatabase` is the production backend of the points gateway.
use std::{fmt::Debug, path::Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use pts_common::Point;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use super::db::{ledger, orders, users};
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

#[derive(Clone)]
pub struct PostgresDatabase {
    url: String,
    pool: PgPool,
}

impl Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PostgresDatabase ({:?})", self.pool)
    }
}

impl PostgresDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the SQL migrations found at `scripts_path`.
    pub async fn migrate(&self, scripts_path: &Path) -> Result<(), sqlx::Error> {
        let migrator = Migrator::new(scripts_path).await?;
        migrator.run(&self.pool).await?;
        debug!("🗃️ Database migrations applied from {}", scripts_path.display());
        Ok(())
    }
}

#[async_trait]
impl AuthManagement for PostgresDatabase {
    async fn insert_user(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(login, password_digest, &mut conn).await
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_login(login, &mut conn).await
    }
}

#[async_trait]
impl LedgerDatabase for PostgresDatabase {
    async fn fetch_order_by_number(&self, number: &str) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn).await
    }

    async fn insert_order(&self, number: &str, user_id: i64) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(number, user_id, &mut conn).await
    }

    async fn update_order_status(
        &self,
        number: &str,
        status: OrderStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(number, status, processed_at, &mut conn).await
    }

    async fn credit_accrual(&self, user_id: i64, amount: Point, order_id: i64) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        ledger::lock_user(user_id, &mut tx).await?;
        let journal_id = ledger::insert_journal(JournalType::Deposit, None, &mut tx).await?;
        ledger::insert_posting(user_id, Some(order_id), journal_id, amount, &mut tx).await?;
        ledger::insert_posting(SYSTEM_USER_ID, Some(order_id), journal_id, -amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Credited {amount} to user {user_id} for order #{order_id}");
        Ok(())
    }

    async fn withdraw(&self, user_id: i64, amount: Point, order_ref: &str) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        ledger::lock_user(user_id, &mut tx).await?;
        let current = ledger::current_balance(user_id, &mut tx).await?;
        if current < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let journal_id = ledger::insert_journal(JournalType::Withdrawal, Some(order_ref), &mut tx).await?;
        ledger::insert_posting(user_id, None, journal_id, -amount, &mut tx).await?;
        ledger::insert_posting(SYSTEM_USER_ID, None, journal_id, amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ User {user_id} withdrew {amount} against order {order_ref}");
        Ok(())
    }

    async fn fetch_unresolved_orders(&self) -> Result<Vec<PendingOrder>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unresolved_orders(&mut conn).await
    }
}

#[async_trait]
impl AccountManagement for PostgresDatabase {
    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_user(user_id, &mut conn).await?)
    }

    async fn balance_for_user(&self, user_id: i64) -> Result<Balance, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::balance_for_user(user_id, &mut conn).await
    }

    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_withdrawals_for_user(user_id, &mut conn).await
    }
}
