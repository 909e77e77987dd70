use chrono::SecondsFormat;
use points_engine::db_types::{Balance, Order, OrderStatus, Withdrawal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct UserCredentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub order: String,
    pub sum: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub number: String,
    pub status: OrderStatus,
    /// Only present once the order has been credited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: String,
}

impl From<Order> for OrderResult {
    fn from(order: Order) -> Self {
        Self {
            number: order.number,
            status: order.status,
            accrual: order.accrual.map(|p| p.as_decimal()),
            uploaded_at: order.uploaded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResult {
    pub current: f64,
    pub withdrawn: f64,
}

impl From<Balance> for BalanceResult {
    fn from(balance: Balance) -> Self {
        Self { current: balance.current.as_decimal(), withdrawn: balance.withdrawn.as_decimal() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResult {
    pub order: String,
    pub sum: f64,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalResult {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number,
            sum: withdrawal.amount.as_decimal(),
            processed_at: withdrawal.processed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
