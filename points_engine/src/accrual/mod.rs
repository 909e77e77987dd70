//! Client-side view of the external accrual system.
//!
//! The accrual system is the authority on how many points an order earns. It is polled, not
//! subscribed to: [`AccrualApi::order_status`] performs exactly one lookup and classifies the
//! response. Retry and backoff policy live in the [`poller`](crate::poller), not here.
mod client;

use std::fmt::Display;

use async_trait::async_trait;
use pts_common::Point;
use serde::Deserialize;
use thiserror::Error;

pub use client::RestAccrualClient;

/// Single-lookup contract against the accrual system. Implementations are stateless and never
/// retry.
#[async_trait]
pub trait AccrualApi: Clone + Send + Sync + 'static {
    async fn order_status(&self, number: &str) -> Result<AccrualOrder, AccrualApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("The accrual system is rate limiting requests")]
    RateLimited,
    #[error("The accrual system is unavailable: {0}")]
    Upstream(String),
}

//--------------------------------------   AccrualStatus    ----------------------------------------------------------
/// Order state as reported by the accrual system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// The order has been registered but the reward has not been calculated yet.
    Registered,
    /// The reward is being calculated.
    Processing,
    /// The order does not qualify for a reward. Terminal.
    Invalid,
    /// The reward has been calculated. Terminal.
    Processed,
}

impl AccrualStatus {
    /// Terminal statuses end the poll loop for an order.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccrualStatus::Invalid | AccrualStatus::Processed)
    }
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

//--------------------------------------    AccrualOrder    ----------------------------------------------------------
/// One poll result for an order.
#[derive(Debug, Clone)]
pub struct AccrualOrder {
    pub number: String,
    pub status: AccrualStatus,
    /// The awarded amount. Zero until the status is [`AccrualStatus::Processed`].
    pub accrual: Point,
}
