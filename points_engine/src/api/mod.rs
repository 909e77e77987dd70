//! Public API of the points engine, one façade per service area, each generic over the database
//! backend it drives.
mod account_api;
mod auth_api;
mod order_flow_api;
mod withdrawal_api;

pub use account_api::AccountApi;
pub use auth_api::AuthApi;
pub use order_flow_api::{OrderAdmission, OrderFlowApi, OrderFlowError};
pub use withdrawal_api::{WithdrawalApi, WithdrawalError};
