use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use points_engine::{
    traits::{AccountApiError, AuthApiError},
    OrderFlowError,
    WithdrawalError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("No authorization token was supplied")]
    MissingAuthToken,
    #[error("The authorization token is not valid")]
    InvalidAuthToken,
    #[error("Login or password is incorrect")]
    InvalidCredentials,
    #[error("Not enough points on the account")]
    InsufficientFunds,
    #[error("Login {0} is already taken")]
    DuplicateLogin(String),
    #[error("Order was already uploaded by another user")]
    OrderOwnedByAnotherUser,
    #[error("Order number failed validation")]
    InvalidOrderNumber,
    #[error("Withdrawal amount must be a positive number of points")]
    InvalidAmount,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Internal error. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingAuthToken | Self::InvalidAuthToken | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::DuplicateLogin(_) | Self::OrderOwnedByAnotherUser => StatusCode::CONFLICT,
            Self::InvalidOrderNumber | Self::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::plaintext()).body(self.to_string())
    }
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::DuplicateLogin(login) => Self::DuplicateLogin(login),
            AuthApiError::InvalidLogin => Self::InvalidRequestBody("login may not be empty".to_string()),
            AuthApiError::InvalidCredentials => Self::InvalidCredentials,
            AuthApiError::DatabaseError(e) => Self::Unspecified(e),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidOrderNumber(_) => Self::InvalidOrderNumber,
            OrderFlowError::OwnedByAnotherUser(_) => Self::OrderOwnedByAnotherUser,
            OrderFlowError::SchedulerClosed(e) => Self::Unspecified(e.to_string()),
            OrderFlowError::DatabaseError(e) => Self::Unspecified(e),
        }
    }
}

impl From<WithdrawalError> for ServerError {
    fn from(e: WithdrawalError) -> Self {
        match e {
            WithdrawalError::InvalidOrderNumber(_) => Self::InvalidOrderNumber,
            WithdrawalError::InsufficientFunds => Self::InsufficientFunds,
            WithdrawalError::DatabaseError(e) => Self::Unspecified(e),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::DatabaseError(e) => Self::Unspecified(e),
        }
    }
}
