//! Request handler definitions.
//!
//! Each handler translates exactly one service-layer result into one HTTP status; anything that
//! looks like business logic belongs in the engine, not here. Routes are registered through
//! [`configure_user_api`] so that the server and the endpoint tests wire the same paths to the
//! same handlers, with the backend type swapped out.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use points_engine::{
    traits::{AccountManagement, AuthManagement, LedgerDatabase},
    AccountApi,
    AuthApi,
    OrderAdmission,
    OrderFlowApi,
    WithdrawalApi,
};
use pts_common::Point;

use crate::{
    auth::{password_digest, JwtClaims, TokenIssuer},
    data_objects::{BalanceResult, OrderResult, UserCredentials, WithdrawalRequest, WithdrawalResult},
    errors::ServerError,
};

/// Registers the `/api/user` routes against a concrete backend type.
pub fn configure_user_api<D>(cfg: &mut web::ServiceConfig)
where D: AuthManagement + AccountManagement + LedgerDatabase + 'static
{
    cfg.route("/api/user/register", web::post().to(register::<D>))
        .route("/api/user/login", web::post().to(login::<D>))
        .route("/api/user/orders", web::post().to(post_order::<D>))
        .route("/api/user/orders", web::get().to(get_orders::<D>))
        .route("/api/user/balance", web::get().to(get_balance::<D>))
        .route("/api/user/balance/withdraw", web::post().to(withdraw::<D>))
        .route("/api/user/balance/withdrawals", web::get().to(get_withdrawals::<D>));
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  -------------------------------------------------------
/// POST `/api/user/register`. Registering also logs the new user in; the access token rides back
/// in the `Authorization` header.
pub async fn register<D: AuthManagement>(
    body: web::Json<UserCredentials>,
    api: web::Data<AuthApi<D>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let UserCredentials { login, password } = body.into_inner();
    trace!("💻️ Received registration request for '{login}'");
    let user_id = api.register_user(&login, &password_digest(&password)).await?;
    let token = signer.issue_token(user_id)?;
    Ok(bearer_response(token))
}

/// POST `/api/user/login`.
pub async fn login<D: AuthManagement>(
    body: web::Json<UserCredentials>,
    api: web::Data<AuthApi<D>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let UserCredentials { login, password } = body.into_inner();
    trace!("💻️ Received login request for '{login}'");
    let user_id = api.verify_credentials(&login, &password_digest(&password)).await?;
    let token = signer.issue_token(user_id)?;
    Ok(bearer_response(token))
}

fn bearer_response(token: String) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((actix_web::http::header::AUTHORIZATION, format!("Bearer {token}")))
        .finish()
}

//----------------------------------------------   Orders  -----------------------------------------------------
/// POST `/api/user/orders`. The body is the raw order number. 202 means accepted for background
/// processing; a repeat upload by the same user is a 200 no-op.
pub async fn post_order<D: LedgerDatabase>(
    claims: JwtClaims,
    body: String,
    api: web::Data<OrderFlowApi<D>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ User {} is uploading order '{body}'", claims.user_id);
    match api.create_new_order(&body, claims.user_id).await? {
        OrderAdmission::Accepted => Ok(HttpResponse::Accepted().finish()),
        OrderAdmission::AlreadyUploaded => Ok(HttpResponse::Ok().finish()),
    }
}

/// GET `/api/user/orders`. 204 when the user has not uploaded anything yet.
pub async fn get_orders<D: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<D>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.orders_for_user(claims.user_id).await?;
    if orders.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    let result: Vec<OrderResult> = orders.into_iter().map(OrderResult::from).collect();
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Balance  ----------------------------------------------------
/// GET `/api/user/balance`.
pub async fn get_balance<D: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<D>>,
) -> Result<HttpResponse, ServerError> {
    let balance = api.balance_for_user(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResult::from(balance)))
}

/// POST `/api/user/balance/withdraw`.
pub async fn withdraw<D: LedgerDatabase + AccountManagement>(
    claims: JwtClaims,
    body: web::Json<WithdrawalRequest>,
    api: web::Data<WithdrawalApi<D>>,
) -> Result<HttpResponse, ServerError> {
    let WithdrawalRequest { order, sum } = body.into_inner();
    trace!("💻️ User {} is withdrawing {sum} against order '{order}'", claims.user_id);
    if sum <= 0.0 {
        return Err(ServerError::InvalidAmount);
    }
    let amount = Point::try_from(sum).map_err(|_| ServerError::InvalidAmount)?;
    api.withdraw(claims.user_id, amount, &order).await?;
    Ok(HttpResponse::Ok().finish())
}

/// GET `/api/user/balance/withdrawals`. 204 when the user has never withdrawn.
pub async fn get_withdrawals<D: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<D>>,
) -> Result<HttpResponse, ServerError> {
    let withdrawals = api.withdrawals_for_user(claims.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    let result: Vec<WithdrawalResult> = withdrawals.into_iter().map(WithdrawalResult::from).collect();
    Ok(HttpResponse::Ok().json(result))
}
