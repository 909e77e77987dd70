use actix_web::{http::StatusCode, web, web::ServiceConfig};
use points_engine::{
    traits::{AccountManagement, AuthManagement, LedgerDatabase},
    AccountApi,
    DummyDatabase,
    WithdrawalApi,
};
use pts_common::Point;
use serde_json::json;

use super::helpers::{get, issue_token, post_json, send_request};
use crate::routes;

fn configure_with(db: DummyDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(AccountApi::new(db.clone())))
            .app_data(web::Data::new(WithdrawalApi::new(db)))
            .route("/api/user/balance", web::get().to(routes::get_balance::<DummyDatabase>))
            .route("/api/user/balance/withdraw", web::post().to(routes::withdraw::<DummyDatabase>))
            .route("/api/user/balance/withdrawals", web::get().to(routes::get_withdrawals::<DummyDatabase>));
    }
}

/// A user with `balance` centi-points credited from one processed order.
async fn seeded_db(balance: i64) -> (DummyDatabase, i64) {
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    if balance > 0 {
        let order_id = db.insert_order("6122", alice).await.unwrap();
        db.credit_accrual(alice, Point::from(balance), order_id).await.unwrap();
    }
    (db, alice)
}

#[actix_web::test]
async fn balance_requires_authentication() {
    let _ = env_logger::try_init().ok();
    let (db, _) = seeded_db(0).await;
    let (status, _, _) = send_request(get("/api/user/balance", None), configure_with(db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn empty_ledger_reads_as_zero() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(0).await;
    let token = issue_token(alice);
    let (status, _, body) = send_request(get("/api/user/balance", Some(&token)), configure_with(db)).await;
    assert_eq!(status, StatusCode::OK);
    let balance: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(balance["current"], 0.0);
    assert_eq!(balance["withdrawn"], 0.0);
}

#[actix_web::test]
async fn withdrawing_more_than_the_balance_is_payment_required() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(100).await;
    let token = issue_token(alice);
    let req = post_json("/api/user/balance/withdraw", Some(&token), json!({"order": "79927398713", "sum": 2.0}));
    let (status, _, _) = send_request(req, configure_with(db.clone())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(100));
}

#[actix_web::test]
async fn withdrawal_happy_path_updates_both_sides_of_the_balance() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(50_000).await;
    let token = issue_token(alice);
    let req = post_json("/api/user/balance/withdraw", Some(&token), json!({"order": "79927398713", "sum": 300.0}));
    let (status, _, _) = send_request(req, configure_with(db.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send_request(get("/api/user/balance", Some(&token)), configure_with(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let balance: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(balance["current"], 200.0);
    assert_eq!(balance["withdrawn"], 300.0);

    let (status, _, body) =
        send_request(get("/api/user/balance/withdrawals", Some(&token)), configure_with(db)).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawals: serde_json::Value = serde_json::from_str(&body).unwrap();
    let withdrawals = withdrawals.as_array().unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0]["order"], "79927398713");
    assert_eq!(withdrawals[0]["sum"], 300.0);
    assert!(withdrawals[0]["processed_at"].as_str().unwrap().contains('T'));
}

#[actix_web::test]
async fn withdrawal_against_a_bad_reference_is_unprocessable() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(50_000).await;
    let token = issue_token(alice);
    let req = post_json("/api/user/balance/withdraw", Some(&token), json!({"order": "1234", "sum": 1.0}));
    let (status, _, _) = send_request(req, configure_with(db)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn negative_withdrawal_amounts_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(50_000).await;
    let token = issue_token(alice);
    let req = post_json("/api/user/balance/withdraw", Some(&token), json!({"order": "79927398713", "sum": -1.0}));
    let (status, _, _) = send_request(req, configure_with(db.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(db.balance_for_user(alice).await.unwrap().current, Point::from(50_000));
}

#[actix_web::test]
async fn withdrawal_history_is_empty_until_the_first_withdrawal() {
    let _ = env_logger::try_init().ok();
    let (db, alice) = seeded_db(50_000).await;
    let token = issue_token(alice);
    let (status, _, _) =
        send_request(get("/api/user/balance/withdrawals", Some(&token)), configure_with(db)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
