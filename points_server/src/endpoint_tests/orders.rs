use std::time::Duration;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use points_engine::{
    accrual::AccrualStatus,
    db_types::OrderStatus,
    poller::{PollConfig, PollScheduler},
    test_utils::{accrual_update, ScriptedAccrual},
    traits::{AuthManagement, LedgerDatabase},
    AccountApi,
    DummyDatabase,
    OrderFlowApi,
};
use pts_common::Point;

use super::helpers::{get, issue_token, post_text, send_request};
use crate::routes;

fn quick_poll_config() -> PollConfig {
    PollConfig { workers: 2, poll_period: Duration::from_millis(5), max_backoff: Duration::from_millis(40) }
}

fn configure_with(db: DummyDatabase, poller: PollScheduler) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone(), poller)))
            .app_data(web::Data::new(AccountApi::new(db)))
            .route("/api/user/orders", web::post().to(routes::post_order::<DummyDatabase>))
            .route("/api/user/orders", web::get().to(routes::get_orders::<DummyDatabase>));
    }
}

fn dead_accrual_poller() -> PollScheduler {
    PollScheduler::start(ScriptedAccrual::unavailable(), quick_poll_config())
}

#[actix_web::test]
async fn uploading_requires_authentication() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let poller = dead_accrual_poller();
    let req = post_text("/api/user/orders", None, "79927398713");
    let (status, _, _) = send_request(req, configure_with(db, poller.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    poller.shutdown().await;
}

#[actix_web::test]
async fn garbage_tokens_are_unauthorized() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let poller = dead_accrual_poller();
    let req = post_text("/api/user/orders", Some("not-a-jwt"), "79927398713");
    let (status, _, _) = send_request(req, configure_with(db, poller.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    poller.shutdown().await;
}

#[actix_web::test]
async fn numbers_failing_the_checksum_are_unprocessable() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    let poller = dead_accrual_poller();
    let token = issue_token(alice);
    let req = post_text("/api/user/orders", Some(&token), "1234");
    let (status, _, _) = send_request(req, configure_with(db, poller.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    poller.shutdown().await;
}

#[actix_web::test]
async fn upload_dedup_is_classified_by_owner() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    let bob = db.insert_user("bob", "digest").await.unwrap();
    let poller = dead_accrual_poller();

    let token = issue_token(alice);
    let req = post_text("/api/user/orders", Some(&token), "79927398713");
    let (status, _, _) = send_request(req, configure_with(db.clone(), poller.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let req = post_text("/api/user/orders", Some(&token), "79927398713");
    let (status, _, _) = send_request(req, configure_with(db.clone(), poller.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let bob_token = issue_token(bob);
    let req = post_text("/api/user/orders", Some(&bob_token), "79927398713");
    let (status, _, _) = send_request(req, configure_with(db.clone(), poller.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    poller.shutdown().await;
}

#[actix_web::test]
async fn listing_without_orders_is_no_content() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    let poller = dead_accrual_poller();
    let token = issue_token(alice);
    let (status, _, body) = send_request(get("/api/user/orders", Some(&token)), configure_with(db, poller.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    poller.shutdown().await;
}

#[actix_web::test]
async fn credited_orders_are_listed_with_their_accrual() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    let poller = PollScheduler::start(
        ScriptedAccrual::new([
            Ok(accrual_update("6122", AccrualStatus::Registered, 0)),
            Ok(accrual_update("6122", AccrualStatus::Processed, 30012)),
        ]),
        quick_poll_config(),
    );
    let token = issue_token(alice);

    let req = post_text("/api/user/orders", Some(&token), "6122");
    let (status, _, _) = send_request(req, configure_with(db.clone(), poller.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Wait out the background credit.
    for _ in 0..400 {
        let orders = db.fetch_order_by_number("6122").await.unwrap();
        if orders.map(|o| o.status) == Some(OrderStatus::Processed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, _, body) =
        send_request(get("/api/user/orders", Some(&token)), configure_with(db.clone(), poller.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let listed: serde_json::Value = serde_json::from_str(&body).unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["number"], "6122");
    assert_eq!(listed[0]["status"], "PROCESSED");
    assert_eq!(listed[0]["accrual"], 300.12);
    assert!(listed[0]["uploaded_at"].as_str().unwrap().contains('T'));
    assert_eq!(
        points_engine::traits::AccountManagement::balance_for_user(&db, alice).await.unwrap().current,
        Point::from(30012)
    );
    poller.shutdown().await;
}

#[actix_web::test]
async fn non_terminal_orders_are_listed_without_accrual() {
    let _ = env_logger::try_init().ok();
    let db = DummyDatabase::new();
    let alice = db.insert_user("alice", "digest").await.unwrap();
    db.insert_order("6122", alice).await.unwrap();
    let poller = dead_accrual_poller();
    let token = issue_token(alice);
    let (status, _, body) =
        send_request(get("/api/user/orders", Some(&token)), configure_with(db, poller.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let listed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed[0]["status"], "NEW");
    assert!(listed[0].get("accrual").is_none());
    poller.shutdown().await;
}
