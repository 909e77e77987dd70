use actix_web::{http::StatusCode, web, web::ServiceConfig};
use points_engine::{db_types::User, traits::AuthApiError, AuthApi};
use serde_json::json;

use super::{
    helpers::{post_json, post_text, send_request, test_auth_config},
    mocks::MockAuthManager,
};
use crate::{
    auth::{password_digest, TokenIssuer},
    routes,
};

fn configure_with(auth_manager: MockAuthManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(AuthApi::new(auth_manager)))
            .route("/api/user/register", web::post().to(routes::register::<MockAuthManager>))
            .route("/api/user/login", web::post().to(routes::login::<MockAuthManager>));
    }
}

#[actix_web::test]
async fn register_issues_a_bearer_token() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_insert_user().returning(|_, _| Ok(7));
    let req = post_json("/api/user/register", None, json!({"login": "alice", "password": "pw"}));
    let (status, headers, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::OK);
    let header = headers.get("Authorization").expect("no Authorization header").to_str().unwrap();
    let token = header.strip_prefix("Bearer ").expect("not a bearer token");
    let claims = TokenIssuer::new(&test_auth_config()).verify_token(token).unwrap();
    assert_eq!(claims.user_id, 7);
}

#[actix_web::test]
async fn register_hashes_the_password_before_it_reaches_the_store() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager
        .expect_insert_user()
        .withf(|login, digest| login == "alice" && digest == password_digest("pw"))
        .returning(|_, _| Ok(7));
    let req = post_json("/api/user/register", None, json!({"login": "alice", "password": "pw"}));
    let (status, _, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn register_duplicate_login_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_insert_user().returning(|login, _| Err(AuthApiError::DuplicateLogin(login.to_string())));
    let req = post_json("/api/user/register", None, json!({"login": "alice", "password": "pw"}));
    let (status, _, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn register_empty_login_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    // The store must not be touched; no expectation is set, so a call would fail the test.
    let auth_manager = MockAuthManager::new();
    let req = post_json("/api/user/register", None, json!({"login": "", "password": "pw"}));
    let (status, _, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn register_malformed_body_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let auth_manager = MockAuthManager::new();
    let req = post_text("/api/user/register", None, "not json at all");
    let (status, _, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn login_with_correct_credentials_issues_a_token() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_fetch_user_by_login().returning(|login| {
        Ok(Some(User { id: 7, login: login.to_string(), password_digest: password_digest("pw") }))
    });
    let req = post_json("/api/user/login", None, json!({"login": "alice", "password": "pw"}));
    let (status, headers, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("Authorization").is_some());
}

#[actix_web::test]
async fn login_with_wrong_password_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_fetch_user_by_login().returning(|login| {
        Ok(Some(User { id: 7, login: login.to_string(), password_digest: password_digest("something else") }))
    });
    let req = post_json("/api/user/login", None, json!({"login": "alice", "password": "pw"}));
    let (status, headers, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get("Authorization").is_none());
}

#[actix_web::test]
async fn login_of_unknown_user_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_fetch_user_by_login().returning(|_| Ok(None));
    let req = post_json("/api/user/login", None, json!({"login": "nobody", "password": "pw"}));
    let (status, _, _) = send_request(req, configure_with(auth_manager)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
