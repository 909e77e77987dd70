use actix_web::{
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use pts_common::Secret;

use crate::{auth::TokenIssuer, config::AuthConfig};

// A fixed signing key for issuing tokens in tests. DO NOT re-use this key anywhere.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        signing_key: Secret::new("endpoint-test-signing-key".to_string()),
        token_expiry: chrono::Duration::minutes(10),
    }
}

pub fn issue_token(user_id: i64) -> String {
    TokenIssuer::new(&test_auth_config()).issue_token(user_id).expect("Failed to issue test token")
}

pub fn get(path: &str, token: Option<&str>) -> TestRequest {
    with_auth(TestRequest::get().uri(path), token)
}

pub fn post_json(path: &str, token: Option<&str>, body: serde_json::Value) -> TestRequest {
    with_auth(TestRequest::post().uri(path).set_json(body), token)
}

pub fn post_text(path: &str, token: Option<&str>, body: &str) -> TestRequest {
    with_auth(TestRequest::post().uri(path).set_payload(body.to_string()), token)
}

fn with_auth(req: TestRequest, token: Option<&str>) -> TestRequest {
    match token {
        Some(token) => req.insert_header(("Authorization", format!("Bearer {token}"))),
        None => req,
    }
}

/// Runs one request against an app wired with the test token issuer and the routes registered by
/// `configure`. Returns status, response headers and the body as a string.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, HeaderMap, String)
where F: FnOnce(&mut ServiceConfig) {
    let signer = TokenIssuer::new(&test_auth_config());
    let app = App::new().app_data(web::Data::new(signer)).configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, headers, body)
}
