use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{config::AuthConfig, errors::ServerError};

const PASSWORD_SALT: &str = "points-gateway";

/// Salted SHA-1 digest of a password, hex-encoded. This is the opaque string the engine stores
/// and compares; plaintext passwords never leave this function's callers.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(PASSWORD_SALT.as_bytes());
    hex::encode(hasher.finalize())
}

/// Access-token claims. Extracting `JwtClaims` in a handler is what makes the route require
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies HS256 access tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.signing_key.reveal().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry: config.token_expiry,
        }
    }

    pub fn issue_token(&self, user_id: i64) -> Result<String, ServerError> {
        let now = Utc::now();
        let claims = JwtClaims { user_id, iat: now.timestamp(), exp: (now + self.expiry).timestamp() };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServerError::Unspecified(format!("could not sign access token: {e}")))
    }

    /// Checks the signature and expiry and returns the embedded claims.
    pub fn verify_token(&self, token: &str) -> Result<JwtClaims, ServerError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("🔑️ Rejected access token: {e}");
                ServerError::InvalidAuthToken
            })
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req))
    }
}

fn claims_from_request(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::ConfigurationError("token issuer is not registered".to_string()))?;
    let auth_header = req.headers().get(header::AUTHORIZATION).ok_or(ServerError::MissingAuthToken)?;
    let value = auth_header.to_str().map_err(|_| ServerError::InvalidAuthToken)?;
    let token = value.strip_prefix("Bearer ").ok_or(ServerError::InvalidAuthToken)?;
    issuer.verify_token(token)
}

#[cfg(test)]
mod test {
    use pts_common::Secret;

    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            signing_key: Secret::new("test-signing-key".to_string()),
            token_expiry: chrono::Duration::minutes(10),
        })
    }

    #[test]
    fn digests_are_stable_and_salted() {
        let digest = password_digest("hunter2");
        assert_eq!(digest, password_digest("hunter2"));
        assert_ne!(digest, password_digest("hunter3"));
        assert_eq!(digest.len(), 40);
        assert_ne!(digest, hex::encode(Sha1::digest("hunter2".as_bytes())));
    }

    #[test]
    fn tokens_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_token(42).unwrap();
        let claims = issuer.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp - claims.iat, 10 * 60);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let issuer = issuer();
        let mut token = issuer.issue_token(42).unwrap();
        token.replace_range(token.len() - 5.., "AAAAA");
        assert!(matches!(issuer.verify_token(&token), Err(ServerError::InvalidAuthToken)));
    }

    #[test]
    fn tokens_from_another_key_are_rejected() {
        let other = TokenIssuer::new(&AuthConfig {
            signing_key: Secret::new("some-other-key".to_string()),
            token_expiry: chrono::Duration::minutes(10),
        });
        let token = other.issue_token(42).unwrap();
        assert!(issuer().verify_token(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = TokenIssuer::new(&AuthConfig {
            signing_key: Secret::new("test-signing-key".to_string()),
            token_expiry: chrono::Duration::minutes(-10),
        });
        let token = issuer.issue_token(42).unwrap();
        assert!(matches!(issuer.verify_token(&token), Err(ServerError::InvalidAuthToken)));
    }
}
