use std::{env, time::Duration};

use log::*;
use pts_common::Secret;

const DEFAULT_RUN_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_POLL_PERIOD_SECS: u64 = 2;
const DEFAULT_MIGRATIONS_PATH: &str = "./migrations";
const DEFAULT_TOKEN_EXPIRY_MINS: i64 = 10;

/// Server configuration, read from the environment once at startup and passed explicitly to every
/// component that needs it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `RUN_ADDRESS`: address and port the HTTP server binds to.
    pub run_address: String,
    /// `DATABASE_URI`: Postgres connection string.
    pub database_uri: String,
    /// `ACCRUAL_SYSTEM_ADDRESS`: base URL of the external accrual system.
    pub accrual_address: String,
    /// `ACCRUAL_SYSTEM_POLL_PERIOD`: seconds between accrual lookups for one order.
    pub poll_period: Duration,
    /// `MIGRATION_SCRIPTS_PATH`: directory holding the SQL migration scripts.
    pub migrations_path: String,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// `SIGNING_KEY`: HMAC secret for access tokens.
    pub signing_key: Secret<String>,
    pub token_expiry: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: Secret::new(String::default()),
            token_expiry: chrono::Duration::minutes(DEFAULT_TOKEN_EXPIRY_MINS),
        }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, String> {
        let signing_key =
            env::var("SIGNING_KEY").map_err(|_| "SIGNING_KEY is not set".to_string())?;
        if signing_key.is_empty() {
            return Err("SIGNING_KEY is empty".to_string());
        }
        Ok(Self { signing_key: Secret::new(signing_key), ..Default::default() })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: DEFAULT_RUN_ADDRESS.to_string(),
            database_uri: String::default(),
            accrual_address: String::default(),
            poll_period: Duration::from_secs(DEFAULT_POLL_PERIOD_SECS),
            migrations_path: DEFAULT_MIGRATIONS_PATH.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let run_address = env::var("RUN_ADDRESS").ok().unwrap_or_else(|| DEFAULT_RUN_ADDRESS.into());
        let database_uri = env::var("DATABASE_URI").ok().unwrap_or_else(|| {
            error!("DATABASE_URI is not set. Please set it to the Postgres connection string.");
            String::default()
        });
        let accrual_address = env::var("ACCRUAL_SYSTEM_ADDRESS").ok().unwrap_or_else(|| {
            error!("ACCRUAL_SYSTEM_ADDRESS is not set. Please set it to the accrual system's base URL.");
            String::default()
        });
        let poll_period = env::var("ACCRUAL_SYSTEM_POLL_PERIOD")
            .map(|s| {
                s.parse::<u64>().unwrap_or_else(|e| {
                    error!(
                        "{s} is not a valid value for ACCRUAL_SYSTEM_POLL_PERIOD. {e} Using the default, \
                         {DEFAULT_POLL_PERIOD_SECS}s, instead."
                    );
                    DEFAULT_POLL_PERIOD_SECS
                })
            })
            .ok()
            .unwrap_or(DEFAULT_POLL_PERIOD_SECS);
        let migrations_path =
            env::var("MIGRATION_SCRIPTS_PATH").ok().unwrap_or_else(|| DEFAULT_MIGRATIONS_PATH.into());
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            error!("{e}. Tokens cannot be issued until it is configured.");
            AuthConfig::default()
        });
        Self {
            run_address,
            database_uri,
            accrual_address,
            poll_period: Duration::from_secs(poll_period),
            migrations_path,
            auth,
        }
    }
}
