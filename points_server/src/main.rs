use dotenvy::dotenv;
use log::{error, info};
use points_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    if !preflight_check(&config) {
        eprintln!("🚦️ Preflight check failed. Exiting. Check the logs for details.");
        return;
    }
    info!("🚀️ Starting points server on {}", config.run_address);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

fn preflight_check(config: &ServerConfig) -> bool {
    let mut result = true;
    info!("🚦️ Running preflight checks...");
    if config.database_uri.is_empty() {
        error!("🚦️ DATABASE_URI is not set. Please set it to the Postgres connection string.");
        result = false;
    }
    if config.accrual_address.is_empty() {
        error!("🚦️ ACCRUAL_SYSTEM_ADDRESS is not set. Orders cannot be processed without it.");
        result = false;
    }
    if config.auth.signing_key.reveal().is_empty() {
        error!("🚦️ SIGNING_KEY is not set. You must configure it before tokens can be issued.");
        result = false;
    }
    if result {
        info!("🚦️ Preflight check PASSED.");
    } else {
        error!("🚦️ Preflight check FAILED: Please fix the issues above before starting the server.");
    }
    result
}
