use std::path::Path;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::*;
use points_engine::{
    accrual::RestAccrualClient,
    poller::{PollConfig, PollScheduler},
    AccountApi,
    AuthApi,
    OrderFlowApi,
    PostgresDatabase,
    WithdrawalApi,
};

use crate::{auth::TokenIssuer, config::ServerConfig, errors::ServerError, routes};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = PostgresDatabase::new_with_url(&config.database_uri, 25)
        .await
        .map_err(|e| ServerError::ConfigurationError(format!("could not connect to the database: {e}")))?;
    db.migrate(Path::new(&config.migrations_path))
        .await
        .map_err(|e| ServerError::ConfigurationError(format!("could not apply migrations: {e}")))?;

    let accrual = RestAccrualClient::new(&config.accrual_address);
    let poll_config = PollConfig { poll_period: config.poll_period, ..Default::default() };
    let poller = PollScheduler::start(accrual, poll_config);

    // Orders stranded in a non-terminal status by a previous run get their polling back.
    let order_flow = OrderFlowApi::new(db.clone(), poller.clone());
    if let Err(e) = order_flow.resume_unresolved_orders().await {
        error!("📦️ Could not resume polling for unresolved orders: {e}");
    }

    let srv = create_server_instance(config, db, poller.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("🚪️ Server stopped. Shutting down the poll scheduler");
    poller.shutdown().await;
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: PostgresDatabase,
    poller: PollScheduler,
) -> Result<Server, ServerError> {
    let auth_config = config.auth.clone();
    let srv = HttpServer::new(move || {
        let auth_api = AuthApi::new(db.clone());
        let account_api = AccountApi::new(db.clone());
        let order_flow_api = OrderFlowApi::new(db.clone(), poller.clone());
        let withdrawal_api = WithdrawalApi::new(db.clone());
        let signer = TokenIssuer::new(&auth_config);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %U").log_target("points_server::requests"))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(account_api))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(withdrawal_api))
            .app_data(web::Data::new(signer))
            .service(routes::health)
            .configure(routes::configure_user_api::<PostgresDatabase>)
    })
    .bind(config.run_address.as_str())?
    .run();
    Ok(srv)
}
