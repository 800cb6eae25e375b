use std::sync::Arc;

use anyhow::Result;
use backend::{
    auth::JwtSecret,
    axum_http::http_serve,
    config::{config_loader, config_model::DotEnvyConfig},
};
use crates::{
    infra::db::postgres::postgres_connection, payments::stripe_client::StripeClient,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = bootstrap().await {
        error!(error = ?err, "class payments backend: startup failed");
        std::process::exit(1);
    }
}

async fn bootstrap() -> Result<()> {
    // RUST_LOG may come from `.env`.
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let config: Arc<DotEnvyConfig> = Arc::new(config_loader::load()?);
    info!(
        port = config.backend_server.port,
        timeout_secs = config.backend_server.timeout,
        body_limit_mib = config.backend_server.body_limit,
        "class payments backend: configuration loaded"
    );

    let db_pool = Arc::new(postgres_connection::establish_connection(
        &config.database.url,
    )?);
    info!("class payments backend: postgres pool established");

    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));
    let jwt_secret = Arc::new(JwtSecret(config.supabase.jwt_secret.clone()));

    http_serve::start(config, db_pool, stripe_client, jwt_secret).await
}
