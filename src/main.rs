//! Marketplace API server

use anyhow::{Context, Result};
use marketplace_api::services::{EmailService, EventPublisher};
use marketplace_api::{db, router, AppConfig, AppState};
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let pool = db::create_pool(config.database_url.expose_secret()).await.context("connecting to database")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("running migrations")?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will not be published");
                None
            }
        },
        None => None,
    };
    let email = EmailService::new(config.email.as_ref()).context("configuring SMTP")?;
    if config.email.is_none() {
        tracing::warn!("SMTP not configured, emails will be logged only");
    }

    let addr = config.socket_addr();
    let app = router(AppState::new(pool, config, email, EventPublisher::new(nats)));

    tracing::info!("Marketplace API listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
