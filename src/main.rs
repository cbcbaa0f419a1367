use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use servicebook::config::AppConfig;
use servicebook::db::{default_indexes, EntityStore, SqliteStore};
use servicebook::handlers;
use servicebook::services::messaging::twilio::TwilioSmsProvider;
use servicebook::services::messaging::{LogOnlyMessaging, MessagingProvider};
use servicebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store: Arc<dyn EntityStore> = Arc::new(SqliteStore::open(&config.database_url, default_indexes())?);

    let messaging: Arc<dyn MessagingProvider> = if config.twilio_configured() {
        tracing::info!(from = %config.twilio_phone_number, "sending customer notices over Twilio SMS");
        Arc::new(TwilioSmsProvider::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
        ))
    } else {
        tracing::warn!("Twilio is not configured, customer notices will only be logged");
        Arc::new(LogOnlyMessaging)
    };

    let state = Arc::new(AppState::new(config.clone(), store, messaging));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
