//! services/api/src/startup.rs
//!
//! Process setup shared by the `tax_api` and `docs_api` binaries.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

use crate::adapters::DbAdapter;
use crate::config::Config;
use crate::error::ApiError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound for storage uploads and local model generations.
pub const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(300);

pub fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connects to Postgres and brings the schema up to date.
pub async fn connect_database(config: &Config) -> Result<Arc<DbAdapter>, ApiError> {
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    Ok(db_adapter)
}

/// Shared client for the storage and fallback model adapters.
pub fn http_client() -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder().timeout(OUTBOUND_TIMEOUT).build()?)
}

pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, ApiError> {
    let origin = allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", allowed_origin, e))
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

/// Wraps a desk router with the body limit, CORS and Swagger UI.
pub fn with_service_layers(
    api_router: Router,
    cors: CorsLayer,
    api_doc: utoipa::openapi::OpenApi,
) -> Router {
    let api_router = api_router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
}

pub async fn serve(app: Router, bind_address: SocketAddr) -> Result<(), ApiError> {
    info!("Starting server on {}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
