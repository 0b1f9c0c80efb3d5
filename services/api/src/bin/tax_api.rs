//! services/api/src/bin/tax_api.rs
//!
//! The business tax desk server.

use api_lib::{
    adapters::{DbAdapter, GcsStorageAdapter},
    config::Config,
    error::ApiError,
    startup::{
        connect_database, cors_layer, http_client, init_tracing, serve, with_service_layers,
    },
    web::{
        rest::TaxApiDoc,
        state::{AuthState, TaxState},
        tax_router,
    },
};
use bizdesk_core::records::BusinessRecords;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    init_tracing(&config);
    info!("Configuration loaded. Starting tax desk...");

    // --- 2. Connect to Database & Run Migrations ---
    let db_adapter: Arc<DbAdapter> = connect_database(&config).await?;

    // --- 3. Initialize Service Adapters ---
    let client = http_client()?;
    let storage = Arc::new(GcsStorageAdapter::new(
        client,
        config.storage_base_url.as_deref(),
        config.storage_bucket.clone(),
        config.storage_token.clone(),
    ));

    // --- 4. Build the Shared State ---
    let state = Arc::new(TaxState {
        auth: AuthState {
            identity: db_adapter.clone(),
            session_ttl: chrono::Duration::days(config.session_ttl_days),
            workspaces: None,
        },
        records: BusinessRecords::new(db_adapter),
        storage,
    });

    // --- 5. Create the Web Router & Serve ---
    let app = with_service_layers(
        tax_router(state),
        cors_layer(&config.allowed_origin)?,
        TaxApiDoc::openapi(),
    );
    serve(app, config.tax_bind_address).await
}
