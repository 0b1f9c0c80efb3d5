//! services/api/src/bin/docs_api.rs
//!
//! The document Q&A desk server.

use api_lib::{
    adapters::{
        DbAdapter, DocumentTextExtractor, GcsStorageAdapter, LocalFallbackAdapter,
        OpenAiLlmAdapter, PngThumbnailGenerator,
    },
    config::Config,
    error::ApiError,
    startup::{
        connect_database, cors_layer, http_client, init_tracing, serve, with_service_layers,
    },
    web::{
        docs_router,
        rest::DocsApiDoc,
        state::{AuthState, DocsState, WorkspaceRegistry},
    },
};
use async_openai::{config::OpenAIConfig, Client};
use bizdesk_core::{
    chunking::{ChunkerConfig, RecursiveChunker},
    ingestion::IngestionPipeline,
    orchestrator::DocumentOrchestrator,
    records::UserRecords,
    retry::RetryPolicy,
};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    init_tracing(&config);
    info!("Configuration loaded. Starting document desk...");

    // --- 2. Connect to Database & Run Migrations ---
    let db_adapter: Arc<DbAdapter> = connect_database(&config).await?;

    // --- 3. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    if let Some(api_base) = &config.llm_api_base {
        openai_config = openai_config.with_api_base(api_base);
    }
    let llm = Arc::new(OpenAiLlmAdapter::new(
        Client::with_config(openai_config),
        config.llm_model.clone(),
    ));

    let client = http_client()?;
    let fallback = Arc::new(LocalFallbackAdapter::new(
        client.clone(),
        &config.fallback_url,
        config.fallback_model.clone(),
    ));
    let storage = Arc::new(GcsStorageAdapter::new(
        client,
        config.storage_base_url.as_deref(),
        config.storage_bucket.clone(),
        config.storage_token.clone(),
    ));

    let records = UserRecords::new(db_adapter.clone());
    let chunker = RecursiveChunker::new(ChunkerConfig {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
    });
    let ingestion = IngestionPipeline::new(
        Arc::new(DocumentTextExtractor::new()),
        Arc::new(PngThumbnailGenerator::new()),
        storage,
        records.clone(),
        chunker,
    );
    let orchestrator = DocumentOrchestrator::new(
        llm,
        fallback,
        RetryPolicy::new(config.llm_max_retries, config.fallback_max_length),
    )
    .with_concurrency(config.llm_concurrency);

    // --- 4. Build the Shared State ---
    let workspaces = Arc::new(WorkspaceRegistry::new());
    let state = Arc::new(DocsState {
        auth: AuthState {
            identity: db_adapter,
            session_ttl: chrono::Duration::days(config.session_ttl_days),
            workspaces: Some(workspaces.clone()),
        },
        records,
        ingestion,
        orchestrator,
        workspaces,
    });

    // --- 5. Create the Web Router & Serve ---
    let app = with_service_layers(
        docs_router(state),
        cors_layer(&config.allowed_origin)?,
        DocsApiDoc::openapi(),
    );
    serve(app, config.docs_bind_address).await
}
