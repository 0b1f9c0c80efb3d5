//! services/api/src/web/docs.rs
//!
//! The document Q&A desk. Uploads replace the session's working set of
//! documents; summaries and answers are computed over that set, persisted,
//! and appended to the session's conversation history.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bizdesk_core::domain::{ProcessedDocument, QueryRecord, SessionContext, SummaryRecord};
use bizdesk_core::history::HISTORY_EXPORT_FILENAME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::report::{render_history_report, report_filename, HISTORY_REPORT_PREFIX};
use crate::web::auth::{docs_signup_handler, login_handler, logout_handler};
use crate::web::middleware::require_auth;
use crate::web::rest::{attachment, port_failure, read_multipart, FormPart};
use crate::web::state::{AuthState, DocsState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PasteRequest {
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct QueryRequest {
    pub question: String,
}

/// A document now in the session's working set.
#[derive(Serialize, ToSchema)]
pub struct IngestedDocument {
    pub filename: String,
    pub file_url: Option<String>,
    pub chunk_count: usize,
    /// Base64 PNG preview, when one could be generated.
    pub thumbnail: Option<String>,
}

impl From<&ProcessedDocument> for IngestedDocument {
    fn from(doc: &ProcessedDocument) -> Self {
        Self {
            filename: doc.filename.clone(),
            file_url: doc.file_url.clone(),
            chunk_count: doc.chunks.len(),
            thumbnail: doc.thumbnail.as_deref().map(|png| STANDARD.encode(png)),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub documents: Vec<IngestedDocument>,
    /// The file that stopped the batch; files after it were not attempted.
    pub failed: Option<UploadFailure>,
}

#[derive(Serialize)]
pub struct StoredDocument {
    pub filename: String,
    pub file_url: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Serialize, ToSchema)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub entries: Vec<String>,
}

//=========================================================================================
// Router
//=========================================================================================

pub fn router(state: Arc<DocsState>) -> Router {
    let auth: AuthState = state.auth.clone();

    let public_routes = Router::new()
        .route("/auth/signup", post(docs_signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    let protected_routes = Router::new()
        .route("/profile", get(profile_handler))
        .route(
            "/documents",
            get(list_documents_handler).post(upload_documents_handler),
        )
        .route("/documents/text", post(paste_text_handler))
        .route("/summary", post(summary_handler))
        .route("/query", post(query_handler))
        .route("/history", get(history_handler))
        .route("/history/download", get(history_download_handler))
        .route("/history/pdf", get(history_pdf_handler))
        .layer(axum_middleware::from_fn_with_state(auth, require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// The working set's chunks, or 400 when nothing has been uploaded yet.
async fn current_chunks(
    state: &DocsState,
    session: &SessionContext,
) -> Result<Vec<String>, (StatusCode, String)> {
    let chunks = state
        .workspaces
        .with(session, |w| w.combined_chunks.clone())
        .await;
    if chunks.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Upload a document or paste some text first".to_string(),
        ));
    }
    Ok(chunks)
}

//=========================================================================================
// Profile and Documents
//=========================================================================================

/// GET /profile - The caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Email and organization"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load profile", e))?;
    Ok(Json(profile))
}

/// POST /documents - Upload one or more documents
///
/// Replaces the session's working set with the files in this upload.
#[utoipa::path(
    post,
    path = "/documents",
    request_body(content_type = "multipart/form-data", description = "One or more file parts."),
    responses(
        (status = 201, description = "Every file ingested", body = UploadResponse),
        (status = 207, description = "Some files ingested before one failed", body = UploadResponse),
        (status = 400, description = "No files, or the first file was unusable"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Ingestion failed")
    )
)]
pub async fn upload_documents_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let files: Vec<_> = read_multipart(multipart)
        .await?
        .into_iter()
        .filter_map(FormPart::into_upload)
        .collect();
    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include at least one file".to_string(),
        ));
    }

    let report = state.ingestion.ingest_all(session.user_id, &files).await;
    let status = if report.is_complete() {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    let chunks = report.combined_chunks();
    let documents: Vec<IngestedDocument> = report.processed.iter().map(IngestedDocument::from).collect();

    let failed = match report.failure {
        Some((filename, e)) if documents.is_empty() => {
            return Err(port_failure(&format!("Failed to process {}", filename), e));
        }
        Some((filename, e)) => {
            warn!(user_id = %session.user_id, %filename, "Upload batch stopped early: {}", e);
            let (_, message) = port_failure(&format!("Failed to process {}", filename), e);
            Some(UploadFailure {
                filename,
                error: message,
            })
        }
        None => None,
    };

    state
        .workspaces
        .with(&session, |w| w.replace_chunks(chunks))
        .await;
    Ok((status, Json(UploadResponse { documents, failed })))
}

/// POST /documents/text - Use pasted text as the working set
#[utoipa::path(
    post,
    path = "/documents/text",
    request_body = PasteRequest,
    responses(
        (status = 201, description = "Text ingested", body = IngestedDocument),
        (status = 400, description = "Empty text"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn paste_text_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<PasteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = state
        .ingestion
        .ingest_text(session.user_id, &req.text)
        .await
        .map_err(|e| port_failure("Failed to process pasted text", e))?;

    let response = IngestedDocument::from(&document);
    state
        .workspaces
        .with(&session, |w| w.replace_chunks(document.chunks))
        .await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /documents - Every document the user has uploaded
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Stored document metadata, oldest first"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_documents_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let documents: Vec<StoredDocument> = state
        .records
        .documents(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load documents", e))?
        .into_iter()
        .map(|record| StoredDocument {
            filename: record.filename,
            file_url: record.file_url,
            mime_type: record.mime_type,
            chunk_count: record.chunk_count,
            uploaded_at: record.uploaded_at,
        })
        .collect();
    Ok(Json(documents))
}

//=========================================================================================
// Summaries and Questions
//=========================================================================================

/// POST /summary - Summarize the working set
#[utoipa::path(
    post,
    path = "/summary",
    responses(
        (status = 200, description = "Summary of every current document", body = SummaryResponse),
        (status = 400, description = "Nothing uploaded yet"),
        (status = 401, description = "Not logged in"),
        (status = 429, description = "Language model rate limited")
    )
)]
pub async fn summary_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chunks = current_chunks(&state, &session).await?;
    info!(user_id = %session.user_id, chunks = chunks.len(), "Summarizing documents");

    let summary = state
        .orchestrator
        .summarize(&chunks)
        .await
        .map_err(|e| port_failure("Failed to generate summary", e))?;

    state
        .workspaces
        .with(&session, |w| w.history.record_summary(&summary))
        .await;
    let record = SummaryRecord {
        summary: summary.clone(),
        created_at: Utc::now(),
    };
    state
        .records
        .add_summary(session.user_id, &record)
        .await
        .map_err(|e| port_failure("Failed to save summary", e))?;

    Ok(Json(SummaryResponse { summary }))
}

/// POST /query - Ask a question about the working set
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Combined answer", body = QueryResponse),
        (status = 400, description = "Empty question or nothing uploaded yet"),
        (status = 401, description = "Not logged in"),
        (status = 429, description = "Language model rate limited")
    )
)]
pub async fn query_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a question".to_string()));
    }
    let chunks = current_chunks(&state, &session).await?;

    let answer = state
        .orchestrator
        .query(&question, &chunks)
        .await
        .map_err(|e| port_failure("Failed to answer question", e))?;

    state
        .workspaces
        .with(&session, |w| w.history.record_answer(&question, &answer))
        .await;
    let record = QueryRecord {
        question: question.clone(),
        answer: answer.clone(),
        timestamp: Utc::now(),
    };
    state
        .records
        .add_query(session.user_id, &record)
        .await
        .map_err(|e| port_failure("Failed to save query", e))?;

    Ok(Json(QueryResponse { question, answer }))
}

//=========================================================================================
// History
//=========================================================================================

async fn history_entries(state: &DocsState, session: &SessionContext) -> Vec<String> {
    state
        .workspaces
        .with(session, |w| w.history.entries().to_vec())
        .await
}

/// GET /history - This session's conversation history
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Summaries and answers, oldest first", body = HistoryResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn history_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> impl IntoResponse {
    Json(HistoryResponse {
        entries: history_entries(&state, &session).await,
    })
}

/// GET /history/download - The history as a text file
#[utoipa::path(
    get,
    path = "/history/download",
    responses(
        (status = 200, description = "Plain text export"),
        (status = 404, description = "No history yet"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn history_download_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let text = state
        .workspaces
        .with(&session, |w| {
            (!w.history.is_empty()).then(|| w.history.export_text())
        })
        .await
        .ok_or((StatusCode::NOT_FOUND, "No history yet".to_string()))?;

    Ok(attachment(
        "text/plain; charset=utf-8",
        HISTORY_EXPORT_FILENAME,
        text.into_bytes(),
    ))
}

/// GET /history/pdf - The history as a PDF report
#[utoipa::path(
    get,
    path = "/history/pdf",
    responses(
        (status = 200, description = "PDF report titled with the organization name"),
        (status = 404, description = "No history yet"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Report rendering failed")
    )
)]
pub async fn history_pdf_handler(
    State(state): State<Arc<DocsState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = history_entries(&state, &session).await;
    if entries.is_empty() {
        return Err((StatusCode::NOT_FOUND, "No history yet".to_string()));
    }

    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load profile", e))?;

    let now = Utc::now();
    let pdf = render_history_report(Some(profile.organization.as_str()), &entries, now).map_err(|e| {
        error!("Failed to render history report: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to render history report".to_string(),
        )
    })?;

    Ok(attachment(
        "application/pdf",
        &report_filename(HISTORY_REPORT_PREFIX, now.date_naive()),
        pdf,
    ))
}
