//! services/api/src/web/rest.rs
//!
//! The master OpenAPI definitions for both desks and the small helpers every
//! REST handler shares: error mapping, multipart reading and attachments.

use axum::{
    extract::Multipart,
    http::{header, StatusCode},
    response::IntoResponse,
};
use bizdesk_core::domain::{UploadedFile, ValidationError};
use bizdesk_core::ports::PortError;
use tracing::{error, warn};
use utoipa::OpenApi;

use crate::web::{auth, docs, tax};

//=========================================================================================
// OpenAPI Master Definitions
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::tax_signup_handler,
        auth::login_handler,
        auth::logout_handler,
        tax::get_business_handler,
        tax::update_revenue_handler,
        tax::dashboard_handler,
        tax::list_expenses_handler,
        tax::add_expense_handler,
        tax::expense_categories_handler,
        tax::expense_tips_handler,
        tax::list_assets_handler,
        tax::add_asset_handler,
        tax::asset_categories_handler,
        tax::tax_overview_handler,
        tax::tax_report_handler,
        tax::tax_report_pdf_handler,
    ),
    components(
        schemas(
            auth::TaxSignupRequest,
            auth::LoginRequest,
            auth::SignupResponse,
            auth::AuthResponse,
            tax::RevenueRequest,
            tax::ExpensePayload,
            tax::AssetPayload,
            tax::CreatedResponse,
        )
    ),
    tags(
        (name = "Business Tax Desk API", description = "Revenue, expenses, assets and tax estimates for a registered business.")
    )
)]
pub struct TaxApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::docs_signup_handler,
        auth::login_handler,
        auth::logout_handler,
        docs::profile_handler,
        docs::upload_documents_handler,
        docs::paste_text_handler,
        docs::list_documents_handler,
        docs::summary_handler,
        docs::query_handler,
        docs::history_handler,
        docs::history_download_handler,
        docs::history_pdf_handler,
    ),
    components(
        schemas(
            auth::DocsSignupRequest,
            auth::LoginRequest,
            auth::SignupResponse,
            auth::AuthResponse,
            docs::PasteRequest,
            docs::QueryRequest,
            docs::IngestedDocument,
            docs::UploadResponse,
            docs::SummaryResponse,
            docs::QueryResponse,
            docs::HistoryResponse,
        )
    ),
    tags(
        (name = "Document Q&A Desk API", description = "Upload documents, then summarize them or ask questions about them.")
    )
)]
pub struct DocsApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a port failure onto a status and a message safe to show the caller.
/// Unexpected failures are logged in full and reported with `context` only.
pub fn port_failure(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::InvalidInput(msg) => {
            warn!("{}: {}", context, msg);
            (StatusCode::BAD_REQUEST, msg)
        }
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::RateLimited(msg) => {
            warn!("{}: {}", context, msg);
            (
                StatusCode::TOO_MANY_REQUESTS,
                "The language model is busy, please try again shortly".to_string(),
            )
        }
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

pub fn validation_failure(e: ValidationError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

//=========================================================================================
// Multipart
//=========================================================================================

/// One part of a multipart form. `filename` is set for file parts only.
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FormPart {
    pub fn text(&self) -> Result<&str, (StatusCode, String)> {
        std::str::from_utf8(&self.bytes).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Field '{}' is not valid UTF-8: {}", self.name, e),
            )
        })
    }

    /// Files without a declared type are treated as plain text.
    pub fn into_upload(self) -> Option<UploadedFile> {
        let filename = self.filename?;
        Some(UploadedFile {
            filename,
            mime_type: self
                .content_type
                .unwrap_or_else(|| "text/plain".to_string()),
            bytes: self.bytes,
        })
    }
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<Vec<FormPart>, (StatusCode, String)> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read field '{}': {}", name, e),
            )
        })?;
        parts.push(FormPart {
            name,
            filename,
            content_type,
            bytes: data.to_vec(),
        });
    }
    Ok(parts)
}

//=========================================================================================
// Downloads
//=========================================================================================

/// A file download with the given content type and suggested filename.
pub fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}
