//! services/api/src/web/tax.rs
//!
//! The business tax desk: profile and revenue, expenses, assets, the tax
//! estimate and its PDF report.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Extension, Router,
};
use bizdesk_core::domain::{
    Asset, AssetCategory, BusinessProfile, Expense, ExpenseCategory, RevenueStreams, RevenueUpdate, SessionContext,
};
use bizdesk_core::records::supporting_document_path;
use bizdesk_core::summary::{
    asset_register, bracket_gap_notice, dashboard, optimization_tips, tax_summary, DepreciatedAsset,
    TaxSummary, TaxTip,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::report::{render_tax_report, report_filename, TAX_REPORT_PREFIX};
use crate::web::auth::{login_handler, logout_handler, tax_signup_handler};
use crate::web::middleware::require_auth;
use crate::web::rest::{attachment, port_failure, read_multipart, validation_failure, FormPart};
use crate::web::state::{AuthState, TaxState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RevenueRequest {
    pub gross_revenue: f64,
    #[serde(default)]
    pub other_income: f64,
    #[serde(default)]
    pub products: f64,
    #[serde(default)]
    pub services: f64,
    #[serde(default)]
    pub investments: f64,
}

/// The JSON carried in the `payload` part of `POST /expenses`.
#[derive(Deserialize, ToSchema)]
pub struct ExpensePayload {
    #[schema(value_type = String)]
    pub main_category: ExpenseCategory,
    pub sub_category: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_capital_expense: bool,
}

/// The JSON carried in the `payload` part of `POST /assets`.
#[derive(Deserialize, ToSchema)]
pub struct AssetPayload {
    #[schema(value_type = String)]
    pub category: AssetCategory,
    pub description: String,
    pub purchase_date: NaiveDate,
    pub purchase_cost: f64,
    /// Years; defaults to the category's write-off period.
    pub expected_life: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
    pub document_url: Option<String>,
}

#[derive(Serialize)]
pub struct CategoryListing {
    pub category: &'static str,
    pub sub_categories: &'static [&'static str],
}

#[derive(Serialize)]
pub struct CategoryTip {
    pub category: &'static str,
    pub tip: &'static str,
}

#[derive(Serialize)]
pub struct AssetCategoryListing {
    pub category: &'static str,
    pub default_life: u32,
}

#[derive(Serialize)]
pub struct ValueComparison {
    pub description: String,
    pub purchase_cost: f64,
    pub current_value: f64,
}

#[derive(Serialize)]
pub struct AssetRegisterResponse {
    pub assets: Vec<DepreciatedAsset>,
    pub chart: Vec<ValueComparison>,
}

#[derive(Serialize)]
pub struct TaxOverview {
    pub summary: TaxSummary,
    pub tips: Vec<TaxTip>,
    /// Set when small business income lands between two brackets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

//=========================================================================================
// Router
//=========================================================================================

pub fn router(state: Arc<TaxState>) -> Router {
    let auth: AuthState = state.auth.clone();

    let public_routes = Router::new()
        .route("/auth/signup", post(tax_signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    let protected_routes = Router::new()
        .route("/business", get(get_business_handler))
        .route("/business/revenue", put(update_revenue_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/expenses", get(list_expenses_handler).post(add_expense_handler))
        .route("/expenses/categories", get(expense_categories_handler))
        .route("/expenses/tips", get(expense_tips_handler))
        .route("/assets", get(list_assets_handler).post(add_asset_handler))
        .route("/asset-categories", get(asset_categories_handler))
        .route("/tax", get(tax_overview_handler))
        .route("/reports/tax-summary", get(tax_report_handler))
        .route("/reports/tax-summary/pdf", get(tax_report_pdf_handler))
        .layer(axum_middleware::from_fn_with_state(auth, require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Splits a `payload` + optional `document` form.
fn split_form(parts: Vec<FormPart>) -> Result<(FormPart, Option<FormPart>), (StatusCode, String)> {
    let mut payload = None;
    let mut document = None;
    for part in parts {
        match part.name.as_str() {
            "payload" => payload = Some(part),
            "document" if part.filename.as_deref().is_some_and(|f| !f.is_empty()) => {
                document = Some(part)
            }
            _ => {}
        }
    }
    let payload = payload.ok_or((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a 'payload' field".to_string(),
    ))?;
    Ok((payload, document))
}

fn parse_payload<T: serde::de::DeserializeOwned>(part: &FormPart) -> Result<T, (StatusCode, String)> {
    serde_json::from_str(part.text()?)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid payload: {}", e)))
}

/// Uploads the supporting document, if one was attached, and returns its URL.
async fn store_supporting_document(
    state: &TaxState,
    session: &SessionContext,
    document: Option<FormPart>,
) -> Result<Option<String>, (StatusCode, String)> {
    let Some(file) = document.and_then(FormPart::into_upload) else {
        return Ok(None);
    };
    let path = supporting_document_path(session.user_id, &file.filename, Utc::now());
    let url = state
        .storage
        .upload(&path, &file.bytes, &file.mime_type)
        .await
        .map_err(|e| port_failure("Failed to upload supporting document", e))?;
    Ok(Some(url))
}

async fn load_summary(
    state: &TaxState,
    session: &SessionContext,
) -> Result<(BusinessProfile, Vec<Expense>, TaxSummary), (StatusCode, String)> {
    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load business profile", e))?;
    let expenses = state
        .records
        .expenses(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load expenses", e))?;
    let assets = state
        .records
        .assets(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load assets", e))?;
    let summary = tax_summary(&profile, &expenses, &assets).map_err(|e| {
        error!(user_id = %session.user_id, "Stored asset cannot be depreciated: {}", e);
        validation_failure(e)
    })?;
    Ok((profile, expenses, summary))
}

//=========================================================================================
// Business Profile
//=========================================================================================

/// GET /business - The business profile
#[utoipa::path(
    get,
    path = "/business",
    responses(
        (status = 200, description = "Business profile, empty if nothing was saved yet"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_business_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load business profile", e))?;
    Ok(Json(profile))
}

/// PUT /business/revenue - Save revenue figures
#[utoipa::path(
    put,
    path = "/business/revenue",
    request_body = RevenueRequest,
    responses(
        (status = 200, description = "Revenue saved; returns the updated profile"),
        (status = 400, description = "Negative amount"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn update_revenue_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<RevenueRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let update = RevenueUpdate {
        gross_revenue: req.gross_revenue,
        other_income: req.other_income,
        revenue_streams: RevenueStreams {
            products: req.products,
            services: req.services,
            investments: req.investments,
        },
        updated_at: Utc::now(),
    };
    state
        .records
        .save_revenue(session.user_id, &update)
        .await
        .map_err(|e| port_failure("Failed to save revenue", e))?;
    info!(user_id = %session.user_id, "Revenue information saved");

    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load business profile", e))?;
    Ok(Json(profile))
}

/// GET /dashboard - Expense totals and trends
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard figures"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .records
        .profile(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load business profile", e))?;
    let expenses = state
        .records
        .expenses(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load expenses", e))?;
    Ok(Json(dashboard(&profile, &expenses)))
}

//=========================================================================================
// Expenses
//=========================================================================================

/// GET /expenses - All recorded expenses
#[utoipa::path(
    get,
    path = "/expenses",
    responses(
        (status = 200, description = "Expenses in the order they were recorded"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_expenses_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let expenses = state
        .records
        .expenses(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load expenses", e))?;
    Ok(Json(expenses))
}

/// POST /expenses - Record an expense with an optional supporting document
#[utoipa::path(
    post,
    path = "/expenses",
    request_body(content_type = "multipart/form-data", description = "A `payload` part holding an ExpensePayload as JSON, and an optional `document` file part."),
    responses(
        (status = 201, description = "Expense recorded", body = CreatedResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Upload or save failed")
    )
)]
pub async fn add_expense_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (payload, document) = split_form(read_multipart(multipart).await?)?;
    let req: ExpensePayload = parse_payload(&payload)?;

    let mut expense = Expense {
        main_category: req.main_category,
        sub_category: req.sub_category,
        description: req.description,
        amount: req.amount,
        date: req.date,
        is_capital_expense: req.is_capital_expense,
        document_url: None,
        timestamp: Utc::now(),
    };
    // Reject before anything reaches storage.
    expense.validate().map_err(validation_failure)?;
    expense.document_url = store_supporting_document(&state, &session, document).await?;

    let id = state
        .records
        .add_expense(session.user_id, &expense)
        .await
        .map_err(|e| port_failure("Failed to save expense", e))?;
    info!(user_id = %session.user_id, expense_id = %id, "Expense recorded");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            document_url: expense.document_url,
        }),
    ))
}

/// GET /expenses/categories - Expense categories and their sub categories
#[utoipa::path(
    get,
    path = "/expenses/categories",
    responses((status = 200, description = "Category listing"))
)]
pub async fn expense_categories_handler() -> impl IntoResponse {
    let listing: Vec<CategoryListing> = ExpenseCategory::ALL
        .iter()
        .map(|c| CategoryListing {
            category: c.label(),
            sub_categories: c.sub_categories(),
        })
        .collect();
    Json(listing)
}

/// GET /expenses/tips - Standing tax tips per expense category
#[utoipa::path(
    get,
    path = "/expenses/tips",
    responses((status = 200, description = "One tip per category"))
)]
pub async fn expense_tips_handler() -> impl IntoResponse {
    let tips: Vec<CategoryTip> = ExpenseCategory::ALL
        .iter()
        .map(|c| CategoryTip {
            category: c.label(),
            tip: c.tax_tip(),
        })
        .collect();
    Json(tips)
}

//=========================================================================================
// Assets
//=========================================================================================

/// GET /assets - The asset register with current depreciation
#[utoipa::path(
    get,
    path = "/assets",
    responses(
        (status = 200, description = "Depreciated assets and a cost vs current value series"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_assets_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let assets = state
        .records
        .assets(session.user_id)
        .await
        .map_err(|e| port_failure("Failed to load assets", e))?;
    let register = asset_register(&assets, Utc::now().date_naive()).map_err(validation_failure)?;

    let chart = register
        .iter()
        .map(|row| ValueComparison {
            description: row.asset.description.clone(),
            purchase_cost: row.asset.purchase_cost,
            current_value: row.depreciation.current_value,
        })
        .collect();

    Ok(Json(AssetRegisterResponse {
        assets: register,
        chart,
    }))
}

/// POST /assets - Record an asset with an optional supporting document
#[utoipa::path(
    post,
    path = "/assets",
    request_body(content_type = "multipart/form-data", description = "A `payload` part holding an AssetPayload as JSON, and an optional `document` file part."),
    responses(
        (status = 201, description = "Asset recorded", body = CreatedResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Upload or save failed")
    )
)]
pub async fn add_asset_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (payload, document) = split_form(read_multipart(multipart).await?)?;
    let req: AssetPayload = parse_payload(&payload)?;

    let mut asset = Asset {
        expected_life: req.expected_life.unwrap_or_else(|| req.category.default_life()),
        category: req.category,
        description: req.description,
        purchase_date: req.purchase_date,
        purchase_cost: req.purchase_cost,
        document_url: None,
        timestamp: Utc::now(),
    };
    asset.validate().map_err(validation_failure)?;
    asset.document_url = store_supporting_document(&state, &session, document).await?;

    let id = state
        .records
        .add_asset(session.user_id, &asset)
        .await
        .map_err(|e| port_failure("Failed to save asset", e))?;
    info!(user_id = %session.user_id, asset_id = %id, "Asset recorded");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            document_url: asset.document_url,
        }),
    ))
}

/// GET /asset-categories - Asset categories and their default lives
#[utoipa::path(
    get,
    path = "/asset-categories",
    responses((status = 200, description = "Category listing"))
)]
pub async fn asset_categories_handler() -> impl IntoResponse {
    let listing: Vec<AssetCategoryListing> = AssetCategory::ALL
        .iter()
        .map(|c| AssetCategoryListing {
            category: c.label(),
            default_life: c.default_life(),
        })
        .collect();
    Json(listing)
}

//=========================================================================================
// Tax Estimate and Reports
//=========================================================================================

/// GET /tax - The tax estimate with optimization tips
#[utoipa::path(
    get,
    path = "/tax",
    responses(
        (status = 200, description = "Tax summary and tips"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn tax_overview_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (profile, expenses, summary) = load_summary(&state, &session).await?;
    let tips = optimization_tips(&profile, &expenses, &summary);
    let notice = bracket_gap_notice(&summary);
    Ok(Json(TaxOverview {
        summary,
        tips,
        notice,
    }))
}

/// GET /reports/tax-summary - The figures behind the PDF report
#[utoipa::path(
    get,
    path = "/reports/tax-summary",
    responses(
        (status = 200, description = "Tax summary"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn tax_report_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (_, _, summary) = load_summary(&state, &session).await?;
    Ok(Json(summary))
}

/// GET /reports/tax-summary/pdf - Download the tax summary report
#[utoipa::path(
    get,
    path = "/reports/tax-summary/pdf",
    responses(
        (status = 200, description = "PDF report"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Report rendering failed")
    )
)]
pub async fn tax_report_pdf_handler(
    State(state): State<Arc<TaxState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (profile, _, summary) = load_summary(&state, &session).await?;
    let today = Utc::now().date_naive();

    let pdf = render_tax_report(&profile.business_name, &summary, today).map_err(|e| {
        error!("Failed to render tax report: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to render tax report".to_string(),
        )
    })?;

    Ok(attachment(
        "application/pdf",
        &report_filename(TAX_REPORT_PREFIX, today),
        pdf,
    ))
}
