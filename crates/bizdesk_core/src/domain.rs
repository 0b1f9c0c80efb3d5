//! crates/bizdesk_core/src/domain.rs
//!
//! Defines the pure, core data structures for both desks.
//! These structs are independent of any database; they only carry the serde
//! shape used when they are written to the record store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Identity and Sessions
//=========================================================================================

// Represents a user - used by both desks
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller. Built by the auth middleware from a valid
/// `AuthSession` and handed to every protected handler.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<AuthSession> for SessionContext {
    fn from(session: AuthSession) -> Self {
        Self {
            user_id: session.user_id,
            session_id: session.id,
            expires_at: session.expires_at,
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

/// Input violations caught before anything is computed or persisted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("expected life must be at least one year")]
    ZeroExpectedLife,
    #[error("'{sub_category}' is not a sub category of '{main_category}'")]
    UnknownSubCategory {
        main_category: &'static str,
        sub_category: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

//=========================================================================================
// Tax Desk: Business Profile
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessType {
    #[serde(rename = "Small Business Corporation")]
    SmallBusinessCorporation,
    #[serde(rename = "Medium to Large Corporation")]
    MediumToLargeCorporation,
    #[serde(rename = "Sole Proprietorship")]
    SoleProprietorship,
    #[serde(rename = "Partnership")]
    Partnership,
}

impl BusinessType {
    pub const ALL: [BusinessType; 4] = [
        BusinessType::SmallBusinessCorporation,
        BusinessType::MediumToLargeCorporation,
        BusinessType::SoleProprietorship,
        BusinessType::Partnership,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BusinessType::SmallBusinessCorporation => "Small Business Corporation",
            BusinessType::MediumToLargeCorporation => "Medium to Large Corporation",
            BusinessType::SoleProprietorship => "Sole Proprietorship",
            BusinessType::Partnership => "Partnership",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueStreams {
    pub products: f64,
    pub services: f64,
    pub investments: f64,
}

/// The business document stored at `businesses/{uid}`.
///
/// Every field is defaulted so a half-filled document (signup without any
/// revenue saved yet) still reads back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessProfile {
    pub business_name: String,
    pub business_type: Option<BusinessType>,
    pub gross_revenue: f64,
    pub other_income: f64,
    pub revenue_streams: RevenueStreams,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BusinessProfile {
    pub fn total_revenue(&self) -> f64 {
        self.gross_revenue + self.other_income
    }

    pub fn is_small_business(&self) -> bool {
        self.business_type == Some(BusinessType::SmallBusinessCorporation)
    }
}

/// The revenue form. Written with merge semantics so it never clobbers the
/// name and type captured at signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueUpdate {
    pub gross_revenue: f64,
    pub other_income: f64,
    pub revenue_streams: RevenueStreams,
    pub updated_at: DateTime<Utc>,
}

impl RevenueUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("gross revenue", self.gross_revenue)?;
        non_negative("other income", self.other_income)?;
        non_negative("product sales", self.revenue_streams.products)?;
        non_negative("service revenue", self.revenue_streams.services)?;
        non_negative("investment income", self.revenue_streams.investments)
    }
}

//=========================================================================================
// Tax Desk: Expenses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[serde(rename = "Operating Costs")]
    OperatingCosts,
    #[serde(rename = "Employee Costs")]
    EmployeeCosts,
    #[serde(rename = "Capital Expenses")]
    CapitalExpenses,
    #[serde(rename = "Professional Services")]
    ProfessionalServices,
    #[serde(rename = "Marketing & Sales")]
    MarketingAndSales,
    #[serde(rename = "Research & Development")]
    ResearchAndDevelopment,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::OperatingCosts,
        ExpenseCategory::EmployeeCosts,
        ExpenseCategory::CapitalExpenses,
        ExpenseCategory::ProfessionalServices,
        ExpenseCategory::MarketingAndSales,
        ExpenseCategory::ResearchAndDevelopment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::OperatingCosts => "Operating Costs",
            ExpenseCategory::EmployeeCosts => "Employee Costs",
            ExpenseCategory::CapitalExpenses => "Capital Expenses",
            ExpenseCategory::ProfessionalServices => "Professional Services",
            ExpenseCategory::MarketingAndSales => "Marketing & Sales",
            ExpenseCategory::ResearchAndDevelopment => "Research & Development",
        }
    }

    pub fn sub_categories(&self) -> &'static [&'static str] {
        match self {
            ExpenseCategory::OperatingCosts => &[
                "Rent",
                "Utilities",
                "Insurance",
                "Office Supplies",
                "Communications",
            ],
            ExpenseCategory::EmployeeCosts => &[
                "Salaries",
                "Wages",
                "Employee Benefits",
                "Training",
                "UIF Contributions",
            ],
            ExpenseCategory::CapitalExpenses => &[
                "Equipment",
                "Vehicles",
                "Buildings",
                "Renovations",
                "Software",
            ],
            ExpenseCategory::ProfessionalServices => &[
                "Legal Fees",
                "Accounting Fees",
                "Consulting Fees",
                "IT Services",
            ],
            ExpenseCategory::MarketingAndSales => {
                &["Advertising", "Marketing", "Travel", "Entertainment"]
            }
            ExpenseCategory::ResearchAndDevelopment => {
                &["R&D Materials", "R&D Equipment", "R&D Labor", "Patents"]
            }
        }
    }

    /// The standing tax-saving advice shown next to the expense form.
    pub fn tax_tip(&self) -> &'static str {
        match self {
            ExpenseCategory::OperatingCosts => "Keep detailed records of all operating expenses. Consider prepaying certain expenses before year-end if beneficial.",
            ExpenseCategory::EmployeeCosts => "Employee training costs are fully deductible. Consider implementing learnership programs for additional tax benefits.",
            ExpenseCategory::CapitalExpenses => "Utilize SARS wear and tear allowances. Consider Section 12J investments for tax benefits.",
            ExpenseCategory::ProfessionalServices => "Professional fees are generally deductible if they relate to your business operations.",
            ExpenseCategory::MarketingAndSales => "Entertainment expenses must be supported by detailed records to be deductible.",
            ExpenseCategory::ResearchAndDevelopment => "R&D expenses may qualify for special tax incentives. Consult with a tax professional.",
        }
    }
}

/// One row of `businesses/{uid}/expenses`. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub main_category: ExpenseCategory,
    pub sub_category: String,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub is_capital_expense: bool,
    pub document_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Expense {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("amount", self.amount)?;
        if !self
            .main_category
            .sub_categories()
            .contains(&self.sub_category.as_str())
        {
            return Err(ValidationError::UnknownSubCategory {
                main_category: self.main_category.label(),
                sub_category: self.sub_category.clone(),
            });
        }
        Ok(())
    }
}

//=========================================================================================
// Tax Desk: Assets
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetCategory {
    Buildings,
    Machinery,
    #[serde(rename = "Office Equipment")]
    OfficeEquipment,
    Computers,
    Vehicles,
    Furniture,
    Software,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 7] = [
        AssetCategory::Buildings,
        AssetCategory::Machinery,
        AssetCategory::OfficeEquipment,
        AssetCategory::Computers,
        AssetCategory::Vehicles,
        AssetCategory::Furniture,
        AssetCategory::Software,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AssetCategory::Buildings => "Buildings",
            AssetCategory::Machinery => "Machinery",
            AssetCategory::OfficeEquipment => "Office Equipment",
            AssetCategory::Computers => "Computers",
            AssetCategory::Vehicles => "Vehicles",
            AssetCategory::Furniture => "Furniture",
            AssetCategory::Software => "Software",
        }
    }

    /// SARS wear-and-tear write-off period, in years.
    pub fn default_life(&self) -> u32 {
        match self {
            AssetCategory::Buildings => 20,
            AssetCategory::Machinery => 5,
            AssetCategory::OfficeEquipment => 3,
            AssetCategory::Computers => 3,
            AssetCategory::Vehicles => 5,
            AssetCategory::Furniture => 6,
            AssetCategory::Software => 2,
        }
    }
}

/// One row of `businesses/{uid}/assets`. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub category: AssetCategory,
    pub description: String,
    pub purchase_date: NaiveDate,
    pub purchase_cost: f64,
    pub expected_life: u32,
    pub document_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Asset {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("purchase cost", self.purchase_cost)?;
        if self.expected_life == 0 {
            return Err(ValidationError::ZeroExpectedLife);
        }
        Ok(())
    }
}

//=========================================================================================
// Document Desk
//=========================================================================================

/// The profile stored at `users/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub email: String,
    pub organization: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A file as it arrived in an upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Metadata and extracted text persisted for every ingested file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub file_url: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub text_content: String,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Text pasted straight into the desk instead of uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PastedText {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// A document held in a session workspace after ingestion.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub filename: String,
    pub file_url: Option<String>,
    pub chunks: Vec<String>,
    pub thumbnail: Option<Vec<u8>>,
}
