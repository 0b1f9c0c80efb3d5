pub mod chunking;
pub mod depreciation;
pub mod domain;
pub mod history;
pub mod ingestion;
pub mod orchestrator;
pub mod ports;
pub mod records;
pub mod retry;
pub mod summary;
pub mod tax;

pub use domain::{
    Asset, AssetCategory, AuthSession, BusinessProfile, BusinessType, Expense, ExpenseCategory,
    SessionContext, UploadedFile, User, UserCredentials, UserProfile, ValidationError,
};
pub use ports::{
    FallbackModel, IdentityService, LanguageModel, ObjectStorage, PortError, PortResult,
    RecordStore, TextExtractor, ThumbnailGenerator,
};
