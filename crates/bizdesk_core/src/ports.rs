//! crates/bizdesk_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the record store, object storage, identity provider and
//! language models it talks to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AuthSession, UploadedFile, User, UserCredentials, ValidationError};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network)
/// while keeping the distinctions callers act on: retryable rate limits versus fatal failures.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ValidationError> for PortError {
    fn from(err: ValidationError) -> Self {
        PortError::InvalidInput(err.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The field map of a single document in the record store.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A document read back from a collection, with its store-assigned id.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Fields,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A path-addressed document database.
///
/// Paths alternate collection and document segments, e.g.
/// `businesses/{uid}` is a document and `businesses/{uid}/expenses` a collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads one document; `None` when nothing is stored at `path`.
    async fn document_get(&self, path: &str) -> PortResult<Option<Fields>>;

    /// Writes one document. With `merge` the given fields are laid over the
    /// stored ones, otherwise the document is replaced.
    async fn document_set(&self, path: &str, fields: Fields, merge: bool) -> PortResult<()>;

    /// Appends a document with a generated id and returns that id.
    async fn collection_add(&self, path: &str, fields: Fields) -> PortResult<String>;

    /// Returns every document of a collection in insertion order.
    async fn collection_stream(&self, path: &str) -> PortResult<Vec<StoredDocument>>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the session if it exists and has not expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `path` and returns a publicly readable URL.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> PortResult<String>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Runs a fully rendered prompt against the hosted model.
    /// Fails with `PortError::RateLimited` when the provider throttles the call.
    async fn invoke(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait FallbackModel: Send + Sync {
    /// Generates at most `max_length` tokens from a small local model.
    async fn generate(&self, text: &str, max_length: usize) -> PortResult<String>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file: &UploadedFile) -> PortResult<String>;
}

#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// Produces PNG bytes for a preview of the file.
    async fn generate(&self, file: &UploadedFile) -> PortResult<Vec<u8>>;
}
