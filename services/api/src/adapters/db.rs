//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` and `IdentityService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bizdesk_core::domain::{AuthSession, User, UserCredentials};
use bizdesk_core::ports::{
    Fields, IdentityService, PortError, PortResult, RecordStore, StoredDocument,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` and `IdentityService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Splits `a/b/c/d` into the parent collection `a/b/c` and the id `d`.
fn split_path(path: &str) -> PortResult<(&str, &str)> {
    match path.trim_matches('/').rsplit_once('/') {
        Some((parent, id)) if !parent.is_empty() && !id.is_empty() => Ok((parent, id)),
        _ => Err(PortError::InvalidInput(format!(
            "'{path}' is not a document path"
        ))),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRow {
    doc_id: String,
    fields: Json<Fields>,
}
impl DocumentRow {
    fn to_domain(self) -> StoredDocument {
        StoredDocument {
            id: self.doc_id,
            fields: self.fields.0,
        }
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for DbAdapter {
    async fn document_get(&self, path: &str) -> PortResult<Option<Fields>> {
        let row: Option<(Json<Fields>,)> =
            sqlx::query_as("SELECT fields FROM records WHERE path = $1")
                .bind(path)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(row.map(|(fields,)| fields.0))
    }

    async fn document_set(&self, path: &str, fields: Fields, merge: bool) -> PortResult<()> {
        let (parent, doc_id) = split_path(path)?;
        sqlx::query(
            "INSERT INTO records (path, parent, doc_id, fields) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (path) DO UPDATE SET \
                fields = CASE WHEN $5 THEN records.fields || EXCLUDED.fields ELSE EXCLUDED.fields END, \
                updated_at = now()",
        )
        .bind(path)
        .bind(parent)
        .bind(doc_id)
        .bind(Json(fields))
        .bind(merge)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn collection_add(&self, path: &str, fields: Fields) -> PortResult<String> {
        let parent = path.trim_matches('/');
        let doc_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO records (path, parent, doc_id, fields) VALUES ($1, $2, $3, $4)")
            .bind(format!("{parent}/{doc_id}"))
            .bind(parent)
            .bind(&doc_id)
            .bind(Json(fields))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(doc_id)
    }

    async fn collection_stream(&self, path: &str) -> PortResult<Vec<StoredDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT doc_id, fields FROM records WHERE parent = $1 ORDER BY seq ASC",
        )
        .bind(path.trim_matches('/'))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return PortError::InvalidInput(
                        "An account with this email already exists".to_string(),
                    );
                }
            }
            unexpected(e)
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(AuthSessionRecord::to_domain)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
