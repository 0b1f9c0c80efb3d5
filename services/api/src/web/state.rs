//! services/api/src/web/state.rs
//!
//! Defines the application's shared state for both desks and the per-session
//! workspaces of the document desk.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRef;
use bizdesk_core::domain::SessionContext;
use bizdesk_core::history::ConversationHistory;
use bizdesk_core::ingestion::IngestionPipeline;
use bizdesk_core::orchestrator::DocumentOrchestrator;
use bizdesk_core::ports::{IdentityService, ObjectStorage};
use bizdesk_core::records::{BusinessRecords, UserRecords};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

//=========================================================================================
// AuthState (Shared by Both Desks)
//=========================================================================================

/// Everything the auth handlers and the `require_auth` middleware need.
#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityService>,
    pub session_ttl: chrono::Duration,
    /// Set on the document desk so logging out drops the session's workspace.
    pub workspaces: Option<Arc<WorkspaceRegistry>>,
}

//=========================================================================================
// Desk States (Created Once at Startup)
//=========================================================================================

pub struct TaxState {
    pub auth: AuthState,
    pub records: BusinessRecords,
    pub storage: Arc<dyn ObjectStorage>,
}

pub struct DocsState {
    pub auth: AuthState,
    pub records: UserRecords,
    pub ingestion: IngestionPipeline,
    pub orchestrator: DocumentOrchestrator,
    pub workspaces: Arc<WorkspaceRegistry>,
}

impl FromRef<Arc<TaxState>> for AuthState {
    fn from_ref(state: &Arc<TaxState>) -> Self {
        state.auth.clone()
    }
}

impl FromRef<Arc<DocsState>> for AuthState {
    fn from_ref(state: &Arc<DocsState>) -> Self {
        state.auth.clone()
    }
}

//=========================================================================================
// Session Workspaces (Document Desk)
//=========================================================================================

/// What one logged-in session is currently working on.
pub struct SessionWorkspace {
    /// Chunks of every current document, in upload order.
    pub combined_chunks: Vec<String>,
    pub history: ConversationHistory,
    expires_at: DateTime<Utc>,
}

impl SessionWorkspace {
    fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            combined_chunks: Vec::new(),
            history: ConversationHistory::new(),
            expires_at,
        }
    }

    /// A new upload replaces the working set; history is kept.
    pub fn replace_chunks(&mut self, chunks: Vec<String>) {
        self.combined_chunks = chunks;
    }
}

/// Workspaces keyed by auth session id. Created on first use, dropped at
/// logout, and purged once their auth session has expired.
#[derive(Default)]
pub struct WorkspaceRegistry {
    workspaces: Mutex<HashMap<String, SessionWorkspace>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the caller's workspace. The lock is held only for the
    /// duration of `f`, so never call out to a model from inside it.
    pub async fn with<R>(
        &self,
        session: &SessionContext,
        f: impl FnOnce(&mut SessionWorkspace) -> R,
    ) -> R {
        let mut workspaces = self.workspaces.lock().await;
        let now = Utc::now();
        workspaces.retain(|id, workspace| {
            let live = workspace.expires_at > now;
            if !live {
                debug!(session_id = %id, "Purging expired workspace");
            }
            live
        });
        let workspace = workspaces
            .entry(session.session_id.clone())
            .or_insert_with(|| SessionWorkspace::new(session.expires_at));
        f(workspace)
    }

    pub async fn remove(&self, session_id: &str) {
        self.workspaces.lock().await.remove(session_id);
    }

    pub async fn len(&self) -> usize {
        self.workspaces.lock().await.len()
    }
}
