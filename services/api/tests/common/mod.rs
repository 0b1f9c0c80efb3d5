//! In-memory port fakes and request helpers shared by the HTTP tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use api_lib::web::state::{AuthState, DocsState, TaxState, WorkspaceRegistry};
use api_lib::web::{docs_router, tax_router};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bizdesk_core::chunking::{ChunkerConfig, RecursiveChunker};
use bizdesk_core::domain::{AuthSession, UploadedFile, User, UserCredentials};
use bizdesk_core::ingestion::IngestionPipeline;
use bizdesk_core::orchestrator::{DocumentOrchestrator, COMBINE_ANSWERS_PROMPT, FINAL_SUMMARY_PROMPT};
use bizdesk_core::ports::{
    FallbackModel, Fields, IdentityService, LanguageModel, ObjectStorage, PortError, PortResult,
    RecordStore, StoredDocument, TextExtractor, ThumbnailGenerator,
};
use bizdesk_core::records::{BusinessRecords, UserRecords};
use bizdesk_core::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse";

//=========================================================================================
// Fakes
//=========================================================================================

#[derive(Default)]
pub struct MemoryIdentity {
    users: Mutex<HashMap<String, UserCredentials>>,
    sessions: Mutex<HashMap<String, AuthSession>>,
}

impl MemoryIdentity {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(PortError::InvalidInput(
                "An account with this email already exists".to_string(),
            ));
        }
        let user_id = Uuid::new_v4();
        users.insert(
            email.to_string(),
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(User {
            user_id,
            email: email.to_string(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .cloned()
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecords {
    documents: Mutex<BTreeMap<String, Fields>>,
    collections: Mutex<BTreeMap<String, Vec<StoredDocument>>>,
}

impl MemoryRecords {
    /// Rows across every collection named `name`, whoever owns them.
    pub fn total_rows(&self, name: &str) -> usize {
        let suffix = format!("/{}", name);
        self.collections
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.ends_with(&suffix))
            .map(|(_, rows)| rows.len())
            .sum()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn document_get(&self, path: &str) -> PortResult<Option<Fields>> {
        Ok(self.documents.lock().unwrap().get(path).cloned())
    }

    async fn document_set(&self, path: &str, fields: Fields, merge: bool) -> PortResult<()> {
        let mut documents = self.documents.lock().unwrap();
        match documents.get_mut(path) {
            Some(existing) if merge => existing.extend(fields),
            _ => {
                documents.insert(path.to_string(), fields);
            }
        }
        Ok(())
    }

    async fn collection_add(&self, path: &str, fields: Fields) -> PortResult<String> {
        let mut collections = self.collections.lock().unwrap();
        let rows = collections.entry(path.to_string()).or_default();
        let id = format!("row-{}", rows.len() + 1);
        rows.push(StoredDocument {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn collection_stream(&self, path: &str) -> PortResult<Vec<StoredDocument>> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingStorage {
    pub paths: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(&self, path: &str, _bytes: &[u8], _content_type: &str) -> PortResult<String> {
        self.paths.lock().unwrap().push(path.to_string());
        Ok(format!("https://storage.test/{}", path))
    }
}

/// Replies by prompt kind so tests can tell the combine step ran last.
pub struct ScriptedModel;

pub const FINAL_SUMMARY: &str = "Overall summary";
pub const COMBINED_ANSWER: &str = "Combined answer";

fn template_prefix(template: &str) -> &str {
    template.split('{').next().unwrap_or(template)
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str) -> PortResult<String> {
        if prompt.starts_with(template_prefix(FINAL_SUMMARY_PROMPT)) {
            Ok(FINAL_SUMMARY.to_string())
        } else if prompt.starts_with(template_prefix(COMBINE_ANSWERS_PROMPT)) {
            Ok(COMBINED_ANSWER.to_string())
        } else {
            Ok("partial".to_string())
        }
    }
}

pub struct UnusedFallback;

#[async_trait]
impl FallbackModel for UnusedFallback {
    async fn generate(&self, _text: &str, _max_length: usize) -> PortResult<String> {
        Err(PortError::Unexpected("fallback should not run".to_string()))
    }
}

/// Reads files as UTF-8; `application/x-broken` files fail extraction.
pub struct PlainExtractor;

#[async_trait]
impl TextExtractor for PlainExtractor {
    async fn extract(&self, file: &UploadedFile) -> PortResult<String> {
        if file.mime_type == "application/x-broken" {
            return Err(PortError::InvalidInput(format!(
                "Cannot read {}",
                file.filename
            )));
        }
        Ok(String::from_utf8_lossy(&file.bytes).into_owned())
    }
}

pub struct FixedThumbnail;

#[async_trait]
impl ThumbnailGenerator for FixedThumbnail {
    async fn generate(&self, _file: &UploadedFile) -> PortResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

//=========================================================================================
// Apps
//=========================================================================================

pub struct TaxHarness {
    pub app: Router,
    pub identity: Arc<MemoryIdentity>,
    pub store: Arc<MemoryRecords>,
    pub storage: Arc<RecordingStorage>,
}

pub fn tax_app() -> TaxHarness {
    let identity = Arc::new(MemoryIdentity::default());
    let store = Arc::new(MemoryRecords::default());
    let storage = Arc::new(RecordingStorage::default());
    let state = Arc::new(TaxState {
        auth: AuthState {
            identity: identity.clone(),
            session_ttl: chrono::Duration::days(30),
            workspaces: None,
        },
        records: BusinessRecords::new(store.clone()),
        storage: storage.clone(),
    });
    TaxHarness {
        app: tax_router(state),
        identity,
        store,
        storage,
    }
}

pub struct DocsHarness {
    pub app: Router,
    pub identity: Arc<MemoryIdentity>,
    pub store: Arc<MemoryRecords>,
    pub workspaces: Arc<WorkspaceRegistry>,
}

pub fn docs_app() -> DocsHarness {
    let identity = Arc::new(MemoryIdentity::default());
    let store = Arc::new(MemoryRecords::default());
    let records = UserRecords::new(store.clone());
    let workspaces = Arc::new(WorkspaceRegistry::new());
    let ingestion = IngestionPipeline::new(
        Arc::new(PlainExtractor),
        Arc::new(FixedThumbnail),
        Arc::new(RecordingStorage::default()),
        records.clone(),
        RecursiveChunker::new(ChunkerConfig {
            chunk_size: 40,
            chunk_overlap: 0,
        }),
    );
    let orchestrator = DocumentOrchestrator::new(
        Arc::new(ScriptedModel),
        Arc::new(UnusedFallback),
        RetryPolicy::new(1, 50),
    )
    .with_concurrency(2);
    let state = Arc::new(DocsState {
        auth: AuthState {
            identity: identity.clone(),
            session_ttl: chrono::Duration::days(30),
            workspaces: Some(workspaces.clone()),
        },
        records,
        ingestion,
        orchestrator,
        workspaces: workspaces.clone(),
    });
    DocsHarness {
        app: docs_router(state),
        identity,
        store,
        workspaces,
    }
}

//=========================================================================================
// Requests
//=========================================================================================

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    pub fn header(&self, name: header::HeaderName) -> String {
        self.headers
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body: body.to_vec(),
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_empty(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// A part of a multipart body: (field name, optional filename, content type, bytes).
pub type Part<'a> = (&'a str, Option<&'a str>, &'a str, &'a [u8]);

pub fn multipart_request(uri: &str, cookie: &str, parts: &[Part<'_>]) -> Request<Body> {
    let boundary = "bizdesk-test-boundary";
    let mut body = Vec::new();
    for (name, filename, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        let disposition = match filename {
            Some(f) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, f
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Logs in and returns the `session=...` pair to send back as a cookie.
pub async fn login(app: &Router, email: &str) -> String {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/auth/login",
            None,
            serde_json::json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    response
        .header(header::SET_COOKIE)
        .split(';')
        .next()
        .unwrap()
        .to_string()
}
