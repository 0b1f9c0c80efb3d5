//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use bizdesk_core::domain::SessionContext;
use tracing::warn;

use crate::web::auth::session_cookie;
use crate::web::state::AuthState;

/// Middleware that validates the auth session cookie.
///
/// If valid, inserts a `SessionContext` into request extensions for handlers
/// to use. If invalid, expired or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_cookie(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    // 2. Validate auth session in database
    let session = auth
        .identity
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(SessionContext::from(session));

    Ok(next.run(req).await)
}
