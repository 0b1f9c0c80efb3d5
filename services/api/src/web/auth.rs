//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, and logout on both desks.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use bizdesk_core::domain::{BusinessType, User, UserProfile};
use bizdesk_core::ports::PortError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::web::rest::port_failure;
use crate::web::state::{AuthState, DocsState, TaxState};

pub const ACCOUNT_CREATED_MESSAGE: &str = "Account created! Please login.";
pub const MIN_PASSWORD_LENGTH: usize = 6;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct TaxSignupRequest {
    pub email: String,
    pub password: String,
    pub business_name: String,
    /// One of the four business type labels, e.g. "Small Business Corporation".
    #[schema(value_type = String)]
    pub business_type: BusinessType,
}

#[derive(Deserialize, ToSchema)]
pub struct DocsSignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub organization: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Reads the `session` cookie, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

fn check_credentials(email: &str, password: &str) -> Result<(), (StatusCode, String)> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "A valid email is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

/// Hashes the password and creates the identity. Profiles are written by the
/// desk-specific signup handlers.
async fn create_account(
    auth: &AuthState,
    email: &str,
    password: &str,
) -> Result<User, (StatusCode, String)> {
    check_credentials(email, password)?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    auth.identity
        .create_user(email.trim(), &password_hash)
        .await
        .map_err(|e| port_failure("Failed to create user", e))
}

fn created(user: User) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.user_id,
            email: user.email,
            message: ACCOUNT_CREATED_MESSAGE.to_string(),
        }),
    )
}

//=========================================================================================
// Signup (Per Desk)
//=========================================================================================

/// POST /auth/signup - Create a business account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = TaxSignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn tax_signup_handler(
    State(state): State<Arc<TaxState>>,
    Json(req): Json<TaxSignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.business_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Business name is required".to_string()));
    }
    let user = create_account(&state.auth, &req.email, &req.password).await?;

    state
        .records
        .create_profile(user.user_id, req.business_name.trim(), req.business_type)
        .await
        .map_err(|e| port_failure("Failed to create business profile", e))?;

    info!(user_id = %user.user_id, "Business account created");
    Ok(created(user))
}

/// POST /auth/signup - Create a document desk account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = DocsSignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn docs_signup_handler(
    State(state): State<Arc<DocsState>>,
    Json(req): Json<DocsSignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = create_account(&state.auth, &req.email, &req.password).await?;

    let profile = UserProfile {
        email: user.email.clone(),
        organization: req.organization.trim().to_string(),
        created_at: Some(Utc::now()),
    };
    state
        .records
        .create_profile(user.user_id, &profile)
        .await
        .map_err(|e| port_failure("Failed to create user profile", e))?;

    info!(user_id = %user.user_id, "Document desk account created");
    Ok(created(user))
}

//=========================================================================================
// Login / Logout (Shared)
//=========================================================================================

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(auth): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get user by email
    let user_creds = auth
        .identity
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()));
    }

    // 3. Create auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + auth.session_ttl;

    auth.identity
        .create_auth_session(&auth_session_id, user_creds.user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    // 4. Session cookie
    let cookie = format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        auth.session_ttl.num_seconds()
    );

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(auth): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    match auth.identity.delete_auth_session(auth_session_id).await {
        Ok(()) | Err(PortError::NotFound(_)) => {}
        Err(e) => {
            error!("Failed to delete auth session: {:?}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string()));
        }
    }

    if let Some(workspaces) = &auth.workspaces {
        workspaces.remove(auth_session_id).await;
        let active_workspaces = workspaces.len().await;
        info!(active_workspaces, "Session workspace dropped");
    }

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_cookie(&headers), Some("abc-123"));
    }

    #[test]
    fn test_missing_cookie_header() {
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_credentials_are_checked_before_hashing() {
        assert!(check_credentials("owner@acme.co.za", "secret1").is_ok());
        assert_eq!(
            check_credentials("not-an-email", "secret1").unwrap_err().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            check_credentials("owner@acme.co.za", "short").unwrap_err().0,
            StatusCode::BAD_REQUEST
        );
    }
}
