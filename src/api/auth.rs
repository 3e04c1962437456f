use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::constants::{otp, session as session_keys};
use crate::db::User;
use crate::domain::Role;
use crate::services::VerifyOutcome;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct SendCodeResponse {
    pub email: String,
    pub expires_in: i64,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Either a logged-in user or a signal that signup must happen first.
#[derive(Serialize)]
pub struct VerifyCodeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
    pub registration_required: bool,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// The authenticated user, loaded once per request and handed to handlers
/// through request extensions.
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Session-based authentication. Rejects with 401 when no session exists or
/// the session's user has been deleted.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = match session.get::<i32>(session_keys::USER_ID_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            let response = (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error("Not authenticated")),
            );
            return Ok(response.into_response());
        }
        Err(e) => return Err(ApiError::internal(format!("Session error: {e}"))),
    };

    let Ok(user) = state.auth_service.get_user(user_id).await else {
        // Stale session pointing at a removed account.
        let _ = session.flush().await;
        let response = (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error("Not authenticated")),
        );
        return Ok(response.into_response());
    };

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/otp/send
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendCodeRequest>,
) -> Result<Json<ApiResponse<SendCodeResponse>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    state.auth_service.send_code(&email).await?;

    Ok(Json(ApiResponse::success(SendCodeResponse {
        email,
        expires_in: otp::EXPIRY_SECONDS,
    })))
}

/// POST /api/auth/otp/verify
///
/// On success for a known email the session is established. For an unknown
/// email the code is still consumed and the client is told to register.
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<VerifyCodeResponse>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let outcome = state.auth_service.verify_code(&email, &payload.code).await?;

    match outcome {
        VerifyOutcome::User(user) => {
            establish_session(&session, user.id).await?;
            tracing::info!(user_id = user.id, "User logged in");
            Ok(Json(ApiResponse::success(VerifyCodeResponse {
                user: Some(UserDto::from(user)),
                registration_required: false,
            })))
        }
        VerifyOutcome::RegistrationRequired => Ok(Json(ApiResponse::success(VerifyCodeResponse {
            user: None,
            registration_required: true,
        }))),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .auth_service
        .register(&payload.email, &payload.name, &payload.phone, payload.role)
        .await?;

    establish_session(&session, user.id).await?;
    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to clear session: {e}")))?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    })))
}

/// GET /api/auth/me
pub async fn get_current_user(
    axum::Extension(CurrentUser(user)): axum::Extension<CurrentUser>,
) -> Json<ApiResponse<UserDto>> {
    Json(ApiResponse::success(UserDto::from(user)))
}

// ============================================================================
// Helpers
// ============================================================================

async fn establish_session(session: &Session, user_id: i32) -> Result<(), ApiError> {
    session
        .insert(session_keys::USER_ID_KEY, user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))
}
