use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, CreditsDto, EnrollmentDto, PendingRequestDto};
use crate::constants::credits;
use crate::domain::{EnrollmentStatus, Role};

#[derive(Deserialize)]
pub struct RequestEnrollmentBody {
    pub course_id: i32,
}

#[derive(Deserialize)]
pub struct EnrollmentFilter {
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
}

/// POST /api/enrollments
pub async fn request_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<RequestEnrollmentBody>,
) -> Result<Json<ApiResponse<EnrollmentDto>>, ApiError> {
    if user.role != Role::Student {
        return Err(ApiError::Forbidden(
            "Only students can request enrollment".to_string(),
        ));
    }

    let enrollment = state
        .enrollment_service
        .request(user.id, payload.course_id)
        .await?;

    tracing::info!(
        enrollment_id = enrollment.id,
        course_id = enrollment.course_id,
        "Enrollment requested"
    );
    Ok(Json(ApiResponse::success(EnrollmentDto::from(enrollment))))
}

/// POST /api/enrollments/{id}/approve
pub async fn approve_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EnrollmentDto>>, ApiError> {
    let enrollment = state.enrollment_service.approve(id, &user).await?;

    tracing::info!(enrollment_id = id, approver = user.id, "Enrollment approved");
    Ok(Json(ApiResponse::success(EnrollmentDto::from(enrollment))))
}

/// POST /api/enrollments/{id}/reject
pub async fn reject_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EnrollmentDto>>, ApiError> {
    let enrollment = state.enrollment_service.reject(id, &user).await?;

    tracing::info!(enrollment_id = id, approver = user.id, "Enrollment rejected");
    Ok(Json(ApiResponse::success(EnrollmentDto::from(enrollment))))
}

/// GET /api/enrollments/pending
pub async fn list_pending_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<PendingRequestDto>>>, ApiError> {
    let requests = state.enrollment_service.pending_all(&user).await?;

    Ok(Json(ApiResponse::success(
        requests.into_iter().map(PendingRequestDto::from).collect(),
    )))
}

/// GET /api/enrollments/mine
pub async fn list_my_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(filter): Query<EnrollmentFilter>,
) -> Result<Json<ApiResponse<Vec<EnrollmentDto>>>, ApiError> {
    if user.role != Role::Student {
        return Err(ApiError::Forbidden(
            "Only students have enrollments".to_string(),
        ));
    }

    let enrollments = state
        .enrollment_service
        .for_student(user.id, filter.status)
        .await?;

    Ok(Json(ApiResponse::success(
        enrollments.into_iter().map(EnrollmentDto::from).collect(),
    )))
}

/// GET /api/students/me/credits
pub async fn get_my_credits(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<CreditsDto>>, ApiError> {
    if user.role != Role::Student {
        return Err(ApiError::Forbidden(
            "Only students have a credit total".to_string(),
        ));
    }

    let committed = state.ledger.committed_credits(user.id).await?;

    Ok(Json(ApiResponse::success(CreditsDto {
        student_id: user.id,
        committed_credits: committed,
        credit_limit: credits::MAX_CREDIT_LIMIT,
    })))
}
