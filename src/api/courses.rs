use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, CourseDto, PendingRequestDto};
use crate::db::NewCourse;
use crate::domain::Role;

#[derive(Deserialize)]
pub struct CreateCourseRequest {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub max_students: i32,
    #[serde(default)]
    pub description: Option<String>,
}

/// GET /api/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CourseDto>>>, ApiError> {
    let courses = state.course_service.list_catalog().await?;
    Ok(Json(ApiResponse::success(
        courses.into_iter().map(CourseDto::from).collect(),
    )))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<Json<ApiResponse<CourseDto>>, ApiError> {
    let course = state
        .course_service
        .create(
            NewCourse {
                code: payload.code,
                name: payload.name,
                credits: payload.credits,
                max_students: payload.max_students,
                description: payload.description,
            },
            &user,
        )
        .await?;

    tracing::info!(course_id = course.id, code = %course.code, "Course created");
    Ok(Json(ApiResponse::success(CourseDto::from(course))))
}

/// GET /api/courses/{id}
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<CourseDto>>, ApiError> {
    let course = state.course_service.get(id).await?;
    Ok(Json(ApiResponse::success(CourseDto::from(course))))
}

/// GET /api/courses/available
///
/// The catalog minus courses the student already has an active (pending or
/// approved) enrollment for. Student scope.
pub async fn list_available_courses(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CourseDto>>>, ApiError> {
    if user.role != Role::Student {
        return Err(ApiError::Forbidden(
            "Only students can browse available courses".to_string(),
        ));
    }

    let courses = state.course_service.list_available(user.id).await?;
    Ok(Json(ApiResponse::success(
        courses.into_iter().map(CourseDto::from).collect(),
    )))
}

/// GET /api/courses/mine
pub async fn list_owned_courses(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CourseDto>>>, ApiError> {
    if user.role != Role::Instructor {
        return Err(ApiError::Forbidden(
            "Only instructors have owned courses".to_string(),
        ));
    }

    let courses = state.course_service.list_owned(user.id).await?;
    Ok(Json(ApiResponse::success(
        courses.into_iter().map(CourseDto::from).collect(),
    )))
}

/// GET /api/courses/{id}/pending
pub async fn list_pending_for_course(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<PendingRequestDto>>>, ApiError> {
    let requests = state
        .enrollment_service
        .pending_for_course(id, &user)
        .await?;

    Ok(Json(ApiResponse::success(
        requests.into_iter().map(PendingRequestDto::from).collect(),
    )))
}
