use serde::Serialize;

use crate::db::{Course, Enrollment, User};
use crate::domain::{EnrollmentStatus, Role};
use crate::services::PendingRequest;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct CourseDto {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub max_students: i32,
    pub current_enrollment: i32,
    pub instructor_id: i32,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<Course> for CourseDto {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            name: course.name,
            credits: course.credits,
            max_students: course.max_students,
            current_enrollment: course.current_enrollment,
            instructor_id: course.instructor_id,
            description: course.description,
            created_at: course.created_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct EnrollmentDto {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub status: EnrollmentStatus,
    pub requested_at: String,
    pub approved_at: Option<String>,
    pub rejected_at: Option<String>,
}

impl From<Enrollment> for EnrollmentDto {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            id: enrollment.id,
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
            status: enrollment.status,
            requested_at: enrollment.requested_at,
            approved_at: enrollment.approved_at,
            rejected_at: enrollment.rejected_at,
        }
    }
}

/// A pending request enriched for the approval queues.
#[derive(Debug, Serialize)]
pub struct PendingRequestDto {
    pub enrollment: EnrollmentDto,
    pub student: UserDto,
    pub course: CourseDto,
    pub committed_credits: i32,
}

impl From<PendingRequest> for PendingRequestDto {
    fn from(request: PendingRequest) -> Self {
        Self {
            enrollment: EnrollmentDto::from(request.enrollment),
            student: UserDto::from(request.student),
            course: CourseDto::from(request.course),
            committed_credits: request.committed_credits,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreditsDto {
    pub student_id: i32,
    pub committed_credits: i32,
    pub credit_limit: i32,
}
