//! Domain service for course creation and catalog queries.

use thiserror::Error;

use crate::db::{Course, NewCourse, User};

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("Course {0} not found")]
    NotFound(i32),

    #[error("Only instructors can create courses")]
    Unauthorized,

    #[error("Invalid course data: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CourseError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CourseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for course operations.
#[async_trait::async_trait]
pub trait CourseService: Send + Sync {
    /// Creates a course owned by the acting instructor.
    ///
    /// # Errors
    ///
    /// - [`CourseError::Unauthorized`] if the actor is not an instructor
    /// - [`CourseError::Validation`] on missing fields or credits outside
    ///   the allowed range
    async fn create(&self, course: NewCourse, actor: &User) -> Result<Course, CourseError>;

    async fn get(&self, id: i32) -> Result<Course, CourseError>;

    /// The full catalog, insertion order.
    async fn list_catalog(&self) -> Result<Vec<Course>, CourseError>;

    /// Catalog minus courses the student already has an active enrollment
    /// for. Rejected rows do not hide a course; the student may retry.
    async fn list_available(&self, student_id: i32) -> Result<Vec<Course>, CourseError>;

    /// Courses owned by the acting instructor.
    async fn list_owned(&self, instructor_id: i32) -> Result<Vec<Course>, CourseError>;
}
