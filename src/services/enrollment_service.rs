//! Domain service for the enrollment lifecycle.
//!
//! A single enrollment moves `pending -> approved` or `pending -> rejected`,
//! never out of a terminal state. Both transitions and the initial request
//! enforce the per-student credit cap through the credit ledger.

use thiserror::Error;

use crate::constants::credits::MAX_CREDIT_LIMIT;
use crate::db::{Course, Enrollment, User};
use crate::domain::EnrollmentStatus;

/// Errors specific to enrollment operations.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Adding this course would exceed the credit limit of {MAX_CREDIT_LIMIT}")]
    CreditLimitExceeded,

    #[error("An active enrollment for this course already exists")]
    DuplicateEnrollment,

    #[error("Enrollment {0} not found")]
    NotFound(i32),

    #[error("Course {0} not found")]
    CourseNotFound(i32),

    #[error("Enrollment is already {0}")]
    InvalidState(EnrollmentStatus),

    #[error("Not allowed to act on this enrollment")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for EnrollmentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for EnrollmentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Read-side projection of a pending request, enriched for the approval
/// queues: the joined student and course plus the student's current
/// committed credit total. Not a stored entity.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub enrollment: Enrollment,
    pub student: User,
    pub course: Course,
    pub committed_credits: i32,
}

/// Domain service trait governing enrollment state transitions and the
/// approval-queue projections.
#[async_trait::async_trait]
pub trait EnrollmentService: Send + Sync {
    /// Creates a pending enrollment for the student.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::CourseNotFound`] if the course does not exist
    /// - [`EnrollmentError::DuplicateEnrollment`] if an active row already
    ///   exists for the (student, course) pair
    /// - [`EnrollmentError::CreditLimitExceeded`] if the request would push
    ///   the student past the cap; no row is created
    async fn request(&self, student_id: i32, course_id: i32)
    -> Result<Enrollment, EnrollmentError>;

    /// Transitions a pending enrollment to approved and increments the
    /// course's enrollment counter, atomically.
    ///
    /// The credit cap is re-checked against the ledger as it stands now, not
    /// as it stood at request time: other approvals may have landed since.
    /// On [`EnrollmentError::CreditLimitExceeded`] the row stays pending.
    async fn approve(&self, enrollment_id: i32, actor: &User)
    -> Result<Enrollment, EnrollmentError>;

    /// Transitions a pending enrollment to rejected. No counter side
    /// effects.
    async fn reject(&self, enrollment_id: i32, actor: &User)
    -> Result<Enrollment, EnrollmentError>;

    /// Pending requests for one course, instructor scope. Instructors may
    /// only see courses they own; faculty advisors are exempt.
    async fn pending_for_course(
        &self,
        course_id: i32,
        actor: &User,
    ) -> Result<Vec<PendingRequest>, EnrollmentError>;

    /// All pending requests system-wide, faculty-advisor scope.
    async fn pending_all(&self, actor: &User) -> Result<Vec<PendingRequest>, EnrollmentError>;

    /// A student's own enrollments, optionally filtered by status.
    async fn for_student(
        &self,
        student_id: i32,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentError>;
}
