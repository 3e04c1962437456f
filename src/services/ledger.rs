//! Credit Ledger: the single policy for computing a student's committed
//! credit total. Every call site (student request, instructor approval,
//! faculty approval) goes through this module so the cap check cannot drift.

use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::db::Store;
use crate::domain::EnrollmentStatus;
use crate::entities::{courses, enrollments};

/// Sum of `courses.credits` over the student's approved enrollments.
///
/// Generic over the connection so the approval path can run it inside the
/// same transaction that performs the transition.
pub async fn committed_credits_on<C: ConnectionTrait>(conn: &C, student_id: i32) -> Result<i32> {
    let approved = enrollments::Entity::find()
        .filter(enrollments::Column::StudentId.eq(student_id))
        .filter(enrollments::Column::Status.eq(EnrollmentStatus::Approved.as_str()))
        .all(conn)
        .await
        .context("Failed to load approved enrollments")?;

    if approved.is_empty() {
        return Ok(0);
    }

    let course_ids: Vec<i32> = approved.iter().map(|e| e.course_id).collect();

    let courses = courses::Entity::find()
        .filter(courses::Column::Id.is_in(course_ids))
        .all(conn)
        .await
        .context("Failed to load courses for credit total")?;

    Ok(courses.iter().map(|c| c.credits).sum())
}

/// Read-side handle over the shared store.
#[derive(Clone)]
pub struct CreditLedger {
    store: Store,
}

impl CreditLedger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns 0 for a student with no approved enrollments; never negative;
    /// deterministic given the same store state.
    pub async fn committed_credits(&self, student_id: i32) -> Result<i32> {
        committed_credits_on(&self.store.conn, student_id).await
    }
}
