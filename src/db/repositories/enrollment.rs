use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::EnrollmentStatus;
use crate::entities::enrollments;

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub status: EnrollmentStatus,
    pub requested_at: String,
    pub approved_at: Option<String>,
    pub rejected_at: Option<String>,
}

pub(crate) fn map_enrollment(model: enrollments::Model) -> Result<Enrollment> {
    let status = model
        .status
        .parse::<EnrollmentStatus>()
        .map_err(anyhow::Error::msg)
        .context("Corrupt enrollment status column")?;

    Ok(Enrollment {
        id: model.id,
        student_id: model.student_id,
        course_id: model.course_id,
        status,
        requested_at: model.requested_at,
        approved_at: model.approved_at,
        rejected_at: model.rejected_at,
    })
}

pub struct EnrollmentRepository {
    conn: DatabaseConnection,
}

impl EnrollmentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a pending row. The duplicate guard and the credit-cap check
    /// run in the enrollment service before this is called.
    pub async fn insert_pending(&self, student_id: i32, course_id: i32) -> Result<Enrollment> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = enrollments::ActiveModel {
            student_id: Set(student_id),
            course_id: Set(course_id),
            status: Set(EnrollmentStatus::Pending.as_str().to_string()),
            requested_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert enrollment")?;

        map_enrollment(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Enrollment>> {
        let row = enrollments::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query enrollment by ID")?;

        row.map(map_enrollment).transpose()
    }

    /// True when the pair already has a pending or approved row.
    pub async fn active_exists(&self, student_id: i32, course_id: i32) -> Result<bool> {
        let row = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .filter(enrollments::Column::CourseId.eq(course_id))
            .filter(
                enrollments::Column::Status.is_in([
                    EnrollmentStatus::Pending.as_str(),
                    EnrollmentStatus::Approved.as_str(),
                ]),
            )
            .one(&self.conn)
            .await
            .context("Failed to query active enrollment")?;

        Ok(row.is_some())
    }

    pub async fn list_by_student(
        &self,
        student_id: i32,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>> {
        let mut query = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .order_by_asc(enrollments::Column::Id);

        if let Some(status) = status {
            query = query.filter(enrollments::Column::Status.eq(status.as_str()));
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list student enrollments")?;

        rows.into_iter().map(map_enrollment).collect()
    }

    pub async fn list_pending_for_course(&self, course_id: i32) -> Result<Vec<Enrollment>> {
        let rows = enrollments::Entity::find()
            .filter(enrollments::Column::CourseId.eq(course_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Pending.as_str()))
            .order_by_asc(enrollments::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list pending enrollments for course")?;

        rows.into_iter().map(map_enrollment).collect()
    }

    /// Global pending queue, faculty-advisor scope.
    pub async fn list_all_pending(&self) -> Result<Vec<Enrollment>> {
        let rows = enrollments::Entity::find()
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Pending.as_str()))
            .order_by_asc(enrollments::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list pending enrollments")?;

        rows.into_iter().map(map_enrollment).collect()
    }

    /// Count of approved rows for a course; used by tests to assert the
    /// derived `current_enrollment` counter stays consistent.
    pub async fn count_approved_for_course(&self, course_id: i32) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let count = enrollments::Entity::find()
            .filter(enrollments::Column::CourseId.eq(course_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Approved.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count approved enrollments")?;

        Ok(count)
    }
}
