use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::entities::courses;

#[derive(Debug, Clone)]
pub struct Course {
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

impl From<courses::Model> for Course {
    fn from(model: courses::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            credits: model.credits,
            max_students: model.max_students,
            current_enrollment: model.current_enrollment,
            instructor_id: model.instructor_id,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

/// Fields supplied by the instructor when creating a course. Credit bounds
/// are validated in the course service, not here.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub max_students: i32,
    pub description: Option<String>,
}

pub struct CourseRepository {
    conn: DatabaseConnection,
}

impl CourseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, course: &NewCourse, instructor_id: i32) -> Result<Course> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = courses::ActiveModel {
            code: Set(course.code.clone()),
            name: Set(course.name.clone()),
            credits: Set(course.credits),
            max_students: Set(course.max_students),
            current_enrollment: Set(0),
            instructor_id: Set(instructor_id),
            description: Set(course.description.clone()),
            created_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert course")?;

        info!("Created course {} ({})", model.name, model.code);
        Ok(Course::from(model))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Course>> {
        let course = courses::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query course by ID")?;

        Ok(course.map(Course::from))
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Course>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = courses::Entity::find()
            .filter(courses::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query courses by IDs")?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Course>> {
        let rows = courses::Entity::find()
            .order_by_asc(courses::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list courses")?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    pub async fn list_by_instructor(&self, instructor_id: i32) -> Result<Vec<Course>> {
        let rows = courses::Entity::find()
            .filter(courses::Column::InstructorId.eq(instructor_id))
            .order_by_asc(courses::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list instructor courses")?;

        Ok(rows.into_iter().map(Course::from).collect())
    }
}
