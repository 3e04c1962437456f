//! `SeaORM` implementation of the `CourseService` trait.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

use crate::constants::credits::{MAX_COURSE_CREDITS, MIN_COURSE_CREDITS};
use crate::db::{Course, NewCourse, Store, User};
use crate::domain::Role;
use crate::services::course_service::{CourseError, CourseService};

pub struct SeaOrmCourseService {
    store: Store,
}

impl SeaOrmCourseService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    fn validate(course: &NewCourse) -> Result<(), CourseError> {
        if course.code.trim().is_empty() || course.name.trim().is_empty() {
            return Err(CourseError::Validation(
                "Course code and name are required".to_string(),
            ));
        }

        if !(MIN_COURSE_CREDITS..=MAX_COURSE_CREDITS).contains(&course.credits) {
            return Err(CourseError::Validation(format!(
                "Credits must be between {MIN_COURSE_CREDITS} and {MAX_COURSE_CREDITS}"
            )));
        }

        if course.max_students <= 0 {
            return Err(CourseError::Validation(
                "Maximum students must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl CourseService for SeaOrmCourseService {
    async fn create(&self, course: NewCourse, actor: &User) -> Result<Course, CourseError> {
        if actor.role != Role::Instructor {
            return Err(CourseError::Unauthorized);
        }

        Self::validate(&course)?;

        let created = self.store.create_course(&course, actor.id).await?;
        info!(
            course_id = created.id,
            instructor_id = actor.id,
            "Course created"
        );

        Ok(created)
    }

    async fn get(&self, id: i32) -> Result<Course, CourseError> {
        self.store
            .get_course(id)
            .await?
            .ok_or(CourseError::NotFound(id))
    }

    async fn list_catalog(&self) -> Result<Vec<Course>, CourseError> {
        self.store.list_courses().await.map_err(Into::into)
    }

    async fn list_available(&self, student_id: i32) -> Result<Vec<Course>, CourseError> {
        let catalog = self.store.list_courses().await?;
        let enrollments = self
            .store
            .list_student_enrollments(student_id, None)
            .await?;

        let taken: HashSet<i32> = enrollments
            .iter()
            .filter(|e| e.status.is_active())
            .map(|e| e.course_id)
            .collect();

        Ok(catalog
            .into_iter()
            .filter(|c| !taken.contains(&c.id))
            .collect())
    }

    async fn list_owned(&self, instructor_id: i32) -> Result<Vec<Course>, CourseError> {
        self.store
            .list_instructor_courses(instructor_id)
            .await
            .map_err(Into::into)
    }
}
