use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::course::{Course, NewCourse};
pub use repositories::enrollment::Enrollment;
pub use repositories::user::User;

use crate::domain::{EnrollmentStatus, Role};

/// Facade over the database connection. Collections (`users`, `courses`,
/// `enrollments`) are exposed through repository methods; the facade carries
/// no business rules.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn course_repo(&self) -> repositories::course::CourseRepository {
        repositories::course::CourseRepository::new(self.conn.clone())
    }

    fn enrollment_repo(&self) -> repositories::enrollment::EnrollmentRepository {
        repositories::enrollment::EnrollmentRepository::new(self.conn.clone())
    }

    // ------------------------------------------------------------------
    // users
    // ------------------------------------------------------------------

    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        phone: &str,
        role: Role,
    ) -> Result<User> {
        self.user_repo().create(email, name, phone, role).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_users_by_ids(&self, ids: &[i32]) -> Result<Vec<User>> {
        self.user_repo().get_by_ids(ids).await
    }

    // ------------------------------------------------------------------
    // courses
    // ------------------------------------------------------------------

    pub async fn create_course(&self, course: &NewCourse, instructor_id: i32) -> Result<Course> {
        self.course_repo().create(course, instructor_id).await
    }

    pub async fn get_course(&self, id: i32) -> Result<Option<Course>> {
        self.course_repo().get(id).await
    }

    pub async fn get_courses_by_ids(&self, ids: &[i32]) -> Result<Vec<Course>> {
        self.course_repo().get_by_ids(ids).await
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        self.course_repo().list_all().await
    }

    pub async fn list_instructor_courses(&self, instructor_id: i32) -> Result<Vec<Course>> {
        self.course_repo().list_by_instructor(instructor_id).await
    }

    // ------------------------------------------------------------------
    // enrollments
    // ------------------------------------------------------------------

    pub async fn insert_pending_enrollment(
        &self,
        student_id: i32,
        course_id: i32,
    ) -> Result<Enrollment> {
        self.enrollment_repo()
            .insert_pending(student_id, course_id)
            .await
    }

    pub async fn get_enrollment(&self, id: i32) -> Result<Option<Enrollment>> {
        self.enrollment_repo().get(id).await
    }

    pub async fn active_enrollment_exists(&self, student_id: i32, course_id: i32) -> Result<bool> {
        self.enrollment_repo()
            .active_exists(student_id, course_id)
            .await
    }

    pub async fn list_student_enrollments(
        &self,
        student_id: i32,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>> {
        self.enrollment_repo()
            .list_by_student(student_id, status)
            .await
    }

    pub async fn list_pending_for_course(&self, course_id: i32) -> Result<Vec<Enrollment>> {
        self.enrollment_repo()
            .list_pending_for_course(course_id)
            .await
    }

    pub async fn list_all_pending_enrollments(&self) -> Result<Vec<Enrollment>> {
        self.enrollment_repo().list_all_pending().await
    }

    pub async fn count_approved_for_course(&self, course_id: i32) -> Result<u64> {
        self.enrollment_repo()
            .count_approved_for_course(course_id)
            .await
    }
}
