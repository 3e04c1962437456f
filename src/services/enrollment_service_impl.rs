//! `SeaORM` implementation of the `EnrollmentService` trait.
//!
//! All state transitions take the service-wide transition lock and run inside
//! a database transaction. The lock serializes the cap check against
//! concurrent approvals (a stale ledger read could otherwise let two
//! approvals jointly push a student over the cap); the transaction makes the
//! row update and the course counter increment all-or-nothing.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::constants::credits::MAX_CREDIT_LIMIT;
use crate::db::repositories::enrollment::map_enrollment;
use crate::db::{Course, Enrollment, Store, User};
use crate::domain::{EnrollmentStatus, Role};
use crate::entities::{courses, enrollments};
use crate::services::enrollment_service::{EnrollmentError, EnrollmentService, PendingRequest};
use crate::services::ledger::{self, CreditLedger};

pub struct SeaOrmEnrollmentService {
    store: Store,
    ledger: CreditLedger,
    /// Serializes request/approve/reject. Per-student sharding would also be
    /// correct; one lock is sufficient at this dataset size.
    transition_lock: Mutex<()>,
}

impl SeaOrmEnrollmentService {
    #[must_use]
    pub fn new(store: Store) -> Self {
        let ledger = CreditLedger::new(store.clone());
        Self {
            store,
            ledger,
            transition_lock: Mutex::new(()),
        }
    }

    /// Instructors may only act on courses they own; faculty advisors are
    /// exempt; students may not decide requests at all.
    fn check_decision_scope(actor: &User, course: &courses::Model) -> Result<(), EnrollmentError> {
        match actor.role {
            Role::FacultyAdvisor => Ok(()),
            Role::Instructor if course.instructor_id == actor.id => Ok(()),
            Role::Instructor | Role::Student => Err(EnrollmentError::Unauthorized),
        }
    }

    /// Joins students, courses, and per-student committed credits onto raw
    /// pending rows for the approval queues.
    async fn enrich(
        &self,
        pending: Vec<Enrollment>,
    ) -> Result<Vec<PendingRequest>, EnrollmentError> {
        let student_ids: Vec<i32> = pending.iter().map(|e| e.student_id).collect();
        let course_ids: Vec<i32> = pending.iter().map(|e| e.course_id).collect();

        let students: HashMap<i32, User> = self
            .store
            .get_users_by_ids(&student_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let courses: HashMap<i32, Course> = self
            .store
            .get_courses_by_ids(&course_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut credit_totals: HashMap<i32, i32> = HashMap::new();

        let mut requests = Vec::with_capacity(pending.len());
        for enrollment in pending {
            let Some(student) = students.get(&enrollment.student_id) else {
                // Row references a deleted student; skip rather than fail
                // the whole queue.
                continue;
            };
            let Some(course) = courses.get(&enrollment.course_id) else {
                continue;
            };

            let committed = match credit_totals.get(&enrollment.student_id) {
                Some(total) => *total,
                None => {
                    let total = self.ledger.committed_credits(enrollment.student_id).await?;
                    credit_totals.insert(enrollment.student_id, total);
                    total
                }
            };

            requests.push(PendingRequest {
                enrollment,
                student: student.clone(),
                course: course.clone(),
                committed_credits: committed,
            });
        }

        Ok(requests)
    }
}

#[async_trait]
impl EnrollmentService for SeaOrmEnrollmentService {
    async fn request(
        &self,
        student_id: i32,
        course_id: i32,
    ) -> Result<Enrollment, EnrollmentError> {
        let _guard = self.transition_lock.lock().await;

        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(EnrollmentError::CourseNotFound(course_id))?;

        if self
            .store
            .active_enrollment_exists(student_id, course_id)
            .await?
        {
            return Err(EnrollmentError::DuplicateEnrollment);
        }

        let committed = self.ledger.committed_credits(student_id).await?;
        if committed + course.credits > MAX_CREDIT_LIMIT {
            return Err(EnrollmentError::CreditLimitExceeded);
        }

        let enrollment = self
            .store
            .insert_pending_enrollment(student_id, course_id)
            .await?;

        info!(
            student_id,
            course_id,
            enrollment_id = enrollment.id,
            "Enrollment requested"
        );

        Ok(enrollment)
    }

    async fn approve(
        &self,
        enrollment_id: i32,
        actor: &User,
    ) -> Result<Enrollment, EnrollmentError> {
        let _guard = self.transition_lock.lock().await;

        let txn = self.store.conn.begin().await?;

        let row = enrollments::Entity::find_by_id(enrollment_id)
            .one(&txn)
            .await?
            .ok_or(EnrollmentError::NotFound(enrollment_id))?;

        let status = row
            .status
            .parse::<EnrollmentStatus>()
            .map_err(EnrollmentError::Internal)?;
        if status != EnrollmentStatus::Pending {
            return Err(EnrollmentError::InvalidState(status));
        }

        let course = courses::Entity::find_by_id(row.course_id)
            .one(&txn)
            .await?
            .ok_or(EnrollmentError::CourseNotFound(row.course_id))?;

        Self::check_decision_scope(actor, &course)?;

        // Re-validate against the ledger as of this transaction, not as of
        // request time. On failure the row stays pending.
        let committed = ledger::committed_credits_on(&txn, row.student_id).await?;
        if committed + course.credits > MAX_CREDIT_LIMIT {
            return Err(EnrollmentError::CreditLimitExceeded);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let student_id = row.student_id;

        let mut active: enrollments::ActiveModel = row.into();
        active.status = Set(EnrollmentStatus::Approved.as_str().to_string());
        active.approved_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        let new_count = course.current_enrollment + 1;
        let mut course_active: courses::ActiveModel = course.into();
        course_active.current_enrollment = Set(new_count);
        course_active.update(&txn).await?;

        txn.commit().await?;

        info!(
            enrollment_id,
            student_id,
            approved_by = actor.id,
            "Enrollment approved"
        );

        map_enrollment(updated).map_err(Into::into)
    }

    async fn reject(
        &self,
        enrollment_id: i32,
        actor: &User,
    ) -> Result<Enrollment, EnrollmentError> {
        let _guard = self.transition_lock.lock().await;

        let txn = self.store.conn.begin().await?;

        let row = enrollments::Entity::find_by_id(enrollment_id)
            .one(&txn)
            .await?
            .ok_or(EnrollmentError::NotFound(enrollment_id))?;

        let status = row
            .status
            .parse::<EnrollmentStatus>()
            .map_err(EnrollmentError::Internal)?;
        if status != EnrollmentStatus::Pending {
            return Err(EnrollmentError::InvalidState(status));
        }

        let course = courses::Entity::find_by_id(row.course_id)
            .one(&txn)
            .await?
            .ok_or(EnrollmentError::CourseNotFound(row.course_id))?;

        Self::check_decision_scope(actor, &course)?;

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: enrollments::ActiveModel = row.into();
        active.status = Set(EnrollmentStatus::Rejected.as_str().to_string());
        active.rejected_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(enrollment_id, rejected_by = actor.id, "Enrollment rejected");

        map_enrollment(updated).map_err(Into::into)
    }

    async fn pending_for_course(
        &self,
        course_id: i32,
        actor: &User,
    ) -> Result<Vec<PendingRequest>, EnrollmentError> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(EnrollmentError::CourseNotFound(course_id))?;

        match actor.role {
            Role::FacultyAdvisor => {}
            Role::Instructor if course.instructor_id == actor.id => {}
            Role::Instructor | Role::Student => return Err(EnrollmentError::Unauthorized),
        }

        let pending = self.store.list_pending_for_course(course_id).await?;
        self.enrich(pending).await
    }

    async fn pending_all(&self, actor: &User) -> Result<Vec<PendingRequest>, EnrollmentError> {
        if actor.role != Role::FacultyAdvisor {
            return Err(EnrollmentError::Unauthorized);
        }

        let pending = self.store.list_all_pending_enrollments().await?;
        self.enrich(pending).await
    }

    async fn for_student(
        &self,
        student_id: i32,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        self.store
            .list_student_enrollments(student_id, status)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewCourse;

    async fn test_store() -> Store {
        Store::new("sqlite::memory:").await.expect("store")
    }

    async fn make_user(store: &Store, email: &str, role: Role) -> User {
        store
            .create_user(email, "Test User", "555-0100", role)
            .await
            .expect("user")
    }

    async fn make_course(store: &Store, instructor: &User, code: &str, credits: i32) -> Course {
        store
            .create_course(
                &NewCourse {
                    code: code.to_string(),
                    name: format!("Course {code}"),
                    credits,
                    max_students: 30,
                    description: None,
                },
                instructor.id,
            )
            .await
            .expect("course")
    }

    /// Brings a student up to the given committed total by requesting and
    /// approving one course per entry in `credits`.
    async fn commit_credits(
        svc: &SeaOrmEnrollmentService,
        store: &Store,
        student: &User,
        instructor: &User,
        credits: &[i32],
    ) {
        for (i, c) in credits.iter().enumerate() {
            let course = make_course(store, instructor, &format!("FILL{i}-{c}"), *c).await;
            let enrollment = svc.request(student.id, course.id).await.expect("request");
            svc.approve(enrollment.id, instructor)
                .await
                .expect("approve");
        }
    }

    #[tokio::test]
    async fn request_with_zero_credits_succeeds_pending() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &instructor, "CS101", 4).await;

        let enrollment = svc.request(student.id, course.id).await.unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Pending);
        assert!(enrollment.approved_at.is_none());
    }

    #[tokio::test]
    async fn request_over_cap_fails_and_creates_no_row() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;

        // 22 committed credits.
        commit_credits(&svc, &store, &student, &instructor, &[4, 4, 4, 4, 3, 3]).await;

        let course = make_course(&store, &instructor, "CS499", 3).await;
        let err = svc.request(student.id, course.id).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::CreditLimitExceeded));

        let pending = svc
            .for_student(student.id, Some(EnrollmentStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn exactly_at_cap_is_allowed() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;

        commit_credits(&svc, &store, &student, &instructor, &[4, 4, 4, 4, 4]).await;

        // 20 + 4 == 24: equal to the limit passes.
        let course = make_course(&store, &instructor, "CS400", 4).await;
        let enrollment = svc.request(student.id, course.id).await.unwrap();
        let approved = svc.approve(enrollment.id, &instructor).await.unwrap();
        assert_eq!(approved.status, EnrollmentStatus::Approved);

        let ledger = CreditLedger::new(store);
        assert_eq!(ledger.committed_credits(student.id).await.unwrap(), 24);
    }

    #[tokio::test]
    async fn approval_revalidates_against_current_ledger() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let advisor = make_user(&store, "f@uni.edu", Role::FacultyAdvisor).await;

        commit_credits(&svc, &store, &student, &instructor, &[4, 4, 4, 4, 4]).await;

        // Two pending requests that each pass individually at 20 committed.
        let three = make_course(&store, &instructor, "CS301", 3).await;
        let four = make_course(&store, &instructor, "CS401", 4).await;
        let first = svc.request(student.id, three.id).await.unwrap();
        let second = svc.request(student.id, four.id).await.unwrap();

        // 20 + 3 = 23, fine.
        svc.approve(first.id, &instructor).await.unwrap();

        // 23 + 4 = 27 > 24: refused, and the row stays pending.
        let err = svc.approve(second.id, &advisor).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::CreditLimitExceeded));

        let row = store.get_enrollment(second.id).await.unwrap().unwrap();
        assert_eq!(row.status, EnrollmentStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_request_is_refused_while_active() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &instructor, "CS101", 3).await;

        let first = svc.request(student.id, course.id).await.unwrap();

        // Second request while pending.
        let err = svc.request(student.id, course.id).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::DuplicateEnrollment));

        // Still blocked once approved.
        svc.approve(first.id, &instructor).await.unwrap();
        let err = svc.request(student.id, course.id).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::DuplicateEnrollment));
    }

    #[tokio::test]
    async fn rejected_row_allows_a_new_request() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &instructor, "CS101", 3).await;

        let first = svc.request(student.id, course.id).await.unwrap();
        svc.reject(first.id, &instructor).await.unwrap();

        let retry = svc.request(student.id, course.id).await.unwrap();
        assert_ne!(retry.id, first.id);
        assert_eq!(retry.status, EnrollmentStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_states_admit_no_transitions() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &instructor, "CS101", 3).await;

        let enrollment = svc.request(student.id, course.id).await.unwrap();
        svc.reject(enrollment.id, &instructor).await.unwrap();

        let err = svc.approve(enrollment.id, &instructor).await.unwrap_err();
        assert!(matches!(
            err,
            EnrollmentError::InvalidState(EnrollmentStatus::Rejected)
        ));
        let err = svc.reject(enrollment.id, &instructor).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn instructor_cannot_decide_for_foreign_course() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let owner = make_user(&store, "owner@uni.edu", Role::Instructor).await;
        let other = make_user(&store, "other@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &owner, "CS101", 3).await;

        let enrollment = svc.request(student.id, course.id).await.unwrap();

        let err = svc.approve(enrollment.id, &other).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Unauthorized));

        // Still pending; the owner can proceed.
        svc.approve(enrollment.id, &owner).await.unwrap();
    }

    #[tokio::test]
    async fn faculty_advisor_decides_any_course() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let advisor = make_user(&store, "f@uni.edu", Role::FacultyAdvisor).await;
        let course = make_course(&store, &instructor, "CS101", 3).await;

        let enrollment = svc.request(student.id, course.id).await.unwrap();
        let approved = svc.approve(enrollment.id, &advisor).await.unwrap();
        assert_eq!(approved.status, EnrollmentStatus::Approved);
    }

    #[tokio::test]
    async fn counter_tracks_approved_rows() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let instructor = make_user(&store, "i@uni.edu", Role::Instructor).await;
        let course = make_course(&store, &instructor, "CS101", 3).await;

        for n in 0..3 {
            let student = make_user(&store, &format!("s{n}@uni.edu"), Role::Student).await;
            let enrollment = svc.request(student.id, course.id).await.unwrap();
            svc.approve(enrollment.id, &instructor).await.unwrap();
        }

        // One rejection must not move the counter.
        let student = make_user(&store, "late@uni.edu", Role::Student).await;
        let enrollment = svc.request(student.id, course.id).await.unwrap();
        svc.reject(enrollment.id, &instructor).await.unwrap();

        let course = store.get_course(course.id).await.unwrap().unwrap();
        assert_eq!(course.current_enrollment, 3);
        assert_eq!(store.count_approved_for_course(course.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn pending_queue_scopes_by_role() {
        let store = test_store().await;
        let svc = SeaOrmEnrollmentService::new(store.clone());

        let student = make_user(&store, "s@uni.edu", Role::Student).await;
        let owner = make_user(&store, "owner@uni.edu", Role::Instructor).await;
        let other = make_user(&store, "other@uni.edu", Role::Instructor).await;
        let advisor = make_user(&store, "f@uni.edu", Role::FacultyAdvisor).await;
        let course = make_course(&store, &owner, "CS101", 3).await;

        svc.request(student.id, course.id).await.unwrap();

        let owned = svc.pending_for_course(course.id, &owner).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].student.id, student.id);
        assert_eq!(owned[0].committed_credits, 0);

        let err = svc.pending_for_course(course.id, &other).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Unauthorized));

        let global = svc.pending_all(&advisor).await.unwrap();
        assert_eq!(global.len(), 1);

        let err = svc.pending_all(&owner).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Unauthorized));
    }
}
