pub mod ledger;
pub use ledger::CreditLedger;

pub mod enrollment_service;
pub mod enrollment_service_impl;
pub use enrollment_service::{EnrollmentError, EnrollmentService, PendingRequest};
pub use enrollment_service_impl::SeaOrmEnrollmentService;

pub mod course_service;
pub mod course_service_impl;
pub use course_service::{CourseError, CourseService};
pub use course_service_impl::SeaOrmCourseService;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, OtpMailer, TracingMailer, VerifyOutcome};
pub use auth_service_impl::SeaOrmAuthService;
