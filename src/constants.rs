pub mod credits {

    /// Maximum total committed credits a student may hold. A new total equal
    /// to the limit is allowed; only strictly exceeding it is refused.
    pub const MAX_CREDIT_LIMIT: i32 = 24;

    pub const MIN_COURSE_CREDITS: i32 = 1;

    pub const MAX_COURSE_CREDITS: i32 = 4;
}

pub mod otp {

    /// Codes expire this many seconds after issuance.
    pub const EXPIRY_SECONDS: i64 = 300;

    /// Resend is refused while more than this many seconds of the window
    /// remain, i.e. only once at least 60s have elapsed.
    pub const RESEND_BLOCKED_ABOVE_SECONDS: i64 = 240;

    pub const CODE_LENGTH: usize = 6;
}

pub mod session {

    pub const USER_ID_KEY: &str = "user_id";

    pub const IDLE_MINUTES: i64 = 60;
}
