use std::sync::{Arc, Mutex};

use aims::api::{self, AppState};
use aims::config::Config;
use aims::db::Store;
use aims::services::OtpMailer;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Keeps issued codes so tests can complete the login flow.
struct CapturingMailer {
    codes: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl OtpMailer for CapturingMailer {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.codes
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

async fn spawn_app() -> (Router, Arc<CapturingMailer>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();

    let store = Store::new(&config.general.database_path)
        .await
        .expect("Failed to open store");

    let mailer = Arc::new(CapturingMailer {
        codes: Mutex::new(Vec::new()),
    });

    let state: Arc<AppState> = api::create_app_state(store, config, mailer.clone(), None);
    (api::router(state), mailer)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("No session cookie on response")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn post_json(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn get_with_cookie(app: &Router, uri: &str, cookie: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Registers a user and returns their session cookie.
async fn register(app: &Router, email: &str, name: &str, role: &str) -> String {
    let response = post_json(
        app,
        "/api/auth/register",
        None,
        serde_json::json!({
            "email": email,
            "name": name,
            "phone": "555-0100",
            "role": role,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

async fn create_course(
    app: &Router,
    instructor_cookie: &str,
    code: &str,
    credits: i32,
) -> i64 {
    let response = post_json(
        app,
        "/api/courses",
        Some(instructor_cookie),
        serde_json::json!({
            "code": code,
            "name": format!("Course {code}"),
            "credits": credits,
            "max_students": 30,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let (app, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/courses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_otp_login_flow() {
    let (app, mailer) = spawn_app().await;

    // Unknown email: code is issued and delivered.
    let response = post_json(
        &app,
        "/api/auth/otp/send",
        None,
        serde_json::json!({"email": "ada@example.edu"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let code = {
        let codes = mailer.codes.lock().unwrap();
        let (email, code) = codes.last().expect("No code captured").clone();
        assert_eq!(email, "ada@example.edu");
        code
    };

    // Valid code for an unknown email asks for registration.
    let response = post_json(
        &app,
        "/api/auth/otp/verify",
        None,
        serde_json::json!({"email": "ada@example.edu", "code": code}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["registration_required"], true);

    // Register, then the session is live.
    let cookie = register(&app, "ada@example.edu", "Ada", "student").await;

    let response = get_with_cookie(&app, "/api/auth/me", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["email"], "ada@example.edu");
    assert_eq!(body["data"]["role"], "student");

    // Second login round trip for the now-known email.
    let response = post_json(
        &app,
        "/api/auth/otp/send",
        None,
        serde_json::json!({"email": "ada@example.edu"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let code = mailer.codes.lock().unwrap().last().unwrap().1.clone();

    let response = post_json(
        &app,
        "/api/auth/otp/verify",
        None,
        serde_json::json!({"email": "ada@example.edu", "code": code}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["registration_required"], false);
    assert_eq!(body["data"]["user"]["email"], "ada@example.edu");
}

#[tokio::test]
async fn test_wrong_otp_rejected() {
    let (app, mailer) = spawn_app().await;

    let response = post_json(
        &app,
        "/api/auth/otp/send",
        None,
        serde_json::json!({"email": "bob@example.edu"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let issued = mailer.codes.lock().unwrap().last().unwrap().1.clone();
    let wrong = if issued == "000000" { "000001" } else { "000000" };

    let response = post_json(
        &app,
        "/api/auth/otp/verify",
        None,
        serde_json::json!({"email": "bob@example.edu", "code": wrong}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let (app, _mailer) = spawn_app().await;

    register(&app, "carol@example.edu", "Carol", "student").await;

    let response = post_json(
        &app,
        "/api/auth/register",
        None,
        serde_json::json!({
            "email": "carol@example.edu",
            "name": "Carol Again",
            "phone": "555-0101",
            "role": "student",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_students_cannot_create_courses() {
    let (app, _mailer) = spawn_app().await;

    let cookie = register(&app, "dan@example.edu", "Dan", "student").await;

    let response = post_json(
        &app,
        "/api/courses",
        Some(&cookie),
        serde_json::json!({
            "code": "CS101",
            "name": "Intro",
            "credits": 3,
            "max_students": 30,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_enrollment_approval_flow() {
    let (app, _mailer) = spawn_app().await;

    let instructor = register(&app, "prof@example.edu", "Prof", "instructor").await;
    let student = register(&app, "eve@example.edu", "Eve", "student").await;

    let course_id = create_course(&app, &instructor, "CS101", 3).await;

    // Student requests enrollment.
    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": course_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let enrollment_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "pending");

    // A second request for the same course conflicts.
    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": course_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Instructor sees it in the course queue.
    let response = get_with_cookie(
        &app,
        &format!("/api/courses/{course_id}/pending"),
        &instructor,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["student"]["email"], "eve@example.edu");
    assert_eq!(body["data"][0]["committed_credits"], 0);

    // Approve it.
    let response = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/approve"),
        Some(&instructor),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "approved");

    // Approving the same row again conflicts.
    let response = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/approve"),
        Some(&instructor),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Credits now reflect the approved course.
    let response = get_with_cookie(&app, "/api/students/me/credits", &student).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["committed_credits"], 3);
    assert_eq!(body["data"]["credit_limit"], 24);

    // Course counter moved.
    let response = get_with_cookie(&app, &format!("/api/courses/{course_id}"), &student).await;
    let body = json_body(response).await;
    assert_eq!(body["data"]["current_enrollment"], 1);

    // The approved course is no longer listed as available.
    let response = get_with_cookie(&app, "/api/courses/available", &student).await;
    let body = json_body(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_foreign_instructor_cannot_decide() {
    let (app, _mailer) = spawn_app().await;

    let owner = register(&app, "owner@example.edu", "Owner", "instructor").await;
    let other = register(&app, "other@example.edu", "Other", "instructor").await;
    let student = register(&app, "fay@example.edu", "Fay", "student").await;

    let course_id = create_course(&app, &owner, "MA201", 4).await;

    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": course_id}),
    )
    .await;
    let enrollment_id = json_body(response).await["data"]["id"].as_i64().unwrap();

    let response = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/approve"),
        Some(&other),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_advisor_sees_all_pending_and_rejects() {
    let (app, _mailer) = spawn_app().await;

    let instructor = register(&app, "prof2@example.edu", "Prof", "instructor").await;
    let advisor = register(&app, "advisor@example.edu", "Advisor", "faculty_advisor").await;
    let student = register(&app, "gus@example.edu", "Gus", "student").await;

    let course_id = create_course(&app, &instructor, "PH301", 2).await;

    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": course_id}),
    )
    .await;
    let enrollment_id = json_body(response).await["data"]["id"].as_i64().unwrap();

    // Students cannot read the system-wide queue.
    let response = get_with_cookie(&app, "/api/enrollments/pending", &student).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_with_cookie(&app, "/api/enrollments/pending", &advisor).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/reject"),
        Some(&advisor),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "rejected");

    // Rejection leaves the counter alone and frees the student to retry.
    let response = get_with_cookie(&app, &format!("/api/courses/{course_id}"), &student).await;
    let body = json_body(response).await;
    assert_eq!(body["data"]["current_enrollment"], 0);

    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": course_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_course_is_404() {
    let (app, _mailer) = spawn_app().await;

    let student = register(&app, "hal@example.edu", "Hal", "student").await;

    let response = post_json(
        &app,
        "/api/enrollments",
        Some(&student),
        serde_json::json!({"course_id": 9999}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let (app, _mailer) = spawn_app().await;

    let cookie = register(&app, "ivy@example.edu", "Ivy", "student").await;

    let response = post_json(&app, "/api/auth/logout", Some(&cookie), serde_json::json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_with_cookie(&app, "/api/auth/me", &cookie).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
