use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Extension, Router,
};
use campus_club_hub::{auth::Keys, connect_to_db, email::Mailer, models::Role};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

// base64 of "a fairly long test secret for hmac"
const SECRET: &str = "YSBmYWlybHkgbG9uZyB0ZXN0IHNlY3JldCBmb3IgaG1hYw==";

fn keys() -> Keys {
    Keys::from_base64_secret(SECRET, Duration::from_secs(60 * 60)).unwrap()
}

/// The router with every extension installed. The pool never connects, so
/// these requests must be settled before a handler asks for a connection.
fn app() -> Router {
    campus_club_hub::app()
        .layer(Extension(
            connect_to_db("postgres://localhost/unused").unwrap(),
        ))
        .layer(Extension(Arc::new(keys())))
        .layer(Extension(None::<Arc<Mailer>>))
}

fn token(role: Role) -> String {
    keys().generate_jwt(1, role).unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn club_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "We build robots",
        "clubType": "technical",
        "contactEmail": "robots@uni.edu",
    })
}

fn event_body() -> Value {
    json!({
        "clubId": 1,
        "title": "Robot wars",
        "eventDate": "2024-10-01T18:00:00Z",
        "location": "Hall B",
    })
}

async fn status_of(req: Request<Body>) -> StatusCode {
    app().oneshot(req).await.unwrap().status()
}

#[tokio::test]
async fn club_types_are_public() {
    let status = status_of(request(Method::GET, "/api/club-types", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn creating_a_club_needs_a_token() {
    let req = request(Method::POST, "/api/clubs", None, Some(club_body("Robotics")));
    assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);

    let req = request(
        Method::POST,
        "/api/clubs",
        Some("not-a-jwt"),
        Some(club_body("Robotics")),
    );
    assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_from_another_secret_are_rejected() {
    let other = Keys::from_base64_secret("b3RoZXIgc2VjcmV0", Duration::from_secs(60))
        .unwrap()
        .generate_jwt(1, Role::Club)
        .unwrap();
    let req = request(Method::GET, "/api/profile", Some(&other), None);
    assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn regular_accounts_cannot_create_clubs_or_events() {
    let regular = token(Role::Regular);

    let req = request(
        Method::POST,
        "/api/clubs",
        Some(&regular),
        Some(club_body("Robotics")),
    );
    assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);

    let req = request(Method::POST, "/api/events", Some(&regular), Some(event_body()));
    assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn club_accounts_cannot_attend_or_star_events() {
    let club = token(Role::Club);

    let req = request(Method::POST, "/api/events/3/attendance", Some(&club), None);
    assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);

    let req = request(Method::POST, "/api/events/3/star", Some(&club), None);
    assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blank_club_names_are_rejected() {
    let req = request(
        Method::POST,
        "/api/clubs",
        Some(&token(Role::Club)),
        Some(club_body("   ")),
    );
    assert_eq!(status_of(req).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_over_capacity_limit_are_rejected() {
    let mut body = event_body();
    body["maxAttendees"] = json!(5000);
    let req = request(Method::POST, "/api/events", Some(&token(Role::Club)), Some(body));
    assert_eq!(status_of(req).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_validates_before_touching_the_database() {
    let short_password = json!({
        "email": "ada@uni.edu",
        "password": "12345",
        "fullName": "Ada",
        "role": "regular",
    });
    let req = request(Method::POST, "/api/auth/signup", None, Some(short_password));
    assert_eq!(status_of(req).await, StatusCode::BAD_REQUEST);

    let club_without_details = json!({
        "email": "ada@uni.edu",
        "password": "123456",
        "fullName": "Ada",
        "role": "club",
    });
    let req = request(
        Method::POST,
        "/api/auth/signup",
        None,
        Some(club_without_details),
    );
    assert_eq!(status_of(req).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_reset_needs_a_mailer() {
    let req = request(
        Method::POST,
        "/api/password/reset",
        None,
        Some(json!({ "email": "ada@uni.edu" })),
    );
    assert_eq!(status_of(req).await, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_reset_links_are_rejected() {
    let req = request(Method::GET, "/api/password/not-issued", None, None);
    assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
}
