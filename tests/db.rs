//! Flows that need a real Postgres. They run when `TEST_DATABASE_URL` points at
//! a scratch database and are skipped otherwise. Every test rebuilds the schema.

use axum::{
    body::{Body, HttpBody},
    http::{header, Method, Request, StatusCode},
    Extension, Router,
};
use campus_club_hub::{auth::Keys, connect_to_db, email::Mailer};
use diesel_async::{AsyncConnection, AsyncPgConnection, SimpleAsyncConnection};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;

// base64 of "a fairly long test secret for hmac"
const SECRET: &str = "YSBmYWlybHkgbG9uZyB0ZXN0IHNlY3JldCBmb3IgaG1hYw==";

const RESET_SCHEMA: &str = "DROP TABLE IF EXISTS event_stars, event_attendees, club_members, \
    club_applications, achievements, board_members, events, clubs, profiles CASCADE;";
const SCHEMA: &str = include_str!("../migrations/2024-09-01-000000_create_club_hub/up.sql");

// Tests share one database, so they take turns.
static DB: Mutex<()> = Mutex::new(());

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn start() -> Option<TestApp> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        };

        let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
        conn.batch_execute(RESET_SCHEMA).await.unwrap();
        conn.batch_execute(SCHEMA).await.unwrap();

        let keys = Keys::from_base64_secret(SECRET, Duration::from_secs(60 * 60)).unwrap();
        let router = campus_club_hub::app()
            .layer(Extension(connect_to_db(&url).unwrap()))
            .layer(Extension(Arc::new(keys)))
            .layer(Extension(None::<Arc<Mailer>>));
        Some(TestApp { router })
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let mut body = res.into_body();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.data().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn signup_regular(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "hunter22",
                    "fullName": "Ada Lovelace",
                    "role": "regular",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Signs up a club account and returns its token and the id of its club.
    async fn signup_club(&self, email: &str) -> (String, i64) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "hunter22",
                    "fullName": "Robotics Board",
                    "role": "club",
                    "club": club_body("Robotics"),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, clubs) = self
            .call(Method::GET, "/api/profile/clubs/owned", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let club_id = clubs[0]["id"].as_i64().unwrap();
        (token, club_id)
    }

    async fn create_event(&self, token: &str, club_id: i64, max_attendees: Option<i32>) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/events",
                Some(token),
                Some(json!({
                    "clubId": club_id,
                    "title": "Robot wars",
                    "eventDate": "2030-01-01T18:00:00Z",
                    "location": "Hall B",
                    "maxAttendees": max_attendees,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
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

fn lock() -> std::sync::MutexGuard<'static, ()> {
    DB.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[tokio::test]
async fn memberships_and_applications_are_unique() {
    let _guard = lock();
    let Some(app) = TestApp::start().await else { return };

    let (owner, club_id) = app.signup_club("owner@uni.edu").await;
    let ada = app.signup_regular("ada@uni.edu").await;
    let bob = app.signup_regular("bob@uni.edu").await;
    let membership = format!("/api/clubs/{club_id}/membership");
    let applications = format!("/api/clubs/{club_id}/applications");

    let (status, _) = app.call(Method::POST, &membership, Some(&ada), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.call(Method::POST, &membership, Some(&ada), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .call(Method::POST, &applications, Some(&ada), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, application) = app
        .call(
            Method::POST,
            &applications,
            Some(&bob),
            Some(json!({ "applicationMessage": "I like robots" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .call(Method::POST, &applications, Some(&bob), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let decision = format!("{applications}/{}", application["id"]);
    let (status, decided) = app
        .call(
            Method::PUT,
            &decision,
            Some(&owner),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "approved");
    let (status, _) = app
        .call(
            Method::PUT,
            &decision,
            Some(&owner),
            Some(json!({ "status": "rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, members) = app
        .call(
            Method::GET,
            &format!("/api/clubs/{club_id}/members"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn attendance_respects_capacity_and_repeats() {
    let _guard = lock();
    let Some(app) = TestApp::start().await else { return };

    let (owner, club_id) = app.signup_club("owner@uni.edu").await;
    let ada = app.signup_regular("ada@uni.edu").await;
    let bob = app.signup_regular("bob@uni.edu").await;
    let event_id = app.create_event(&owner, club_id, Some(1)).await;
    let attendance = format!("/api/events/{event_id}/attendance");

    let (status, body) = app.call(Method::POST, &attendance, Some(&ada), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["attendeeCount"], 1);

    let (status, body) = app.call(Method::POST, &attendance, Some(&ada), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You have already joined this event");

    let (status, body) = app.call(Method::POST, &attendance, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Event is full");

    let (status, _) = app.call(Method::DELETE, &attendance, Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::DELETE, &attendance, Some(&ada), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let star = format!("/api/events/{event_id}/star");
    let (_, body) = app.call(Method::POST, &star, Some(&ada), None).await;
    assert_eq!(body, json!({ "starred": true, "starCount": 1 }));
    let (_, body) = app.call(Method::POST, &star, Some(&ada), None).await;
    assert_eq!(body, json!({ "starred": false, "starCount": 0 }));

    let (status, body) = app
        .call(Method::POST, &format!("/api/events/{event_id}/share"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shareCount"], 1);
}

#[tokio::test]
async fn deleting_a_club_removes_its_events_and_board() {
    let _guard = lock();
    let Some(app) = TestApp::start().await else { return };

    let (owner, _) = app.signup_club("owner@uni.edu").await;
    let mut body = club_body("Chess Society");
    body["boardMembers"] = json!([{ "name": "Grace" }]);
    body["achievements"] = json!([{ "title": "Regional champions" }]);
    let (status, club) = app
        .call(Method::POST, "/api/clubs", Some(&owner), Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{club}");
    let club_id = club["id"].as_i64().unwrap();

    let member = format!(
        "/api/clubs/{club_id}/board-members/{}",
        club["boardMembers"][0]["id"]
    );
    let (status, edited) = app
        .call(
            Method::PUT,
            &member,
            Some(&owner),
            Some(json!({ "name": "Grace Hopper", "position": "President" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["name"], "Grace Hopper");
    assert_eq!(edited["joinedDate"], club["boardMembers"][0]["joinedDate"]);

    let achievement = format!(
        "/api/clubs/{club_id}/achievements/{}",
        club["achievements"][0]["id"]
    );
    let (status, edited) = app
        .call(
            Method::PUT,
            &achievement,
            Some(&owner),
            Some(json!({ "title": "National champions" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["title"], "National champions");

    let event_id = app.create_event(&owner, club_id, None).await;

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/clubs/{club_id}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/api/events/{event_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/clubs/{club_id}/board-members"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_signups_leave_nothing_behind() {
    let _guard = lock();
    let Some(app) = TestApp::start().await else { return };

    let mut club = club_body("Robotics");
    club["description"] = json!("robots\u{0}");
    let signup = |club: Value| {
        json!({
            "email": "owner@uni.edu",
            "password": "hunter22",
            "fullName": "Robotics Board",
            "role": "club",
            "club": club,
        })
    };

    let (status, _) = app
        .call(Method::POST, "/api/auth/signup", None, Some(signup(club)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup(club_body("Robotics"))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn profile_interests_are_normalised() {
    let _guard = lock();
    let Some(app) = TestApp::start().await else { return };

    let ada = app.signup_regular("ada@uni.edu").await;

    let (status, profile) = app
        .call(
            Method::PUT,
            "/api/profile",
            Some(&ada),
            Some(json!({ "interests": [" chess ", ""] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["interests"], json!(["chess"]));

    let (status, profile) = app
        .call(
            Method::PUT,
            "/api/profile",
            Some(&ada),
            Some(json!({ "interests": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["interests"], json!([]));
}
