use crate::{
    error::{AppError, AppResult},
    models::ClubType,
};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::str::FromStr;

pub mod auth;
pub mod board;
pub mod club;
pub mod event;
pub mod password;
pub mod profile;
pub mod search;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<MessageResponse> {
        Json(MessageResponse {
            message: message.into(),
        })
    }
}

/// Parses a comma-separated query value such as `categories=sports,social`.
pub(crate) fn parse_list<T>(raw: Option<&str>) -> AppResult<Vec<T>>
where
    T: FromStr,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| AppError::bad_request(format!("unknown category `{s}`")))
        })
        .collect()
}

/// Builds an `ILIKE` pattern matching `q` anywhere, `None` for a blank query.
pub(crate) fn like_pattern(q: Option<&str>) -> Option<String> {
    let q = q?.trim();
    if q.is_empty() {
        return None;
    }
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

async fn list_club_types() -> Json<Vec<&'static str>> {
    Json(ClubType::ALL.iter().map(|t| t.as_str()).collect())
}

pub fn app() -> Router {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/password", password::app())
        .nest("/profile", profile::app())
        .nest("/clubs", club::app().merge(board::app()))
        .nest("/events", event::app())
        .nest("/search", search::app())
        .route("/club-types", get(list_club_types))
}
