use super::{
    club::{load_clubs, ClubSummary},
    event::{load_events, EventResponse},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Club, Event, Profile, Role},
    schema::*,
    validate, DbPool,
};
use axum::{routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    id: i32,
    email: String,
    full_name: Option<String>,
    role: String,
    bio: Option<String>,
    interests: Vec<String>,
    location: Option<String>,
    phone: Option<String>,
    year_in_college: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            role: profile.role,
            bio: profile.bio,
            interests: split_interests(profile.interests.as_deref()),
            location: profile.location,
            phone: profile.phone,
            year_in_college: profile.year_in_college,
            created_at: profile.created_at,
        }
    }
}

fn split_interests(stored: Option<&str>) -> Vec<String> {
    stored
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    full_name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    interests: Option<Vec<String>>,
    location: Option<String>,
    phone: Option<String>,
    year_in_college: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = profiles)]
struct ProfileEdit {
    full_name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    // `Some(None)` clears the column
    interests: Option<Option<String>>,
    location: Option<String>,
    phone: Option<String>,
    year_in_college: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    role: String,
    total_clubs: i64,
    total_events: i64,
    starred_events_count: i64,
    joined_events_count: i64,
    joined_clubs_count: i64,
}

async fn find_profile(conn: &mut AsyncPgConnection, id: i32) -> AppResult<Profile> {
    profiles::table
        .find(id)
        .first::<Profile>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("profile not found"))
}

async fn info(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<ProfileResponse>> {
    let conn = &mut pool.get().await?;
    Ok(Json(find_profile(conn, auth.id).await?.into()))
}

async fn edit(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    if let Some(email) = &req.email {
        validate::email("email", email)?;
    }
    if let Some(full_name) = &req.full_name {
        validate::required("full name", full_name)?;
    }
    for (field, value) in [
        ("bio", &req.bio),
        ("location", &req.location),
        ("phone", &req.phone),
        ("year in college", &req.year_in_college),
    ] {
        if let Some(value) = value {
            validate::text(field, value)?;
        }
    }
    let interests = match &req.interests {
        Some(list) => Some(validate::interests(list)?),
        None => None,
    };

    let conn = &mut pool.get().await?;

    let profile = diesel::update(profiles::table.find(auth.id))
        .set(ProfileEdit {
            full_name: req.full_name.map(|n| n.trim().to_string()),
            email: req.email.map(|e| e.trim().to_lowercase()),
            bio: req.bio,
            interests,
            location: req.location,
            phone: req.phone,
            year_in_college: req.year_in_college,
            updated_at: Utc::now(),
        })
        .get_result::<Profile>(conn)
        .await
        .optional()
        .map_err(|e| AppError::unique_violation(e, "an account with this email already exists"))?
        .ok_or_else(|| AppError::not_found("profile not found"))?;

    Ok(Json(profile.into()))
}

async fn dashboard(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<DashboardResponse>> {
    let conn = &mut pool.get().await?;

    let starred_events_count = event_stars::table
        .filter(event_stars::user_id.eq(auth.id))
        .count()
        .get_result::<i64>(conn)
        .await?;
    let joined_events_count = event_attendees::table
        .filter(event_attendees::user_id.eq(auth.id))
        .count()
        .get_result::<i64>(conn)
        .await?;
    let joined_clubs_count = club_members::table
        .filter(club_members::user_id.eq(auth.id))
        .count()
        .get_result::<i64>(conn)
        .await?;

    let (total_clubs, total_events) = if auth.role == Role::Club {
        let clubs = clubs::table
            .filter(clubs::owner_id.eq(auth.id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let events = events::table
            .inner_join(clubs::table)
            .filter(clubs::owner_id.eq(auth.id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        (clubs, events)
    } else {
        (0, 0)
    };

    Ok(Json(DashboardResponse {
        role: auth.role.to_string(),
        total_clubs,
        total_events,
        starred_events_count,
        joined_events_count,
        joined_clubs_count,
    }))
}

async fn owned_clubs(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let conn = &mut pool.get().await?;

    let clubs = clubs::table
        .filter(clubs::owner_id.eq(auth.id))
        .order(clubs::created_at.desc())
        .load::<Club>(conn)
        .await?;

    Ok(Json(load_clubs(conn, clubs).await?))
}

async fn joined_clubs(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let conn = &mut pool.get().await?;

    let clubs = club_members::table
        .inner_join(clubs::table)
        .filter(club_members::user_id.eq(auth.id))
        .order(club_members::created_at.desc())
        .select(clubs::all_columns)
        .load::<Club>(conn)
        .await?;

    Ok(Json(load_clubs(conn, clubs).await?))
}

async fn created_events(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let conn = &mut pool.get().await?;

    let events = events::table
        .inner_join(clubs::table)
        .filter(events::created_by.eq(auth.id))
        .order(events::event_date.desc())
        .load::<(Event, Club)>(conn)
        .await?;

    Ok(Json(load_events(conn, events).await?))
}

async fn joined_events(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let conn = &mut pool.get().await?;

    let events = event_attendees::table
        .inner_join(events::table.inner_join(clubs::table))
        .filter(event_attendees::user_id.eq(auth.id))
        .order(events::event_date.asc())
        .select((events::all_columns, clubs::all_columns))
        .load::<(Event, Club)>(conn)
        .await?;

    Ok(Json(load_events(conn, events).await?))
}

async fn starred_events(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let conn = &mut pool.get().await?;

    let events = event_stars::table
        .inner_join(events::table.inner_join(clubs::table))
        .filter(event_stars::user_id.eq(auth.id))
        .order(events::event_date.asc())
        .select((events::all_columns, clubs::all_columns))
        .load::<(Event, Club)>(conn)
        .await?;

    Ok(Json(load_events(conn, events).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(info).put(edit))
        .route("/dashboard", get(dashboard))
        .route("/clubs/owned", get(owned_clubs))
        .route("/clubs/joined", get(joined_clubs))
        .route("/events/created", get(created_events))
        .route("/events/joined", get(joined_events))
        .route("/events/starred", get(starred_events))
}
