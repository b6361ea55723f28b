use super::{
    club::{find_club, owned_club},
    like_pattern, parse_list,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    models::{Club, ClubType, Event, EventStatus, Role},
    policy,
    schema::*,
    validate, DbPool,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventForm {
    club_id: i32,
    title: String,
    #[serde(default)]
    description: String,
    event_date: DateTime<Utc>,
    location: String,
    price: Option<f64>,
    max_attendees: Option<i32>,
    status: Option<EventStatus>,
    image_url: Option<String>,
    additional_info: Option<String>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = events, treat_none_as_null = true)]
struct EventFields {
    club_id: i32,
    title: String,
    description: String,
    event_date: DateTime<Utc>,
    location: String,
    price: f64,
    max_attendees: Option<i32>,
    status: String,
    image_url: Option<String>,
    additional_info: Option<String>,
}

impl EventForm {
    /// `status` is used when the form leaves the status out.
    fn validate(self, status: EventStatus) -> AppResult<EventFields> {
        validate::required("title", &self.title)?;
        validate::required("location", &self.location)?;
        validate::text("description", &self.description)?;
        validate::price(self.price)?;
        validate::max_attendees(self.max_attendees)?;

        Ok(EventFields {
            club_id: self.club_id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            event_date: self.event_date,
            location: self.location.trim().to_string(),
            price: self.price.unwrap_or(0.0),
            max_attendees: self.max_attendees,
            status: self.status.unwrap_or(status).to_string(),
            image_url: validate::non_blank(self.image_url)?,
            additional_info: validate::non_blank(self.additional_info)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    #[serde(flatten)]
    event: Event,
    club_name: String,
    is_free: bool,
    attendee_count: i64,
    star_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    joined: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starred: Option<bool>,
}

impl EventResponse {
    fn new(event: Event, club: Club, attendee_count: i64, star_count: i64) -> Self {
        Self {
            is_free: event.is_free(),
            event,
            club_name: club.name,
            attendee_count,
            star_count,
            joined: None,
            starred: None,
        }
    }
}

async fn count_attendees(
    conn: &mut AsyncPgConnection,
    ids: &[i32],
) -> AppResult<HashMap<i32, i64>> {
    Ok(event_attendees::table
        .filter(event_attendees::event_id.eq_any(ids.iter().copied()))
        .group_by(event_attendees::event_id)
        .select((event_attendees::event_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect())
}

async fn count_stars(conn: &mut AsyncPgConnection, ids: &[i32]) -> AppResult<HashMap<i32, i64>> {
    Ok(event_stars::table
        .filter(event_stars::event_id.eq_any(ids.iter().copied()))
        .group_by(event_stars::event_id)
        .select((event_stars::event_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect())
}

/// Attaches club names and attendee/star counts to events loaded with their club.
pub async fn load_events(
    conn: &mut AsyncPgConnection,
    rows: Vec<(Event, Club)>,
) -> AppResult<Vec<EventResponse>> {
    let ids = rows.iter().map(|(e, _)| e.id).collect::<Vec<_>>();
    let attendees = count_attendees(conn, &ids).await?;
    let stars = count_stars(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|(event, club)| {
            let attendee_count = attendees.get(&event.id).copied().unwrap_or(0);
            let star_count = stars.get(&event.id).copied().unwrap_or(0);
            EventResponse::new(event, club, attendee_count, star_count)
        })
        .collect())
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
enum PriceType {
    Free,
    Paid,
}

#[derive(Deserialize, Default)]
pub struct EventQuery {
    club_id: Option<i32>,
    club_type: Option<ClubType>,
    categories: Option<String>,
    status: Option<EventStatus>,
    price_type: Option<PriceType>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    q: Option<String>,
}

impl EventQuery {
    pub fn search(q: Option<String>) -> Self {
        Self {
            q,
            ..Self::default()
        }
    }
}

fn day_start(date: NaiveDate) -> AppResult<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::bad_request(format!("invalid date `{date}`")))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

pub async fn search_events(
    conn: &mut AsyncPgConnection,
    params: &EventQuery,
) -> AppResult<Vec<EventResponse>> {
    let categories = parse_list::<ClubType>(params.categories.as_deref())?;

    let mut query = events::table
        .inner_join(clubs::table)
        .order(events::event_date.asc())
        .into_boxed();

    if let Some(club_id) = params.club_id {
        query = query.filter(events::club_id.eq(club_id));
    }
    if let Some(club_type) = params.club_type {
        query = query.filter(clubs::club_type.eq(club_type.as_str()));
    }
    if !categories.is_empty() {
        query = query.filter(clubs::club_type.eq_any(categories.iter().map(|c| c.as_str())));
    }
    if let Some(status) = params.status {
        query = query.filter(events::status.eq(status.as_str()));
    }
    match params.price_type {
        Some(PriceType::Free) => query = query.filter(events::price.le(0.0)),
        Some(PriceType::Paid) => query = query.filter(events::price.gt(0.0)),
        None => {}
    }
    if let Some(from) = params.date_from {
        query = query.filter(events::event_date.ge(day_start(from)?));
    }
    if let Some(to) = params.date_to {
        let next = to
            .succ_opt()
            .ok_or_else(|| AppError::bad_request(format!("invalid date `{to}`")))?;
        query = query.filter(events::event_date.lt(day_start(next)?));
    }
    if let Some(pattern) = like_pattern(params.q.as_deref()) {
        query = query.filter(
            events::title
                .ilike(pattern.clone())
                .or(events::description.ilike(pattern.clone()))
                .or(events::location.ilike(pattern)),
        );
    }

    let rows = query.load::<(Event, Club)>(conn).await?;
    load_events(conn, rows).await
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Query(params): Query<EventQuery>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let conn = &mut pool.get().await?;
    Ok(Json(search_events(conn, &params).await?))
}

async fn find_event(conn: &mut AsyncPgConnection, event_id: i32) -> AppResult<Event> {
    events::table
        .find(event_id)
        .first::<Event>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the event does not exist"))
}

async fn attendee_count(conn: &mut AsyncPgConnection, event_id: i32) -> AppResult<i64> {
    Ok(event_attendees::table
        .filter(event_attendees::event_id.eq(event_id))
        .count()
        .get_result::<i64>(conn)
        .await?)
}

async fn star_count(conn: &mut AsyncPgConnection, event_id: i32) -> AppResult<i64> {
    Ok(event_stars::table
        .filter(event_stars::event_id.eq(event_id))
        .count()
        .get_result::<i64>(conn)
        .await?)
}

async fn detail(
    MaybeAuthUser(auth): MaybeAuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<EventResponse>> {
    let conn = &mut pool.get().await?;

    let row = events::table
        .inner_join(clubs::table)
        .filter(events::id.eq(event_id))
        .first::<(Event, Club)>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the event does not exist"))?;

    let mut event = load_events(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("event {event_id} vanished while loading counts"))?;

    if let Some(auth) = auth {
        let joined = diesel::select(diesel::dsl::exists(
            event_attendees::table
                .filter(event_attendees::event_id.eq(event_id))
                .filter(event_attendees::user_id.eq(auth.id)),
        ))
        .get_result::<bool>(conn)
        .await?;
        let starred = diesel::select(diesel::dsl::exists(
            event_stars::table
                .filter(event_stars::event_id.eq(event_id))
                .filter(event_stars::user_id.eq(auth.id)),
        ))
        .get_result::<bool>(conn)
        .await?;
        event.joined = Some(joined);
        event.starred = Some(starred);
    }

    Ok(Json(event))
}

async fn create(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Json(req): Json<EventForm>,
) -> AppResult<(StatusCode, Json<EventResponse>)> {
    auth.require(Role::Club)?;
    let fields = req.validate(EventStatus::Active)?;

    let conn = &mut pool.get().await?;
    let club = owned_club(conn, fields.club_id, &auth).await?;

    let event = diesel::insert_into(events::table)
        .values((events::created_by.eq(auth.id), fields))
        .get_result::<Event>(conn)
        .await?;
    info!(event_id = event.id, club_id = club.id, "event created");

    Ok((
        StatusCode::CREATED,
        Json(EventResponse::new(event, club, 0, 0)),
    ))
}

async fn edit(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
    Json(req): Json<EventForm>,
) -> AppResult<Json<EventResponse>> {
    let conn = &mut pool.get().await?;

    let existing = find_event(conn, event_id).await?;
    owned_club(conn, existing.club_id, &auth).await?;
    let fields = req.validate(existing.status.parse()?)?;
    // Moving an event requires owning the destination club too.
    let club = if fields.club_id == existing.club_id {
        find_club(conn, existing.club_id).await?
    } else {
        owned_club(conn, fields.club_id, &auth).await?
    };

    let event = diesel::update(events::table.find(event_id))
        .set((fields, events::updated_at.eq(Utc::now())))
        .get_result::<Event>(conn)
        .await?;
    info!(event_id, "event updated");

    let attendees = attendee_count(conn, event_id).await?;
    let stars = star_count(conn, event_id).await?;
    Ok(Json(EventResponse::new(event, club, attendees, stars)))
}

async fn remove(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<StatusCode> {
    let conn = &mut pool.get().await?;

    let event = find_event(conn, event_id).await?;
    owned_club(conn, event.club_id, &auth).await?;

    diesel::delete(events::table.find(event_id))
        .execute(conn)
        .await?;
    info!(event_id, "event deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceResponse {
    joined: bool,
    attendee_count: i64,
}

async fn attend(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<(StatusCode, Json<AttendanceResponse>)> {
    auth.require(Role::Regular)?;

    let conn = &mut pool.get().await?;
    let event = find_event(conn, event_id).await?;
    let already_joined = diesel::select(diesel::dsl::exists(
        event_attendees::table
            .filter(event_attendees::event_id.eq(event_id))
            .filter(event_attendees::user_id.eq(auth.id)),
    ))
    .get_result::<bool>(conn)
    .await?;
    let attendees = attendee_count(conn, event_id).await?;
    policy::ensure_event_joinable(&event, attendees, already_joined)?;

    let inserted = diesel::insert_into(event_attendees::table)
        .values((
            event_attendees::event_id.eq(event_id),
            event_attendees::user_id.eq(auth.id),
        ))
        .on_conflict((event_attendees::event_id, event_attendees::user_id))
        .do_nothing()
        .execute(conn)
        .await?;
    if inserted == 0 {
        return Err(AppError::conflict("You have already joined this event"));
    }
    info!(event_id, user_id = auth.id, "joined event");

    Ok((
        StatusCode::CREATED,
        Json(AttendanceResponse {
            joined: true,
            attendee_count: attendee_count(conn, event_id).await?,
        }),
    ))
}

async fn unattend(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<AttendanceResponse>> {
    let conn = &mut pool.get().await?;

    let removed = diesel::delete(
        event_attendees::table
            .filter(event_attendees::event_id.eq(event_id))
            .filter(event_attendees::user_id.eq(auth.id)),
    )
    .execute(conn)
    .await?;
    if removed == 0 {
        return Err(AppError::not_found("You have not joined this event"));
    }
    info!(event_id, user_id = auth.id, "left event");

    Ok(Json(AttendanceResponse {
        joined: false,
        attendee_count: attendee_count(conn, event_id).await?,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StarResponse {
    starred: bool,
    star_count: i64,
}

async fn toggle_star(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<StarResponse>> {
    auth.require(Role::Regular)?;

    let conn = &mut pool.get().await?;
    find_event(conn, event_id).await?;

    let unstarred = diesel::delete(
        event_stars::table
            .filter(event_stars::event_id.eq(event_id))
            .filter(event_stars::user_id.eq(auth.id)),
    )
    .execute(conn)
    .await?;
    if unstarred == 0 {
        diesel::insert_into(event_stars::table)
            .values((
                event_stars::event_id.eq(event_id),
                event_stars::user_id.eq(auth.id),
            ))
            .on_conflict((event_stars::event_id, event_stars::user_id))
            .do_nothing()
            .execute(conn)
            .await?;
    }

    Ok(Json(StarResponse {
        starred: unstarred == 0,
        star_count: star_count(conn, event_id).await?,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareResponse {
    share_count: i32,
}

async fn share(
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<ShareResponse>> {
    let conn = &mut pool.get().await?;

    let share_count = diesel::update(events::table.find(event_id))
        .set(events::share_count.eq(events::share_count + 1))
        .returning(events::share_count)
        .get_result::<i32>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the event does not exist"))?;

    Ok(Json(ShareResponse { share_count }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:event_id", get(detail).put(edit).delete(remove))
        .route("/:event_id/attendance", post(attend).delete(unattend))
        .route("/:event_id/star", post(toggle_star))
        .route("/:event_id/share", post(share))
}
