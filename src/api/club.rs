use super::{
    board::{insert_achievements, insert_board_members, AchievementForm, BoardMemberForm},
    like_pattern, parse_list, MessageResponse,
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        Achievement, ApplicationStatus, BoardMember, Club, ClubApplication, ClubMember, ClubType,
        Event, EventStatus, Profile, Role,
    },
    policy,
    schema::*,
    validate, DbPool,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Club fields as submitted by the create, edit and signup forms.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub club_type: ClubType,
    pub custom_type: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
}

impl ClubForm {
    pub fn validate(self) -> AppResult<ClubFields> {
        validate::required("club name", &self.name)?;
        validate::required("description", &self.description)?;
        validate::email("contact email", &self.contact_email)?;
        let custom_type = validate::custom_type(self.club_type, self.custom_type)?;

        Ok(ClubFields {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            club_type: self.club_type.to_string(),
            custom_type,
            contact_email: self.contact_email.trim().to_string(),
            contact_phone: validate::non_blank(self.contact_phone)?,
            website: validate::non_blank(self.website)?,
            logo_url: validate::non_blank(self.logo_url)?,
        })
    }
}

/// A validated [`ClubForm`], ready to be written.
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = clubs, treat_none_as_null = true)]
pub struct ClubFields {
    name: String,
    description: String,
    club_type: String,
    custom_type: Option<String>,
    contact_email: String,
    contact_phone: Option<String>,
    website: Option<String>,
    logo_url: Option<String>,
}

pub async fn insert_club(
    conn: &mut AsyncPgConnection,
    owner_id: i32,
    fields: ClubFields,
) -> AppResult<Club> {
    Ok(diesel::insert_into(clubs::table)
        .values((clubs::owner_id.eq(owner_id), fields))
        .get_result::<Club>(conn)
        .await?)
}

pub async fn find_club(conn: &mut AsyncPgConnection, club_id: i32) -> AppResult<Club> {
    clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the club does not exist"))
}

/// Loads the club and checks the caller owns it.
pub async fn owned_club(conn: &mut AsyncPgConnection, club_id: i32, auth: &AuthUser) -> AppResult<Club> {
    let club = find_club(conn, club_id).await?;
    policy::ensure_club_owner(&club, auth.id)?;
    Ok(club)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubSummary {
    #[serde(flatten)]
    club: Club,
    event_count: i64,
    member_count: i64,
}

async fn count_events(conn: &mut AsyncPgConnection, ids: &[i32]) -> AppResult<HashMap<i32, i64>> {
    Ok(events::table
        .filter(events::club_id.eq_any(ids.iter().copied()))
        .group_by(events::club_id)
        .select((events::club_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect())
}

async fn count_members(conn: &mut AsyncPgConnection, ids: &[i32]) -> AppResult<HashMap<i32, i64>> {
    Ok(club_members::table
        .filter(club_members::club_id.eq_any(ids.iter().copied()))
        .group_by(club_members::club_id)
        .select((club_members::club_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect())
}

pub async fn load_clubs(conn: &mut AsyncPgConnection, clubs: Vec<Club>) -> AppResult<Vec<ClubSummary>> {
    let ids = clubs.iter().map(|c| c.id).collect::<Vec<_>>();
    let events = count_events(conn, &ids).await?;
    let members = count_members(conn, &ids).await?;

    Ok(clubs
        .into_iter()
        .map(|club| ClubSummary {
            event_count: events.get(&club.id).copied().unwrap_or(0),
            member_count: members.get(&club.id).copied().unwrap_or(0),
            club,
        })
        .collect())
}

#[derive(Deserialize, Default)]
pub struct ClubQuery {
    club_type: Option<ClubType>,
    categories: Option<String>,
    q: Option<String>,
    min_events: Option<i64>,
    min_members: Option<i64>,
}

pub async fn search_clubs(
    conn: &mut AsyncPgConnection,
    params: &ClubQuery,
) -> AppResult<Vec<ClubSummary>> {
    let categories = parse_list::<ClubType>(params.categories.as_deref())?;

    let mut query = clubs::table.order(clubs::created_at.desc()).into_boxed();
    if let Some(club_type) = params.club_type {
        query = query.filter(clubs::club_type.eq(club_type.as_str()));
    }
    if !categories.is_empty() {
        query = query.filter(clubs::club_type.eq_any(categories.iter().map(|c| c.as_str())));
    }
    if let Some(pattern) = like_pattern(params.q.as_deref()) {
        query = query.filter(
            clubs::name
                .ilike(pattern.clone())
                .or(clubs::description.ilike(pattern)),
        );
    }

    let clubs = query.load::<Club>(conn).await?;
    let min_events = params.min_events.unwrap_or(0);
    let min_members = params.min_members.unwrap_or(0);

    Ok(load_clubs(conn, clubs)
        .await?
        .into_iter()
        .filter(|c| c.event_count >= min_events && c.member_count >= min_members)
        .collect())
}

impl ClubQuery {
    pub fn search(q: Option<String>) -> Self {
        Self {
            q,
            ..Self::default()
        }
    }
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Query(params): Query<ClubQuery>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let conn = &mut pool.get().await?;
    Ok(Json(search_clubs(conn, &params).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubResponse {
    #[serde(flatten)]
    club: Club,
    board_members: Vec<BoardMember>,
    achievements: Vec<Achievement>,
    event_count: i64,
    member_count: i64,
}

async fn info(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClubResponse>> {
    let conn = &mut pool.get().await?;

    let club = find_club(conn, club_id).await?;
    let board_members = BoardMember::belonging_to(&club)
        .order(board_members::joined_date.asc())
        .load::<BoardMember>(conn)
        .await?;
    let achievements = Achievement::belonging_to(&club)
        .order(achievements::date_achieved.desc())
        .load::<Achievement>(conn)
        .await?;
    let event_count = Event::belonging_to(&club)
        .count()
        .get_result::<i64>(conn)
        .await?;
    let member_count = ClubMember::belonging_to(&club)
        .count()
        .get_result::<i64>(conn)
        .await?;

    Ok(Json(ClubResponse {
        club,
        board_members,
        achievements,
        event_count,
        member_count,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClubCreateRequest {
    #[serde(flatten)]
    club: ClubForm,
    #[serde(default)]
    board_members: Vec<BoardMemberForm>,
    #[serde(default)]
    achievements: Vec<AchievementForm>,
}

async fn create(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Json(req): Json<ClubCreateRequest>,
) -> AppResult<(StatusCode, Json<ClubResponse>)> {
    auth.require(Role::Club)?;

    let fields = req.club.validate()?;
    let board_members = req
        .board_members
        .into_iter()
        .map(BoardMemberForm::validate)
        .collect::<AppResult<Vec<_>>>()?;
    let achievements = req
        .achievements
        .into_iter()
        .map(AchievementForm::validate)
        .collect::<AppResult<Vec<_>>>()?;

    let conn = &mut pool.get().await?;

    let owner_id = auth.id;
    let (club, board_members, achievements) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let club = insert_club(conn, owner_id, fields).await?;
                let board_members = insert_board_members(conn, club.id, board_members).await?;
                let achievements = insert_achievements(conn, club.id, achievements).await?;
                Ok::<_, AppError>((club, board_members, achievements))
            })
        })
        .await?;
    info!(club_id = club.id, owner_id = auth.id, "club created");

    Ok((
        StatusCode::CREATED,
        Json(ClubResponse {
            club,
            board_members,
            achievements,
            event_count: 0,
            member_count: 0,
        }),
    ))
}

async fn edit(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    Json(req): Json<ClubForm>,
) -> AppResult<Json<Club>> {
    let fields = req.validate()?;

    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let club = diesel::update(clubs::table.find(club_id))
        .set((fields, clubs::updated_at.eq(Utc::now())))
        .get_result::<Club>(conn)
        .await?;
    info!(club_id, "club updated");

    Ok(Json(club))
}

async fn remove(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<StatusCode> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    diesel::delete(clubs::table.find(club_id))
        .execute(conn)
        .await?;
    info!(club_id, "club deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStats {
    applications: i64,
    pending_applications: i64,
    events: usize,
    active_events: usize,
    achievements: usize,
    board_members: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    club: Club,
    stats: DashboardStats,
    events: Vec<Event>,
    achievements: Vec<Achievement>,
    board_members: Vec<BoardMember>,
}

async fn dashboard(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<DashboardResponse>> {
    let conn = &mut pool.get().await?;
    let club = owned_club(conn, club_id, &auth).await?;

    let statuses = club_applications::table
        .filter(club_applications::club_id.eq(club_id))
        .select(club_applications::status)
        .load::<String>(conn)
        .await?;
    let events = Event::belonging_to(&club)
        .order(events::event_date.desc())
        .load::<Event>(conn)
        .await?;
    let achievements = Achievement::belonging_to(&club)
        .order(achievements::date_achieved.desc())
        .load::<Achievement>(conn)
        .await?;
    let board_members = BoardMember::belonging_to(&club)
        .order(board_members::joined_date.asc())
        .load::<BoardMember>(conn)
        .await?;

    let stats = DashboardStats {
        applications: statuses.len() as i64,
        pending_applications: statuses
            .iter()
            .filter(|s| s.as_str() == ApplicationStatus::Pending.as_str())
            .count() as i64,
        events: events.len(),
        active_events: events
            .iter()
            .filter(|e| e.status == EventStatus::Active.as_str())
            .count(),
        achievements: achievements.len(),
        board_members: board_members.len(),
    };

    Ok(Json(DashboardResponse {
        club,
        stats,
        events,
        achievements,
        board_members,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberResponse {
    user_id: i32,
    full_name: Option<String>,
    email: String,
    joined_at: DateTime<Utc>,
}

async fn members(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<MemberResponse>>> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let members = club_members::table
        .inner_join(profiles::table)
        .filter(club_members::club_id.eq(club_id))
        .order(club_members::created_at.asc())
        .load::<(ClubMember, Profile)>(conn)
        .await?;

    Ok(Json(
        members
            .into_iter()
            .map(|(member, profile)| MemberResponse {
                user_id: member.user_id,
                full_name: profile.full_name,
                email: profile.email,
                joined_at: member.created_at,
            })
            .collect(),
    ))
}

async fn join(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let conn = &mut pool.get().await?;
    let club = find_club(conn, club_id).await?;
    policy::ensure_can_join_club(auth.role, &club, auth.id)?;

    let inserted = diesel::insert_into(club_members::table)
        .values((
            club_members::club_id.eq(club_id),
            club_members::user_id.eq(auth.id),
        ))
        .on_conflict((club_members::club_id, club_members::user_id))
        .do_nothing()
        .execute(conn)
        .await?;
    if inserted == 0 {
        return Err(AppError::conflict("you are already a member of this club"));
    }
    info!(club_id, user_id = auth.id, "joined club");

    Ok((
        StatusCode::CREATED,
        MessageResponse::new("Successfully joined the club"),
    ))
}

async fn leave(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    let removed = diesel::delete(
        club_members::table
            .filter(club_members::club_id.eq(club_id))
            .filter(club_members::user_id.eq(auth.id)),
    )
    .execute(conn)
    .await?;
    if removed == 0 {
        return Err(AppError::not_found("you are not a member of this club"));
    }
    info!(club_id, user_id = auth.id, "left club");

    Ok(MessageResponse::new("Successfully left the club"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest {
    application_message: Option<String>,
}

async fn apply(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    Json(req): Json<ApplyRequest>,
) -> AppResult<(StatusCode, Json<ClubApplication>)> {
    let conn = &mut pool.get().await?;
    let club = find_club(conn, club_id).await?;

    let already_member = diesel::select(diesel::dsl::exists(
        club_members::table
            .filter(club_members::club_id.eq(club_id))
            .filter(club_members::user_id.eq(auth.id)),
    ))
    .get_result::<bool>(conn)
    .await?;
    let has_pending = diesel::select(diesel::dsl::exists(
        club_applications::table
            .filter(club_applications::club_id.eq(club_id))
            .filter(club_applications::user_id.eq(auth.id))
            .filter(club_applications::status.eq(ApplicationStatus::Pending.as_str())),
    ))
    .get_result::<bool>(conn)
    .await?;
    policy::ensure_can_apply(auth.role, &club, auth.id, already_member, has_pending)?;
    let message = validate::non_blank(req.application_message)?;

    let application = diesel::insert_into(club_applications::table)
        .values((
            club_applications::club_id.eq(club_id),
            club_applications::user_id.eq(auth.id),
            club_applications::application_message.eq(message),
            club_applications::status.eq(ApplicationStatus::Pending.as_str()),
        ))
        .get_result::<ClubApplication>(conn)
        .await
        .map_err(|e| {
            AppError::unique_violation(e, "you already have a pending application for this club")
        })?;
    info!(club_id, user_id = auth.id, application_id = application.id, "club application submitted");

    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationResponse {
    #[serde(flatten)]
    application: ClubApplication,
    applicant_name: Option<String>,
    applicant_email: String,
}

async fn applications(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<ApplicationResponse>>> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let applications = club_applications::table
        .inner_join(profiles::table)
        .filter(club_applications::club_id.eq(club_id))
        .order(club_applications::created_at.desc())
        .load::<(ClubApplication, Profile)>(conn)
        .await?;

    Ok(Json(
        applications
            .into_iter()
            .map(|(application, profile)| ApplicationResponse {
                application,
                applicant_name: profile.full_name,
                applicant_email: profile.email,
            })
            .collect(),
    ))
}

async fn find_application(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    application_id: i32,
) -> AppResult<ClubApplication> {
    club_applications::table
        .filter(club_applications::club_id.eq(club_id))
        .filter(club_applications::id.eq(application_id))
        .first::<ClubApplication>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the application does not exist"))
}

#[derive(Deserialize)]
struct DecisionRequest {
    status: ApplicationStatus,
}

async fn decide(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, application_id)): Path<(i32, i32)>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<ClubApplication>> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let application = find_application(conn, club_id, application_id).await?;
    let status = policy::decide_application(application.status.parse()?, req.status)?;

    let application = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let application = diesel::update(club_applications::table.find(application.id))
                    .set((
                        club_applications::status.eq(status.as_str()),
                        club_applications::updated_at.eq(Utc::now()),
                    ))
                    .get_result::<ClubApplication>(conn)
                    .await?;

                if status == ApplicationStatus::Approved {
                    diesel::insert_into(club_members::table)
                        .values((
                            club_members::club_id.eq(club_id),
                            club_members::user_id.eq(application.user_id),
                        ))
                        .on_conflict((club_members::club_id, club_members::user_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }
                Ok::<_, AppError>(application)
            })
        })
        .await?;
    info!(club_id, application_id, %status, "club application decided");

    Ok(Json(application))
}

async fn withdraw(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, application_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    let conn = &mut pool.get().await?;

    let application = find_application(conn, club_id, application_id).await?;
    policy::ensure_can_withdraw(&application, auth.id)?;

    diesel::delete(club_applications::table.find(application.id))
        .execute(conn)
        .await?;
    info!(club_id, application_id, "club application withdrawn");

    Ok(StatusCode::NO_CONTENT)
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:club_id", get(info).put(edit).delete(remove))
        .route("/:club_id/dashboard", get(dashboard))
        .route("/:club_id/members", get(members))
        .route("/:club_id/membership", post(join).delete(leave))
        .route("/:club_id/applications", get(applications).post(apply))
        .route(
            "/:club_id/applications/:application_id",
            put(decide).delete(withdraw),
        )
}
