//! Board members and achievements: display-only records hanging off a club.
//! Anyone can read them, only the club owner can change them.

use super::club::{find_club, owned_club};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Achievement, BoardMember},
    schema::*,
    validate, DbPool,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMemberForm {
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub year_in_college: Option<String>,
    pub joined_date: Option<NaiveDate>,
    pub photo_url: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = board_members)]
pub struct BoardMemberFields {
    name: String,
    position: Option<String>,
    email: Option<String>,
    year_in_college: Option<String>,
    // NULL here falls back to the column default, today
    joined_date: Option<NaiveDate>,
    photo_url: Option<String>,
}

impl BoardMemberForm {
    pub fn validate(self) -> AppResult<BoardMemberFields> {
        validate::required("board member name", &self.name)?;
        let email = validate::non_blank(self.email)?;
        if let Some(email) = &email {
            validate::email("board member email", email)?;
        }

        Ok(BoardMemberFields {
            name: self.name.trim().to_string(),
            position: validate::non_blank(self.position)?,
            email,
            year_in_college: validate::non_blank(self.year_in_college)?,
            joined_date: self.joined_date,
            photo_url: validate::non_blank(self.photo_url)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementForm {
    pub title: String,
    pub description: Option<String>,
    pub date_achieved: Option<NaiveDate>,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = achievements, treat_none_as_null = true)]
pub struct AchievementFields {
    title: String,
    description: Option<String>,
    date_achieved: Option<NaiveDate>,
}

impl AchievementForm {
    pub fn validate(self) -> AppResult<AchievementFields> {
        validate::required("achievement title", &self.title)?;

        Ok(AchievementFields {
            title: self.title.trim().to_string(),
            description: validate::non_blank(self.description)?,
            date_achieved: self.date_achieved,
        })
    }
}

pub async fn insert_board_members(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    members: Vec<BoardMemberFields>,
) -> AppResult<Vec<BoardMember>> {
    let mut inserted = Vec::with_capacity(members.len());
    for member in members {
        inserted.push(
            diesel::insert_into(board_members::table)
                .values((board_members::club_id.eq(club_id), member))
                .get_result::<BoardMember>(conn)
                .await?,
        );
    }
    Ok(inserted)
}

pub async fn insert_achievements(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    achievements: Vec<AchievementFields>,
) -> AppResult<Vec<Achievement>> {
    let mut inserted = Vec::with_capacity(achievements.len());
    for achievement in achievements {
        inserted.push(
            diesel::insert_into(achievements::table)
                .values((achievements::club_id.eq(club_id), achievement))
                .get_result::<Achievement>(conn)
                .await?,
        );
    }
    Ok(inserted)
}

async fn list_board_members(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<BoardMember>>> {
    let conn = &mut pool.get().await?;
    find_club(conn, club_id).await?;

    Ok(Json(
        board_members::table
            .filter(board_members::club_id.eq(club_id))
            .order(board_members::joined_date.asc())
            .load::<BoardMember>(conn)
            .await?,
    ))
}

async fn create_board_member(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    Json(req): Json<BoardMemberForm>,
) -> AppResult<(StatusCode, Json<BoardMember>)> {
    let fields = req.validate()?;

    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let mut members = insert_board_members(conn, club_id, vec![fields]).await?;
    let member = members
        .pop()
        .ok_or_else(|| anyhow::anyhow!("board member insert returned no row"))?;
    info!(club_id, member_id = member.id, "board member added");

    Ok((StatusCode::CREATED, Json(member)))
}

async fn find_board_member(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    member_id: i32,
) -> AppResult<BoardMember> {
    board_members::table
        .filter(board_members::club_id.eq(club_id))
        .filter(board_members::id.eq(member_id))
        .first::<BoardMember>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the board member does not exist"))
}

async fn edit_board_member(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, member_id)): Path<(i32, i32)>,
    Json(req): Json<BoardMemberForm>,
) -> AppResult<Json<BoardMember>> {
    let fields = req.validate()?;

    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;
    let existing = find_board_member(conn, club_id, member_id).await?;

    let member = diesel::update(board_members::table.find(existing.id))
        .set((
            board_members::name.eq(fields.name),
            board_members::position.eq(fields.position),
            board_members::email.eq(fields.email),
            board_members::year_in_college.eq(fields.year_in_college),
            board_members::joined_date.eq(fields.joined_date.unwrap_or(existing.joined_date)),
            board_members::photo_url.eq(fields.photo_url),
            board_members::updated_at.eq(Utc::now()),
        ))
        .get_result::<BoardMember>(conn)
        .await?;
    info!(club_id, member_id, "board member updated");

    Ok(Json(member))
}

async fn remove_board_member(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, member_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;
    let member = find_board_member(conn, club_id, member_id).await?;

    diesel::delete(board_members::table.find(member.id))
        .execute(conn)
        .await?;
    info!(club_id, member_id, "board member removed");

    Ok(StatusCode::NO_CONTENT)
}

async fn list_achievements(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<Achievement>>> {
    let conn = &mut pool.get().await?;
    find_club(conn, club_id).await?;

    Ok(Json(
        achievements::table
            .filter(achievements::club_id.eq(club_id))
            .order(achievements::date_achieved.desc())
            .load::<Achievement>(conn)
            .await?,
    ))
}

async fn create_achievement(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    Json(req): Json<AchievementForm>,
) -> AppResult<(StatusCode, Json<Achievement>)> {
    let fields = req.validate()?;

    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;

    let mut achievements = insert_achievements(conn, club_id, vec![fields]).await?;
    let achievement = achievements
        .pop()
        .ok_or_else(|| anyhow::anyhow!("achievement insert returned no row"))?;
    info!(club_id, achievement_id = achievement.id, "achievement added");

    Ok((StatusCode::CREATED, Json(achievement)))
}

async fn find_achievement(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    achievement_id: i32,
) -> AppResult<Achievement> {
    achievements::table
        .filter(achievements::club_id.eq(club_id))
        .filter(achievements::id.eq(achievement_id))
        .first::<Achievement>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("the achievement does not exist"))
}

async fn edit_achievement(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, achievement_id)): Path<(i32, i32)>,
    Json(req): Json<AchievementForm>,
) -> AppResult<Json<Achievement>> {
    let fields = req.validate()?;

    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;
    let existing = find_achievement(conn, club_id, achievement_id).await?;

    let achievement = diesel::update(achievements::table.find(existing.id))
        .set((fields, achievements::updated_at.eq(Utc::now())))
        .get_result::<Achievement>(conn)
        .await?;
    info!(club_id, achievement_id, "achievement updated");

    Ok(Json(achievement))
}

async fn remove_achievement(
    auth: AuthUser,
    Extension(pool): Extension<DbPool>,
    Path((club_id, achievement_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    let conn = &mut pool.get().await?;
    owned_club(conn, club_id, &auth).await?;
    let achievement = find_achievement(conn, club_id, achievement_id).await?;

    diesel::delete(achievements::table.find(achievement.id))
        .execute(conn)
        .await?;
    info!(club_id, achievement_id, "achievement removed");

    Ok(StatusCode::NO_CONTENT)
}

pub fn app() -> Router {
    Router::new()
        .route(
            "/:club_id/board-members",
            get(list_board_members).post(create_board_member),
        )
        .route(
            "/:club_id/board-members/:member_id",
            put(edit_board_member).delete(remove_board_member),
        )
        .route(
            "/:club_id/achievements",
            get(list_achievements).post(create_achievement),
        )
        .route(
            "/:club_id/achievements/:achievement_id",
            put(edit_achievement).delete(remove_achievement),
        )
}
