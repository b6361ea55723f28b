use super::{
    club::{insert_club, ClubForm},
    profile::ProfileResponse,
};
use crate::{
    auth::{self, Keys},
    error::{AppError, AppResult},
    models::{Profile, Role},
    schema::*,
    validate, DbPool,
};
use axum::{http::StatusCode, routing::post, Extension, Json, Router};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Required for club accounts, the club is created along with the profile.
    pub club: Option<ClubForm>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Account type picked on the sign-in form.
    pub role: Option<Role>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    pub token: String,
    pub profile: ProfileResponse,
}

impl AuthorizedResponse {
    fn from_profile(keys: &Keys, profile: Profile) -> AppResult<AuthorizedResponse> {
        let role = profile.role()?;
        Ok(AuthorizedResponse {
            token: keys.generate_jwt(profile.id, role)?,
            profile: ProfileResponse::from(profile),
        })
    }
}

async fn signup(
    Extension(pool): Extension<DbPool>,
    Extension(keys): Extension<Arc<Keys>>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthorizedResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = profiles)]
    struct NewProfile {
        email: String,
        password_hash: String,
        full_name: Option<String>,
        role: String,
        interests: Option<String>,
    }

    validate::email("email", &req.email)?;
    validate::password(&req.password)?;
    validate::required("full name", &req.full_name)?;

    let club = match (req.role, req.club) {
        (Role::Club, Some(club)) => Some(club.validate()?),
        (Role::Club, None) => {
            return Err(AppError::bad_request(
                "Please fill in all required club details",
            ))
        }
        (Role::Regular, _) => None,
    };

    let new_profile = NewProfile {
        email: req.email.trim().to_lowercase(),
        password_hash: auth::hash_password(req.password)?,
        full_name: validate::non_blank(Some(req.full_name))?,
        role: req.role.to_string(),
        interests: validate::interests(&req.interests)?,
    };

    let conn = &mut pool.get().await?;

    // The profile and its club are written together.
    let new_profile = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let Some(profile) = diesel::insert_into(profiles::table)
                    .values(new_profile)
                    .on_conflict(profiles::email)
                    .do_nothing()
                    .get_result::<Profile>(conn)
                    .await
                    .optional()? else {
                    return Err(AppError::conflict("an account with this email already exists"));
                };

                if let Some(club) = club {
                    let club = insert_club(conn, profile.id, club).await?;
                    info!(profile_id = profile.id, club_id = club.id, "club created at signup");
                }
                Ok::<_, AppError>(profile)
            })
        })
        .await?;
    info!(profile_id = new_profile.id, role = %req.role, "profile registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthorizedResponse::from_profile(&keys, new_profile)?),
    ))
}

async fn login(
    Extension(pool): Extension<DbPool>,
    Extension(keys): Extension<Arc<Keys>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let conn = &mut pool.get().await?;

    let profile = profiles::table
        .filter(profiles::email.eq(req.email.trim().to_lowercase()))
        .first::<Profile>(conn)
        .await
        .optional()?;

    let Some(profile) = profile else {
        return Err(AppError::from(
            StatusCode::UNAUTHORIZED,
            "invalid email or password",
        ));
    };
    if !auth::verify_password(req.password, &profile.password_hash)? {
        return Err(AppError::from(
            StatusCode::UNAUTHORIZED,
            "invalid email or password",
        ));
    }

    let role = profile.role()?;
    if let Some(expected) = req.role {
        if expected != role {
            return Err(AppError::forbidden(format!(
                "This account is registered as a {role} user. Please select the correct account type."
            )));
        }
    }

    Ok(Json(AuthorizedResponse::from_profile(&keys, profile)?))
}

pub fn app() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
