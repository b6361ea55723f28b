use super::MessageResponse;
use crate::{
    auth,
    email::Mailer,
    error::{AppError, AppResult},
    models::Profile,
    schema::*,
    validate, DbPool,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use lettre::{message::Mailbox, Address, Message};
use nanoid::nanoid;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

// 1 hour
const RESET_ALLOWED_TIME: Duration = Duration::from_secs(60 * 60);

/// Outstanding reset links, keyed by the random id in the link.
struct Resets {
    ttl: Duration,
    pending: HashMap<String, (Instant, i32)>,
}

impl Resets {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: HashMap::new(),
        }
    }

    fn insert(&mut self, uid: String, profile_id: i32) {
        let ttl = self.ttl;
        self.pending.retain(|_, (issued, _)| issued.elapsed() < ttl);
        self.pending.insert(uid, (Instant::now(), profile_id));
    }

    /// Returns the profile the link was issued for, dropping it once expired.
    fn check(&mut self, uid: &str) -> AppResult<i32> {
        let Some(&(issued, profile_id)) = self.pending.get(uid) else {
            return Err(AppError::from(
                StatusCode::UNAUTHORIZED,
                "invalid password reset url",
            ));
        };
        if issued.elapsed() >= self.ttl {
            self.pending.remove(uid);
            return Err(AppError::from(
                StatusCode::UNAUTHORIZED,
                "password reset expired",
            ));
        }
        Ok(profile_id)
    }

    /// Like `check`, but the link can't be used again.
    fn redeem(&mut self, uid: &str) -> AppResult<i32> {
        let profile_id = self.check(uid)?;
        self.pending.remove(uid);
        Ok(profile_id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PwdRequest {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPwdRequest {
    password: String,
}

async fn password_request(
    Extension(pool): Extension<DbPool>,
    Extension(mailer): Extension<Option<Arc<Mailer>>>,
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Json(req): Json<PwdRequest>,
) -> AppResult<Json<MessageResponse>> {
    let Some(mailer) = mailer else {
        return Err(AppError::from(
            StatusCode::SERVICE_UNAVAILABLE,
            "password reset emails are not configured",
        ));
    };
    validate::email("email", &req.email)?;

    let conn = &mut pool.get().await?;

    let Some(profile) = profiles::table
        .filter(profiles::email.eq(req.email.trim().to_lowercase()))
        .first::<Profile>(conn)
        .await
        .optional()? else {
        return Err(AppError::not_found("could not find a matching account"));
    };

    let uid = nanoid!();
    let link = format!("{}/password/{}", mailer.frontend_host, uid);
    let name = profile.full_name.clone().unwrap_or_else(|| profile.email.clone());
    let body = format!(
        r"Hi {},

We have received a request to change your Campus Club Hub password. To reset your password, please click the below link within the next {} minutes (or paste it into your browser if clicking is not working):

{}

If you did not request this password reset you can disregard this message and your password will remain unchanged.

Thanks,
The Campus Club Hub Team.",
        name,
        RESET_ALLOWED_TIME.as_secs() / 60,
        link
    );

    let destination = profile
        .email
        .parse::<Address>()
        .map_err(|_| AppError::bad_request("invalid email"))?;
    let email = Message::builder()
        .from(mailer.from.clone())
        .to(Mailbox::new(Some(name), destination))
        .subject("Campus Club Hub Password Reset")
        .body(body)?;

    if let Err(e) = mailer.send(email).await {
        warn!(error = %e, profile_id = profile.id, "failed to send password reset email");
        return Err(AppError::from(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to send email",
        ));
    }

    resets.lock().await.insert(uid, profile.id);
    info!(profile_id = profile.id, "password reset requested");

    Ok(MessageResponse::new("Password reset email sent"))
}

async fn password_reset(
    Extension(pool): Extension<DbPool>,
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Path(uid): Path<String>,
    Json(req): Json<NewPwdRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate::password(&req.password)?;
    let password_hash = auth::hash_password(req.password)?;

    let profile_id = resets.lock().await.redeem(&uid)?;

    let conn = &mut pool.get().await?;
    diesel::update(profiles::table.find(profile_id))
        .set((
            profiles::password_hash.eq(password_hash),
            profiles::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;
    info!(profile_id, "password reset");

    Ok(MessageResponse::new("Password has been reset"))
}

async fn check_uid(
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Path(uid): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    resets.lock().await.check(&uid)?;
    Ok(MessageResponse::new("Password reset link is valid"))
}

pub fn app() -> Router {
    let shared_resets = Arc::new(Mutex::new(Resets::new(RESET_ALLOWED_TIME)));

    Router::new()
        .route("/reset", post(password_request))
        .route("/:uid", get(check_uid).post(password_reset))
        .layer(Extension(shared_resets))
}
