use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    status: code.as_u16(),
                    message: s,
                }),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn bad_request(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::BAD_REQUEST, s)
    }

    pub fn forbidden(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::FORBIDDEN, s)
    }

    pub fn not_found(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, s)
    }

    pub fn conflict(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::CONFLICT, s)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ResponseStatusError(code, _) => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InternalServerError(_) => "Internal Server Error",
            AppError::ResponseStatusError(_, s) => s.as_ref(),
        }
    }

    /// Maps a unique constraint violation to `409 Conflict`, anything else stays internal.
    pub fn unique_violation(err: DieselError, s: impl Into<Cow<'static, str>>) -> AppError {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::conflict(s)
            }
            err => AppError::InternalServerError(err.into()),
        }
    }
}
