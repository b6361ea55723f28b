//! Required-field and range checks for submitted forms.

use crate::{
    error::{AppError, AppResult},
    models::ClubType,
};
use lettre::Address;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_ATTENDEES: i32 = 1000;

/// Postgres refuses NUL in text columns, so catch it before the insert does.
pub fn text(field: &'static str, value: &str) -> AppResult<()> {
    if value.contains('\0') {
        return Err(AppError::bad_request(format!(
            "{field} cannot contain NUL characters"
        )));
    }
    Ok(())
}

pub fn required(field: &'static str, value: &str) -> AppResult<()> {
    text(field, value)?;
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

pub fn email(field: &'static str, value: &str) -> AppResult<()> {
    required(field, value)?;
    value
        .trim()
        .parse::<Address>()
        .map(|_| ())
        .map_err(|_| AppError::bad_request(format!("{field} is not a valid email address")))
}

pub fn password(value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// Returns the custom type to store: required for `other`, dropped for every other type.
pub fn custom_type(club_type: ClubType, custom: Option<String>) -> AppResult<Option<String>> {
    match (club_type, non_blank(custom)?) {
        (ClubType::Other, None) => Err(AppError::bad_request(
            "custom type is required when club type is `other`",
        )),
        (ClubType::Other, custom) => Ok(custom),
        _ => Ok(None),
    }
}

pub fn max_attendees(value: Option<i32>) -> AppResult<()> {
    match value {
        Some(n) if !(1..=MAX_ATTENDEES).contains(&n) => Err(AppError::bad_request(format!(
            "max attendees must be between 1 and {MAX_ATTENDEES}"
        ))),
        _ => Ok(()),
    }
}

pub fn price(value: Option<f64>) -> AppResult<()> {
    match value {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(AppError::bad_request("price cannot be negative"))
        }
        _ => Ok(()),
    }
}

/// Optional form fields arrive as empty strings, store those as NULL.
pub fn non_blank(value: Option<String>) -> AppResult<Option<String>> {
    if let Some(v) = &value {
        text("text field", v)?;
    }
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Joins interests into the stored comma list, `None` when nothing is left.
pub fn interests(values: &[String]) -> AppResult<Option<String>> {
    let mut kept = Vec::with_capacity(values.len());
    for value in values {
        text("interests", value)?;
        let value = value.trim();
        if !value.is_empty() {
            kept.push(value);
        }
    }
    non_blank(Some(kept.join(",")))
}
