//! Who may create, edit, join or delete what.
//!
//! Everything here is a pure check over rows already loaded by a handler, so a
//! handler loads, asks the policy, and only then writes.

use crate::{
    error::{AppError, AppResult},
    models::{ApplicationStatus, Club, ClubApplication, Event, EventStatus, Role},
};

pub fn require_role(actual: Role, required: Role) -> AppResult<()> {
    if actual == required {
        return Ok(());
    }
    Err(AppError::forbidden(match required {
        Role::Club => "only club accounts can perform this action",
        Role::Regular => "only regular accounts can perform this action",
    }))
}

pub fn ensure_club_owner(club: &Club, user_id: i32) -> AppResult<()> {
    if club.owner_id == user_id {
        Ok(())
    } else {
        Err(AppError::forbidden("you can only manage your own clubs"))
    }
}

pub fn ensure_can_join_club(role: Role, club: &Club, user_id: i32) -> AppResult<()> {
    if role != Role::Regular {
        return Err(AppError::forbidden("only regular accounts can join clubs"));
    }
    if club.owner_id == user_id {
        return Err(AppError::conflict("you already own this club"));
    }
    Ok(())
}

pub fn ensure_can_apply(
    role: Role,
    club: &Club,
    user_id: i32,
    already_member: bool,
    has_pending: bool,
) -> AppResult<()> {
    ensure_can_join_club(role, club, user_id)?;
    if already_member {
        return Err(AppError::conflict("you are already a member of this club"));
    }
    if has_pending {
        return Err(AppError::conflict(
            "you already have a pending application for this club",
        ));
    }
    Ok(())
}

/// Returns the status an application moves to, only `pending` applications can be decided.
pub fn decide_application(
    current: ApplicationStatus,
    decision: ApplicationStatus,
) -> AppResult<ApplicationStatus> {
    if current != ApplicationStatus::Pending {
        return Err(AppError::conflict(format!(
            "application has already been {current}"
        )));
    }
    match decision {
        ApplicationStatus::Approved | ApplicationStatus::Rejected => Ok(decision),
        ApplicationStatus::Pending => Err(AppError::conflict(
            "a decision must be `approved` or `rejected`",
        )),
    }
}

pub fn ensure_can_withdraw(application: &ClubApplication, user_id: i32) -> AppResult<()> {
    if application.user_id != user_id {
        return Err(AppError::forbidden(
            "you can only withdraw your own applications",
        ));
    }
    if application.status != ApplicationStatus::Pending.as_str() {
        return Err(AppError::conflict(
            "only pending applications can be withdrawn",
        ));
    }
    Ok(())
}

/// A repeat join is reported as such before status or capacity are looked at.
pub fn ensure_event_joinable(
    event: &Event,
    attendee_count: i64,
    already_joined: bool,
) -> AppResult<()> {
    if already_joined {
        return Err(AppError::conflict("You have already joined this event"));
    }
    if event.status.parse::<EventStatus>()? != EventStatus::Active {
        return Err(AppError::conflict("event is not open for registration"));
    }
    if let Some(max) = event.max_attendees {
        if attendee_count >= i64::from(max) {
            return Err(AppError::conflict("Event is full"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;

    fn club(owner_id: i32) -> Club {
        Club {
            id: 1,
            owner_id,
            name: "Chess Society".to_string(),
            description: String::new(),
            club_type: "social".to_string(),
            custom_type: None,
            contact_email: "chess@uni.edu".to_string(),
            contact_phone: None,
            website: None,
            logo_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event(status: EventStatus, max_attendees: Option<i32>) -> Event {
        Event {
            id: 3,
            club_id: 1,
            created_by: 10,
            title: "Blitz night".to_string(),
            description: String::new(),
            event_date: Utc::now(),
            location: "Library".to_string(),
            price: 0.0,
            max_attendees,
            status: status.to_string(),
            share_count: 0,
            image_url: None,
            additional_info: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn application(user_id: i32, status: ApplicationStatus) -> ClubApplication {
        ClubApplication {
            id: 5,
            club_id: 1,
            user_id,
            application_message: None,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn status_of<T: std::fmt::Debug>(res: AppResult<T>) -> StatusCode {
        res.unwrap_err().status()
    }

    #[test]
    fn role_must_match() {
        assert!(require_role(Role::Club, Role::Club).is_ok());
        assert_eq!(
            status_of(require_role(Role::Regular, Role::Club)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn only_owner_manages_club() {
        let c = club(10);
        assert!(ensure_club_owner(&c, 10).is_ok());
        assert_eq!(status_of(ensure_club_owner(&c, 11)), StatusCode::FORBIDDEN);
    }

    #[test]
    fn club_accounts_cannot_join() {
        let c = club(10);
        assert_eq!(
            status_of(ensure_can_join_club(Role::Club, &c, 20)),
            StatusCode::FORBIDDEN
        );
        assert!(ensure_can_join_club(Role::Regular, &c, 20).is_ok());
    }

    #[test]
    fn owner_cannot_join_own_club() {
        let c = club(10);
        assert_eq!(
            status_of(ensure_can_join_club(Role::Regular, &c, 10)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn members_and_pending_applicants_cannot_apply_again() {
        let c = club(10);
        assert!(ensure_can_apply(Role::Regular, &c, 20, false, false).is_ok());
        assert_eq!(
            status_of(ensure_can_apply(Role::Regular, &c, 20, true, false)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ensure_can_apply(Role::Regular, &c, 20, false, true)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ensure_can_apply(Role::Club, &c, 20, false, false)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn pending_applications_can_be_decided_once() {
        assert_eq!(
            decide_application(ApplicationStatus::Pending, ApplicationStatus::Approved).unwrap(),
            ApplicationStatus::Approved
        );
        assert_eq!(
            decide_application(ApplicationStatus::Pending, ApplicationStatus::Rejected).unwrap(),
            ApplicationStatus::Rejected
        );
        assert_eq!(
            status_of(decide_application(
                ApplicationStatus::Approved,
                ApplicationStatus::Rejected
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(decide_application(
                ApplicationStatus::Pending,
                ApplicationStatus::Pending
            )),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn withdraw_is_for_the_applicant_while_pending() {
        assert!(ensure_can_withdraw(&application(20, ApplicationStatus::Pending), 20).is_ok());
        assert_eq!(
            status_of(ensure_can_withdraw(
                &application(20, ApplicationStatus::Pending),
                21
            )),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ensure_can_withdraw(
                &application(20, ApplicationStatus::Rejected),
                20
            )),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn full_events_reject_attendees() {
        let e = event(EventStatus::Active, Some(2));
        assert!(ensure_event_joinable(&e, 1, false).is_ok());
        let err = ensure_event_joinable(&e, 2, false).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "Event is full");
    }

    #[test]
    fn unlimited_events_never_fill() {
        assert!(ensure_event_joinable(&event(EventStatus::Active, None), 10_000, false).is_ok());
    }

    #[test]
    fn only_active_events_take_attendees() {
        for status in [
            EventStatus::Inactive,
            EventStatus::Cancelled,
            EventStatus::Completed,
        ] {
            assert_eq!(
                status_of(ensure_event_joinable(&event(status, None), 0, false)),
                StatusCode::CONFLICT
            );
        }
    }

    #[test]
    fn attendees_of_a_full_event_are_told_they_joined() {
        let e = event(EventStatus::Active, Some(1));
        let err = ensure_event_joinable(&e, 1, true).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "You have already joined this event");

        let closed = event(EventStatus::Cancelled, None);
        assert_eq!(
            ensure_event_joinable(&closed, 0, true).unwrap_err().message(),
            "You have already joined this event"
        );
    }
}
