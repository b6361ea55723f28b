use crate::schema::*;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Declares a string-backed enum stored in a `Varchar` column.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(anyhow::anyhow!("unknown {} `{}`", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Account type of a profile. Decides which actions a signed-in user may take.
    Role {
        Club => "club",
        Regular => "regular",
    }
}

text_enum! {
    ClubType {
        Academic => "academic",
        Professional => "professional",
        Sports => "sports",
        Cultural => "cultural",
        Technical => "technical",
        Social => "social",
        Other => "other",
    }
}

text_enum! {
    EventStatus {
        Active => "active",
        Inactive => "inactive",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

text_enum! {
    ApplicationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Profile {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub bio: Option<String>,
    pub interests: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub year_in_college: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn role(&self) -> anyhow::Result<Role> {
        self.role.parse()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Profile, foreign_key = owner_id))]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub description: String,
    pub club_type: String,
    pub custom_type: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Club))]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i32,
    pub club_id: i32,
    pub created_by: i32,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub location: String,
    pub price: f64,
    pub max_attendees: Option<i32>,
    pub status: String,
    pub share_count: i32,
    pub image_url: Option<String>,
    pub additional_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_free(&self) -> bool {
        self.price <= 0.0
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Club))]
#[serde(rename_all = "camelCase")]
pub struct BoardMember {
    pub id: i32,
    pub club_id: i32,
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub year_in_college: Option<String>,
    pub joined_date: NaiveDate,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Club))]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i32,
    pub club_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date_achieved: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Club))]
#[serde(rename_all = "camelCase")]
pub struct ClubApplication {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub application_message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
pub struct ClubMember {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}
