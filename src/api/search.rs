//! Free-text search across events and clubs.

use super::{
    club::{search_clubs, ClubQuery, ClubSummary},
    event::{search_events, EventQuery, EventResponse},
};
use crate::{error::AppResult, DbPool};
use axum::{extract::Query, routing::get, Extension, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
enum SearchType {
    Events,
    Clubs,
    #[default]
    All,
}

impl SearchType {
    fn events(self) -> bool {
        matches!(self, SearchType::Events | SearchType::All)
    }

    fn clubs(self) -> bool {
        matches!(self, SearchType::Clubs | SearchType::All)
    }
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(rename = "type", default)]
    kind: SearchType,
}

#[derive(Serialize, Default)]
struct SearchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<EventResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clubs: Option<Vec<ClubSummary>>,
}

async fn search(
    Extension(pool): Extension<DbPool>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let q = params.q.trim();
    let kind = params.kind;

    if q.is_empty() {
        return Ok(Json(SearchResponse {
            events: kind.events().then(Vec::new),
            clubs: kind.clubs().then(Vec::new),
        }));
    }

    let conn = &mut pool.get().await?;
    let mut response = SearchResponse::default();
    if kind.events() {
        let query = EventQuery::search(Some(q.to_string()));
        response.events = Some(search_events(conn, &query).await?);
    }
    if kind.clubs() {
        let query = ClubQuery::search(Some(q.to_string()));
        response.clubs = Some(search_clubs(conn, &query).await?);
    }

    Ok(Json(response))
}

pub fn app() -> Router {
    Router::new().route("/", get(search))
}
