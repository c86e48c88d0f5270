use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::EventStatus;
use crate::services::events::{EventPatch, NewEvent};
use crate::state::AppState;
use crate::store::{EventFilter, Page};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success, Paginated};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub artist_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

fn parse_status(raw: &str) -> Result<EventStatus, AppError> {
    raw.parse().map_err(|_| {
        AppError::Validation(format!(
            "Invalid status value. Status must be one of: {}",
            EventStatus::ALLOWED
        ))
    })
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = state.events.create(input, &caller).await?;
    Ok(created(event, "Event created").into_response())
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Response, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = EventFilter {
        status,
        artist_id: query.artist_id,
    };
    let page = Page::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));

    let (count, events) = state.events.list(filter, page).await?;
    let payload = Paginated::new(count, page.page, page.limit, events);
    Ok(success(payload, "Events retrieved").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.get(id).await?;
    Ok(success(event, "Event retrieved").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    Json(patch): Json<EventPatch>,
) -> Result<Response, AppError> {
    let event = state.events.update(id, patch, &caller).await?;
    Ok(success(event, "Event updated").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
) -> Result<Response, AppError> {
    state.events.delete(id, &caller).await?;
    Ok(empty_success("Event deleted successfully").into_response())
}

/// Status strings are validated before any load or authorization step, so an
/// unknown value is a 400 even for a caller who could not touch the event.
pub async fn change_event_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    Json(body): Json<StatusBody>,
) -> Result<Response, AppError> {
    let status = parse_status(&body.status)?;
    let event = state.events.set_status(id, status, &caller).await?;
    Ok(success(event, "Event status updated").into_response())
}
