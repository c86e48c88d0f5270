use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::BookingStatus;
use crate::state::AppState;
use crate::store::{BookingFilter, Page};
use crate::utils::error::AppError;
use crate::utils::response::{created, success, Paginated};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NotesBody {
    pub notes: String,
}

fn parse_status(raw: &str) -> Result<BookingStatus, AppError> {
    raw.parse().map_err(|_| {
        AppError::Validation(format!(
            "Invalid status value. Status must be one of: {}",
            BookingStatus::ALLOWED
        ))
    })
}

pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let booking = state
        .bookings
        .create(input.event_id, input.special_requests, &caller)
        .await?;
    Ok(created(booking, "Booking created").into_response())
}

pub async fn list_bookings(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<BookingListQuery>,
) -> Result<Response, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = BookingFilter {
        status,
        event_id: query.event_id,
        ..BookingFilter::default()
    };
    let page = Page::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));

    let (count, bookings) = state.bookings.list(filter, page, &caller).await?;
    let payload = Paginated::new(count, page.page, page.limit, bookings);
    Ok(success(payload, "Bookings retrieved").into_response())
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
) -> Result<Response, AppError> {
    let booking = state.bookings.get(id, &caller).await?;
    Ok(success(booking, "Booking retrieved").into_response())
}

/// Status strings are validated before any load or authorization step; see
/// `change_event_status` for the same ordering on events.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    Json(body): Json<StatusBody>,
) -> Result<Response, AppError> {
    let status = parse_status(&body.status)?;
    let booking = state.bookings.set_status(id, status, &caller).await?;
    Ok(success(booking, "Booking status updated").into_response())
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
) -> Result<Response, AppError> {
    let booking = state.bookings.cancel(id, &caller).await?;
    Ok(success(booking, "Booking has been cancelled").into_response())
}

pub async fn check_in_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
) -> Result<Response, AppError> {
    let booking = state.bookings.check_in(id, &caller).await?;
    Ok(success(booking, "Fan checked in successfully").into_response())
}

pub async fn update_booking_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    Json(body): Json<NotesBody>,
) -> Result<Response, AppError> {
    let booking = state.bookings.annotate(id, body.notes, &caller).await?;
    Ok(success(booking, "Notes added successfully").into_response())
}
