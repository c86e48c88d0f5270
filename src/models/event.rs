use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "event_status", rename_all = "kebab-case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub const ALLOWED: &'static str = "scheduled, in-progress, completed, cancelled";
}

impl FromStr for EventStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "in-progress" => Ok(EventStatus::InProgress),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in-progress",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A meet & greet event. `total_capacity` is fixed at creation and advisory:
/// admission is always computed from live active-booking counts, never from a
/// decremented counter, so the count cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub total_capacity: i32,
    pub status: EventStatus,
    pub image_url: Option<String>,
    pub artist_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Date-only comparison: an event is past once its calendar day (UTC) is
    /// behind today, so same-day bookings are still accepted.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.event_date < today
    }
}
