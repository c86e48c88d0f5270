//! Persistence collaborator for the registry and ledger services.
//!
//! The services only require lookup-by-id, filtered/paginated listing, and
//! counted queries; everything lifecycle-related (status checks, capacity
//! admission, authorization) lives above this trait so it stays auditable
//! and independent of storage mechanics.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Event, EventStatus, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Opaque storage failure. The message is kept for logs only and never
/// reaches API clients.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self(e.to_string())
    }
}

/// 1-based page selection for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub artist_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub event_id: Option<Uuid>,
    /// Restrict to a single fan's bookings (role scoping for fans).
    pub fan_id: Option<Uuid>,
    /// Restrict to bookings on these events (role scoping for artists).
    pub event_ids: Option<Vec<Uuid>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn update_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn delete_event(&self, id: Uuid) -> Result<(), StoreError>;
    /// Returns (total matching count, requested page) ordered by event date
    /// ascending.
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<Event>), StoreError>;
    async fn event_ids_for_artist(&self, artist_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    /// Returns (total matching count, requested page) ordered newest first.
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
    ) -> Result<(i64, Vec<Booking>), StoreError>;
    /// The pending/confirmed booking for (event, fan), if one exists.
    async fn find_active_booking(
        &self,
        event_id: Uuid,
        fan_id: Uuid,
    ) -> Result<Option<Booking>, StoreError>;
    /// Count of pending/confirmed bookings for the event; the admission
    /// controller compares this against `total_capacity`.
    async fn count_active_bookings(&self, event_id: Uuid) -> Result<i64, StoreError>;
}
