//! In-memory backend used by the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BookingFilter, EventFilter, Page, Store, StoreError};
use crate::models::{Booking, Event, User};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    events: Mutex<HashMap<Uuid, Event>>,
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> (i64, Vec<T>) {
    let total = items.len() as i64;
    let start = page.offset() as usize;
    let items = if start >= items.len() {
        Vec::new()
    } else {
        items.drain(start..).take(page.limit as usize).collect()
    };
    (total, items)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.lock().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events.lock().await.get(&id).cloned())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        self.events.lock().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        self.events.lock().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), StoreError> {
        self.events.lock().await.remove(&id);
        Ok(())
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<Event>), StoreError> {
        let events = self.events.lock().await;
        let mut matched: Vec<Event> = events
            .values()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| filter.artist_id.map_or(true, |a| e.artist_id == a))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.event_date);
        Ok(paginate(matched, page))
    }

    async fn event_ids_for_artist(&self, artist_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let events = self.events.lock().await;
        Ok(events
            .values()
            .filter(|e| e.artist_id == artist_id)
            .map(|e| e.id)
            .collect())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.lock().await.get(&id).cloned())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.bookings.lock().await.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.bookings.lock().await.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
    ) -> Result<(i64, Vec<Booking>), StoreError> {
        let bookings = self.bookings.lock().await;
        let mut matched: Vec<Booking> = bookings
            .values()
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.event_id.map_or(true, |e| b.event_id == e))
            .filter(|b| filter.fan_id.map_or(true, |f| b.fan_id == f))
            .filter(|b| {
                filter
                    .event_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&b.event_id))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matched, page))
    }

    async fn find_active_booking(
        &self,
        event_id: Uuid,
        fan_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .values()
            .find(|b| b.event_id == event_id && b.fan_id == fan_id && b.status.is_active())
            .cloned())
    }

    async fn count_active_bookings(&self, event_id: Uuid) -> Result<i64, StoreError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .values()
            .filter(|b| b.event_id == event_id && b.status.is_active())
            .count() as i64)
    }
}
