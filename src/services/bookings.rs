//! Booking ledger and capacity admission.
//!
//! Admission is a check-then-insert sequence (count active bookings, compare
//! against capacity, insert), and the duplicate-fan check has the same
//! shape. Both are racy if two requests interleave, so every mutation of an
//! event's booking set runs under that event's async mutex: admission
//! decisions for one event are serialized, and cancellations/status changes
//! that free capacity serialize with them. Per-event granularity is enough;
//! capacity checks never span events.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::{Booking, BookingStatus, Event, EventStatus, Role};
use crate::services::policy::{allows, Action, Ownership};
use crate::store::{BookingFilter, Page, Store};
use crate::utils::error::AppError;

/// Registry of per-event admission locks. Entries are created on first use;
/// each lookup sweeps entries no caller still holds, so the registry stays
/// bounded by the number of events with in-flight mutations.
#[derive(Clone, Default)]
struct EventLocks(Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>);

impl EventLocks {
    fn for_event(&self, event_id: Uuid) -> Arc<Mutex<()>> {
        let mut map = self.0.lock().expect("lock registry poisoned");
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(event_id).or_default().clone()
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    locks: EventLocks,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: EventLocks::default(),
        }
    }

    /// Creates a `pending` booking for the caller. Preconditions run in
    /// order, first failure wins: event exists, event not past, event not
    /// cancelled, no active duplicate for this fan, capacity admission.
    pub async fn create(
        &self,
        event_id: Uuid,
        special_requests: Option<String>,
        caller: &Caller,
    ) -> Result<Booking, AppError> {
        if !allows(Action::CreateBooking, caller.role, Ownership::default()) {
            return Err(AppError::Forbidden(
                "Only fans can create bookings".to_string(),
            ));
        }

        let lock = self.locks.for_event(event_id);
        let _admission = lock.lock().await;

        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        if event.is_past(Utc::now().date_naive()) {
            return Err(AppError::InvalidState(
                "Cannot book for past events".to_string(),
            ));
        }
        if event.status == EventStatus::Cancelled {
            return Err(AppError::InvalidState(
                "Cannot book for cancelled events".to_string(),
            ));
        }

        if self
            .store
            .find_active_booking(event_id, caller.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have a booking for this event".to_string(),
            ));
        }

        let active = self.store.count_active_bookings(event_id).await?;
        if active >= i64::from(event.total_capacity) {
            return Err(AppError::CapacityExceeded(
                "This event is fully booked".to_string(),
            ));
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            event_id,
            fan_id: caller.id,
            booking_date: now,
            status: BookingStatus::Pending,
            special_requests,
            check_in_time: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_booking(&booking).await?;

        info!(
            booking_id = %booking.id,
            event_id = %event_id,
            fan_id = %caller.id,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn get(&self, id: Uuid, caller: &Caller) -> Result<Booking, AppError> {
        let booking = self.find(id).await?;
        let own = self.ownership_facts(&booking, caller).await?;
        if !allows(Action::ViewBooking, caller.role, own) {
            return Err(AppError::Forbidden(
                "Not authorized to view this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    /// Role-scoped listing: fans see their own bookings, artists see
    /// bookings on their own events, everyone else sees all.
    pub async fn list(
        &self,
        mut filter: BookingFilter,
        page: Page,
        caller: &Caller,
    ) -> Result<(i64, Vec<Booking>), AppError> {
        match caller.role {
            Role::Fan => filter.fan_id = Some(caller.id),
            Role::Artist => {
                filter.event_ids = Some(self.store.event_ids_for_artist(caller.id).await?);
            }
            _ => {}
        }
        Ok(self.store.list_bookings(&filter, page).await?)
    }

    /// Staff/admin override path: no transition-graph validation, any status
    /// may be written over any other. The narrow, validated transitions are
    /// `cancel` and `check_in`.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        caller: &Caller,
    ) -> Result<Booking, AppError> {
        let found = self.find(id).await?;
        let own = self.ownership_facts(&found, caller).await?;
        if !allows(Action::UpdateBookingStatus, caller.role, own) {
            return Err(AppError::Forbidden(
                "Not authorized to update this booking".to_string(),
            ));
        }

        let lock = self.locks.for_event(found.event_id);
        let _admission = lock.lock().await;

        // Re-read under the lock; the booking may have moved since the
        // authorization read.
        let mut booking = self.find(id).await?;
        booking.status = status;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, status = %status, by = %caller.id, "Booking status changed");
        Ok(booking)
    }

    /// Fan self-cancellation: ownership-only authorization, and unlike
    /// `set_status` the transition is validated: terminal bookings and past
    /// events cannot be cancelled.
    pub async fn cancel(&self, id: Uuid, caller: &Caller) -> Result<Booking, AppError> {
        let found = self.find(id).await?;

        let lock = self.locks.for_event(found.event_id);
        let _admission = lock.lock().await;

        let mut booking = self.find(id).await?;
        if caller.id != booking.fan_id {
            return Err(AppError::Forbidden(
                "Not authorized to cancel this booking".to_string(),
            ));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::InvalidState(
                "Booking is already cancelled".to_string(),
            ));
        }
        if booking.status == BookingStatus::Completed {
            return Err(AppError::InvalidState(
                "Cannot cancel a completed booking".to_string(),
            ));
        }

        let event = self
            .store
            .find_event(booking.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if event.is_past(Utc::now().date_naive()) {
            return Err(AppError::InvalidState(
                "Cannot cancel bookings for past events".to_string(),
            ));
        }

        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, fan_id = %caller.id, "Booking cancelled");
        Ok(booking)
    }

    /// Check-in is only valid from `confirmed`; stamps the check-in time and
    /// completes the booking.
    pub async fn check_in(&self, id: Uuid, caller: &Caller) -> Result<Booking, AppError> {
        let found = self.find(id).await?;
        let own = self.ownership_facts(&found, caller).await?;
        if !allows(Action::CheckInBooking, caller.role, own) {
            return Err(AppError::Forbidden(
                "Not authorized to check in this booking".to_string(),
            ));
        }

        let lock = self.locks.for_event(found.event_id);
        let _admission = lock.lock().await;

        let mut booking = self.find(id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidState(
                "Only confirmed bookings can be checked in".to_string(),
            ));
        }

        let now = Utc::now();
        booking.status = BookingStatus::Completed;
        booking.check_in_time = Some(now);
        booking.updated_at = now;
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, by = %caller.id, "Booking checked in");
        Ok(booking)
    }

    /// Overwrites the staff-facing notes. Notes never change the active set,
    /// but the row write carries the status column too, so it takes the
    /// event lock like every other mutation: a stale read written back
    /// unserialized could resurrect a concurrently cancelled booking.
    pub async fn annotate(
        &self,
        id: Uuid,
        notes: String,
        caller: &Caller,
    ) -> Result<Booking, AppError> {
        let found = self.find(id).await?;
        let own = self.ownership_facts(&found, caller).await?;
        if !allows(Action::AnnotateBooking, caller.role, own) {
            return Err(AppError::Forbidden(
                "Not authorized to add notes to this booking".to_string(),
            ));
        }

        let lock = self.locks.for_event(found.event_id);
        let _admission = lock.lock().await;

        let mut booking = self.find(id).await?;
        booking.notes = Some(notes);
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, by = %caller.id, "Booking notes updated");
        Ok(booking)
    }

    async fn find(&self, id: Uuid) -> Result<Booking, AppError> {
        self.store
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// Explicit two-step fetch for the ownership facts: the booking's event
    /// is loaded by id so the authorization decision does not depend on a
    /// storage-side join. A dangling event reference simply yields no
    /// artist ownership.
    async fn ownership_facts(
        &self,
        booking: &Booking,
        caller: &Caller,
    ) -> Result<Ownership, AppError> {
        let event: Option<Event> = self.store.find_event(booking.event_id).await?;
        Ok(Ownership {
            event_creator: false,
            owning_artist: event.map_or(false, |e| e.artist_id == caller.id),
            booking_fan: caller.id == booking.fan_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, Role, User};
    use crate::store::{EventFilter, MemoryStore, StoreError};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveTime};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    struct Fixture {
        store: Arc<MemoryStore>,
        bookings: BookingService,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let bookings = BookingService::new(store.clone());
            Self { store, bookings }
        }

        async fn event(&self, artist_id: Uuid, capacity: i32) -> Event {
            self.event_on(artist_id, capacity, Utc::now().date_naive() + Duration::days(30))
                .await
        }

        async fn event_on(
            &self,
            artist_id: Uuid,
            capacity: i32,
            date: chrono::NaiveDate,
        ) -> Event {
            let event = make_event(artist_id, capacity, date);
            self.store.insert_event(&event).await.unwrap();
            event
        }
    }

    fn make_event(artist_id: Uuid, capacity: i32, date: chrono::NaiveDate) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "Meet & greet".to_string(),
            description: "Backstage".to_string(),
            event_date: date,
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            venue_name: "The Roxy".to_string(),
            address: "9009 Sunset Blvd".to_string(),
            city: "Los Angeles".to_string(),
            state: "CA".to_string(),
            zip_code: "90069".to_string(),
            country: "USA".to_string(),
            total_capacity: capacity,
            status: EventStatus::Scheduled,
            image_url: None,
            artist_id,
            created_by: artist_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn fan() -> Caller {
        Caller {
            id: Uuid::new_v4(),
            role: Role::Fan,
        }
    }

    fn artist(id: Uuid) -> Caller {
        Caller {
            id,
            role: Role::Artist,
        }
    }

    #[tokio::test]
    async fn only_fans_can_book() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let staff = Caller {
            id: Uuid::new_v4(),
            role: Role::Staff,
        };
        let err = fx
            .bookings
            .create(event.id, None, &staff)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn booking_a_past_event_fails_regardless_of_capacity() {
        let fx = Fixture::new();
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let event = fx.event_on(Uuid::new_v4(), 1000, yesterday).await;
        let err = fx
            .bookings
            .create(event.id, None, &fan())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn booking_a_cancelled_event_fails() {
        let fx = Fixture::new();
        let mut event = fx.event(Uuid::new_v4(), 5).await;
        event.status = EventStatus::Cancelled;
        fx.store.update_event(&event).await.unwrap();

        let err = fx
            .bookings
            .create(event.id, None, &fan())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn one_active_booking_per_fan_per_event() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();

        fx.bookings.create(event.id, None, &alice).await.unwrap();
        let err = fx
            .bookings
            .create(event.id, None, &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn capacity_one_lifecycle() {
        // Fan A books, fan B is denied, A is confirmed then cancels, B can
        // book again once capacity is freed.
        let fx = Fixture::new();
        let artist_id = Uuid::new_v4();
        let event = fx.event(artist_id, 1).await;
        let (alice, bob) = (fan(), fan());

        let a = fx.bookings.create(event.id, None, &alice).await.unwrap();
        assert_eq!(a.status, BookingStatus::Pending);

        let err = fx.bookings.create(event.id, None, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));

        let confirmed = fx
            .bookings
            .set_status(a.id, BookingStatus::Confirmed, &artist(artist_id))
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        fx.bookings.cancel(a.id, &alice).await.unwrap();

        let b = fx.bookings.create(event.id, None, &bob).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_creates_never_overbook() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 3).await;

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let svc = fx.bookings.clone();
            let event_id = event.id;
            tasks.push(tokio::spawn(
                async move { svc.create(event_id, None, &fan()).await },
            ));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(fx.store.count_active_bookings(event.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cancel_is_not_idempotent() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        fx.bookings.cancel(booking.id, &alice).await.unwrap();
        let err = fx.bookings.cancel(booking.id, &alice).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn only_the_owning_fan_may_cancel() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        let err = fx.bookings.cancel(booking.id, &fan()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn check_in_requires_confirmed() {
        let fx = Fixture::new();
        let artist_id = Uuid::new_v4();
        let event = fx.event(artist_id, 5).await;
        let alice = fan();
        let staff = Caller {
            id: Uuid::new_v4(),
            role: Role::Staff,
        };
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        // pending -> check-in fails
        let err = fx.bookings.check_in(booking.id, &staff).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        fx.bookings
            .set_status(booking.id, BookingStatus::Confirmed, &artist(artist_id))
            .await
            .unwrap();
        let done = fx.bookings.check_in(booking.id, &staff).await.unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert!(done.check_in_time.is_some());

        // completed -> check-in fails again
        let err = fx.bookings.check_in(booking.id, &staff).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn artists_only_manage_their_own_events_bookings() {
        let fx = Fixture::new();
        let artist_id = Uuid::new_v4();
        let event = fx.event(artist_id, 5).await;
        let booking = fx.bookings.create(event.id, None, &fan()).await.unwrap();

        let stranger = artist(Uuid::new_v4());
        let err = fx
            .bookings
            .set_status(booking.id, BookingStatus::Confirmed, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        fx.bookings
            .set_status(booking.id, BookingStatus::Confirmed, &artist(artist_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fans_cannot_change_booking_status() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        // Not even on their own booking.
        let err = fx
            .bookings
            .set_status(booking.id, BookingStatus::Confirmed, &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancelling_frees_capacity_under_concurrency() {
        // One cancel and one create racing for the last slot must serialize:
        // whatever the interleaving, the active count never exceeds capacity.
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 1).await;
        let alice = fan();
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        let cancel = {
            let svc = fx.bookings.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.cancel(id, &alice).await })
        };
        let create = {
            let svc = fx.bookings.clone();
            let event_id = event.id;
            tokio::spawn(async move { svc.create(event_id, None, &fan()).await })
        };

        let _ = cancel.await.unwrap();
        let _ = create.await.unwrap();
        assert!(fx.store.count_active_bookings(event.id).await.unwrap() <= 1);
    }

    #[tokio::test]
    async fn listing_is_role_scoped() {
        let fx = Fixture::new();
        let artist_id = Uuid::new_v4();
        let event_a = fx.event(artist_id, 5).await;
        let event_b = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();
        let bob = fan();

        fx.bookings.create(event_a.id, None, &alice).await.unwrap();
        fx.bookings.create(event_b.id, None, &alice).await.unwrap();
        fx.bookings.create(event_b.id, None, &bob).await.unwrap();

        let (count, _) = fx
            .bookings
            .list(BookingFilter::default(), Page::default(), &alice)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let (count, items) = fx
            .bookings
            .list(BookingFilter::default(), Page::default(), &artist(artist_id))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(items[0].event_id, event_a.id);

        let admin = Caller {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let (count, _) = fx
            .bookings
            .list(BookingFilter::default(), Page::default(), &admin)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn notes_are_staff_writable_and_overwritten() {
        let fx = Fixture::new();
        let event = fx.event(Uuid::new_v4(), 5).await;
        let alice = fan();
        let staff = Caller {
            id: Uuid::new_v4(),
            role: Role::Staff,
        };
        let booking = fx.bookings.create(event.id, None, &alice).await.unwrap();

        let err = fx
            .bookings
            .annotate(booking.id, "mine".to_string(), &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        fx.bookings
            .annotate(booking.id, "vip".to_string(), &staff)
            .await
            .unwrap();
        let updated = fx
            .bookings
            .annotate(booking.id, "vip, allergic to peanuts".to_string(), &staff)
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("vip, allergic to peanuts"));
    }

    /// MemoryStore wrapper that parks the next booking write until released,
    /// stretching the window between a service call's read and its write so
    /// other callers can interleave deterministically.
    struct StalledWriteStore {
        inner: MemoryStore,
        stall_next_write: AtomicBool,
        release: Notify,
    }

    impl StalledWriteStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                stall_next_write: AtomicBool::new(false),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Store for StalledWriteStore {
        async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_user(id).await
        }
        async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
            self.inner.insert_user(user).await
        }
        async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
            self.inner.find_event(id).await
        }
        async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
            self.inner.insert_event(event).await
        }
        async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
            self.inner.update_event(event).await
        }
        async fn delete_event(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_event(id).await
        }
        async fn list_events(
            &self,
            filter: &EventFilter,
            page: Page,
        ) -> Result<(i64, Vec<Event>), StoreError> {
            self.inner.list_events(filter, page).await
        }
        async fn event_ids_for_artist(&self, artist_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
            self.inner.event_ids_for_artist(artist_id).await
        }
        async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
            self.inner.find_booking(id).await
        }
        async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            self.inner.insert_booking(booking).await
        }
        async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            if self.stall_next_write.swap(false, Ordering::SeqCst) {
                self.release.notified().await;
            }
            self.inner.update_booking(booking).await
        }
        async fn list_bookings(
            &self,
            filter: &BookingFilter,
            page: Page,
        ) -> Result<(i64, Vec<Booking>), StoreError> {
            self.inner.list_bookings(filter, page).await
        }
        async fn find_active_booking(
            &self,
            event_id: Uuid,
            fan_id: Uuid,
        ) -> Result<Option<Booking>, StoreError> {
            self.inner.find_active_booking(event_id, fan_id).await
        }
        async fn count_active_bookings(&self, event_id: Uuid) -> Result<i64, StoreError> {
            self.inner.count_active_bookings(event_id).await
        }
    }

    #[tokio::test]
    async fn stalled_note_write_cannot_resurrect_a_cancelled_booking() {
        // A notes update whose row write is delayed must not overwrite a
        // cancellation that happens meanwhile: the booking stays cancelled
        // and the slot freed by the cancel is not double-admitted.
        let store = Arc::new(StalledWriteStore::new());
        let bookings = BookingService::new(store.clone());
        let event = make_event(
            Uuid::new_v4(),
            1,
            Utc::now().date_naive() + Duration::days(30),
        );
        store.insert_event(&event).await.unwrap();

        let alice = fan();
        let booking = bookings.create(event.id, None, &alice).await.unwrap();

        let staff = Caller {
            id: Uuid::new_v4(),
            role: Role::Staff,
        };
        store.stall_next_write.store(true, Ordering::SeqCst);
        let annotate = {
            let svc = bookings.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.annotate(id, "vip".to_string(), &staff).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let cancel = {
            let svc = bookings.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.cancel(id, &alice).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let rebook = {
            let svc = bookings.clone();
            let event_id = event.id;
            tokio::spawn(async move { svc.create(event_id, None, &fan()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        store.release.notify_one();
        annotate.await.unwrap().unwrap();
        cancel.await.unwrap().unwrap();
        rebook.await.unwrap().unwrap();

        let after = store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(after.status, BookingStatus::Cancelled);
        assert_eq!(after.notes.as_deref(), Some("vip"));
        assert_eq!(store.count_active_bookings(event.id).await.unwrap(), 1);
    }

    #[test]
    fn idle_lock_entries_are_swept() {
        let locks = EventLocks::default();
        for _ in 0..64 {
            drop(locks.for_event(Uuid::new_v4()));
        }
        let held = locks.for_event(Uuid::new_v4());
        assert_eq!(locks.0.lock().unwrap().len(), 1);
        drop(held);
    }

    #[tokio::test]
    async fn store_round_trips_users() {
        let fx = Fixture::new();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: Role::Fan,
            created_at: now,
            updated_at: now,
        };
        fx.store.insert_user(&user).await.unwrap();
        let found = fx.store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, user.email);
    }
}
