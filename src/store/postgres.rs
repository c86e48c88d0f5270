//! Postgres backend.
//!
//! Optional filters use the `($n IS NULL OR col = $n)` pattern so one
//! statement serves every filter combination. The schema carries a partial
//! unique index over active (event_id, fan_id) pairs as defense in depth
//! behind the ledger's per-event lock.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BookingFilter, EventFilter, Page, Store, StoreError};
use crate::models::{Booking, Event, User};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO events (id, title, description, event_date, start_time, end_time, \
             venue_name, address, city, state, zip_code, country, total_capacity, status, \
             image_url, artist_id, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19)",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.venue_name)
        .bind(&event.address)
        .bind(&event.city)
        .bind(&event.state)
        .bind(&event.zip_code)
        .bind(&event.country)
        .bind(event.total_capacity)
        .bind(event.status)
        .bind(&event.image_url)
        .bind(event.artist_id)
        .bind(event.created_by)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE events SET title = $2, description = $3, event_date = $4, start_time = $5, \
             end_time = $6, venue_name = $7, address = $8, city = $9, state = $10, \
             zip_code = $11, country = $12, total_capacity = $13, status = $14, \
             image_url = $15, artist_id = $16, updated_at = $17 \
             WHERE id = $1",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.venue_name)
        .bind(&event.address)
        .bind(&event.city)
        .bind(&event.state)
        .bind(&event.zip_code)
        .bind(&event.country)
        .bind(event.total_capacity)
        .bind(event.status)
        .bind(&event.image_url)
        .bind(event.artist_id)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<Event>), StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events \
             WHERE ($1::event_status IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR artist_id = $2)",
        )
        .bind(filter.status)
        .bind(filter.artist_id)
        .fetch_one(&self.pool)
        .await?;

        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events \
             WHERE ($1::event_status IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR artist_id = $2) \
             ORDER BY event_date ASC \
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.status)
        .bind(filter.artist_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, events))
    }

    async fn event_ids_for_artist(&self, artist_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM events WHERE artist_id = $1")
            .bind(artist_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bookings (id, event_id, fan_id, booking_date, status, \
             special_requests, check_in_time, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.fan_id)
        .bind(booking.booking_date)
        .bind(booking.status)
        .bind(&booking.special_requests)
        .bind(booking.check_in_time)
        .bind(&booking.notes)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE bookings SET status = $2, special_requests = $3, check_in_time = $4, \
             notes = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.status)
        .bind(&booking.special_requests)
        .bind(booking.check_in_time)
        .bind(&booking.notes)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
    ) -> Result<(i64, Vec<Booking>), StoreError> {
        const WHERE: &str = "WHERE ($1::booking_status IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR event_id = $2) \
             AND ($3::uuid IS NULL OR fan_id = $3) \
             AND ($4::uuid[] IS NULL OR event_id = ANY($4))";

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bookings {WHERE}"))
                .bind(filter.status)
                .bind(filter.event_id)
                .bind(filter.fan_id)
                .bind(filter.event_ids.as_deref())
                .fetch_one(&self.pool)
                .await?;

        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT * FROM bookings {WHERE} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.status)
        .bind(filter.event_id)
        .bind(filter.fan_id)
        .bind(filter.event_ids.as_deref())
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, bookings))
    }

    async fn find_active_booking(
        &self,
        event_id: Uuid,
        fan_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings \
             WHERE event_id = $1 AND fan_id = $2 AND status IN ('pending', 'confirmed') \
             LIMIT 1",
        )
        .bind(event_id)
        .bind(fan_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn count_active_bookings(&self, event_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings \
             WHERE event_id = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
