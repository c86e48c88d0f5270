//! Event registry: create/read/update/delete plus status changes, with the
//! ownership rules from the authorization table applied per operation.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::{Event, EventStatus};
use crate::services::policy::{allows, Action, Ownership};
use crate::store::{EventFilter, Page, Store};
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
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
    pub image_url: Option<String>,
    pub artist_id: Uuid,
}

/// Partial update. Status is deliberately absent: status changes go through
/// `set_status` so they always pass the enum validation step.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub total_capacity: Option<i32>,
    pub image_url: Option<String>,
    pub artist_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn Store>,
}

impl EventService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: NewEvent, caller: &Caller) -> Result<Event, AppError> {
        if !allows(Action::CreateEvent, caller.role, Ownership::default()) {
            return Err(AppError::Forbidden(
                "Not authorized to create events".to_string(),
            ));
        }
        if input.total_capacity < 1 {
            return Err(AppError::Validation(
                "Total capacity must be a positive number".to_string(),
            ));
        }

        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            event_date: input.event_date,
            start_time: input.start_time,
            end_time: input.end_time,
            venue_name: input.venue_name,
            address: input.address,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            country: input.country,
            total_capacity: input.total_capacity,
            status: EventStatus::Scheduled,
            image_url: input.image_url,
            artist_id: input.artist_id,
            created_by: caller.id,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_event(&event).await?;

        info!(event_id = %event.id, artist_id = %event.artist_id, "Event created");
        Ok(event)
    }

    pub async fn get(&self, id: Uuid) -> Result<Event, AppError> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    pub async fn list(
        &self,
        filter: EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<Event>), AppError> {
        Ok(self.store.list_events(&filter, page).await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: EventPatch,
        caller: &Caller,
    ) -> Result<Event, AppError> {
        let mut event = self.get(id).await?;
        self.authorize_mutation(Action::UpdateEvent, &event, caller, "update")?;

        if let Some(capacity) = patch.total_capacity {
            if capacity < 1 {
                return Err(AppError::Validation(
                    "Total capacity must be a positive number".to_string(),
                ));
            }
        }

        apply_patch(&mut event, patch);
        event.updated_at = Utc::now();
        self.store.update_event(&event).await?;

        info!(event_id = %event.id, "Event updated");
        Ok(event)
    }

    pub async fn delete(&self, id: Uuid, caller: &Caller) -> Result<(), AppError> {
        let event = self.get(id).await?;
        self.authorize_mutation(Action::DeleteEvent, &event, caller, "delete")?;

        self.store.delete_event(id).await?;

        info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// No transition-order validation: any status may follow any other. The
    /// enum itself is the only guard, matching the platform's behavior of
    /// treating cancelled/completed as terminal by convention only.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: EventStatus,
        caller: &Caller,
    ) -> Result<Event, AppError> {
        let mut event = self.get(id).await?;
        self.authorize_mutation(Action::ChangeEventStatus, &event, caller, "update")?;

        event.status = status;
        event.updated_at = Utc::now();
        self.store.update_event(&event).await?;

        info!(event_id = %event.id, status = %status, "Event status changed");
        Ok(event)
    }

    fn authorize_mutation(
        &self,
        action: Action,
        event: &Event,
        caller: &Caller,
        verb: &str,
    ) -> Result<(), AppError> {
        let own = Ownership {
            event_creator: caller.id == event.created_by,
            ..Ownership::default()
        };
        if allows(action, caller.role, own) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Not authorized to {verb} this event"
            )))
        }
    }
}

fn apply_patch(event: &mut Event, patch: EventPatch) {
    if let Some(v) = patch.title {
        event.title = v;
    }
    if let Some(v) = patch.description {
        event.description = v;
    }
    if let Some(v) = patch.event_date {
        event.event_date = v;
    }
    if let Some(v) = patch.start_time {
        event.start_time = v;
    }
    if let Some(v) = patch.end_time {
        event.end_time = v;
    }
    if let Some(v) = patch.venue_name {
        event.venue_name = v;
    }
    if let Some(v) = patch.address {
        event.address = v;
    }
    if let Some(v) = patch.city {
        event.city = v;
    }
    if let Some(v) = patch.state {
        event.state = v;
    }
    if let Some(v) = patch.zip_code {
        event.zip_code = v;
    }
    if let Some(v) = patch.country {
        event.country = v;
    }
    if let Some(v) = patch.total_capacity {
        event.total_capacity = v;
    }
    if patch.image_url.is_some() {
        event.image_url = patch.image_url;
    }
    if let Some(v) = patch.artist_id {
        event.artist_id = v;
    }
}
