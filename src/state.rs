use std::sync::Arc;

use crate::services::{BookingService, EventService};
use crate::store::Store;

/// Shared application state: the persistence collaborator plus the two
/// domain services built over it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub events: EventService,
    pub bookings: BookingService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            events: EventService::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            store,
        }
    }
}
