//! Central authorization table.
//!
//! One pure function over (action, role, ownership facts). Every permitted
//! role set is enumerated explicitly; there is no role hierarchy, so e.g.
//! `staff` can check fans in but cannot change booking statuses. Fan
//! self-cancellation is an ownership-only rule and lives in the ledger, not
//! here.

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ChangeEventStatus,
    CreateBooking,
    ViewBooking,
    UpdateBookingStatus,
    CheckInBooking,
    AnnotateBooking,
}

/// Ownership facts about the resource being acted on, resolved by the
/// calling service through explicit lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ownership {
    /// Caller created the event.
    pub event_creator: bool,
    /// Caller is the artist the event belongs to.
    pub owning_artist: bool,
    /// Caller is the fan who placed the booking.
    pub booking_fan: bool,
}

pub fn allows(action: Action, role: Role, own: Ownership) -> bool {
    use Action::*;
    use Role::*;

    match action {
        CreateEvent => matches!(role, Artist | Manager | Admin),
        UpdateEvent | ChangeEventStatus => matches!(role, Admin | Manager) || own.event_creator,
        DeleteEvent => role == Admin || own.event_creator,
        CreateBooking => role == Fan,
        ViewBooking => {
            matches!(role, Admin | Manager)
                || own.booking_fan
                || (role == Artist && own.owning_artist)
        }
        UpdateBookingStatus => {
            matches!(role, Admin | Manager) || (role == Artist && own.owning_artist)
        }
        CheckInBooking | AnnotateBooking => {
            matches!(role, Admin | Manager | Staff) || (role == Artist && own.owning_artist)
        }
    }
}
