pub mod bookings;
pub mod events;
pub mod policy;

pub use bookings::BookingService;
pub use events::EventService;
