pub mod bookings;
pub mod calendar;
pub mod coordinator;
pub mod directory;
pub mod messaging;
pub mod retry;
pub mod scheduling;
