pub mod availability;
pub mod booking;
pub mod provider;
pub mod service;
pub mod timestamp;

pub use availability::{AvailabilityProfile, DaySlots, NextSlot, TimeOfDay, WorkingHours};
pub use booking::{
    Booking, BookingDraft, BookingStatus, CancelledBy, PaymentStatus, ServiceDetails,
};
pub use provider::Provider;
pub use service::{PricingType, Service};
pub use timestamp::Timestamp;
