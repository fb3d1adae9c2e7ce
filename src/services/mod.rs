pub mod audit;
pub mod availability;
pub mod booking;
pub mod calendar;
pub mod clock;
pub mod messaging;
pub mod notify;
pub mod reminders;
pub mod slots;
