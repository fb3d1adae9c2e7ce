pub mod appointment;
pub mod barber;
pub mod identity;
pub mod logs;
pub mod slot;
pub mod working_hours;

pub use appointment::{Appointment, AppointmentRequest, AppointmentSlot, AppointmentStatus, CancelledBy};
pub use barber::Barber;
pub use identity::{Caller, Role};
pub use logs::{SmsLog, SmsStatus, SystemJobLog};
pub use slot::TimeSlot;
pub use working_hours::WorkingHours;
