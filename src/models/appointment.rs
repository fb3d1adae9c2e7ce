use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A customer's booking request. This is the authoritative booking record; the
/// concrete reserved block lives in [`AppointmentSlot`] once staff approve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub id: String,
    pub barber_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub requested_start_time: String,
    pub requested_end_time: Option<String>,
    pub status: AppointmentStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "approved" => Some(AppointmentStatus::Approved),
            "rejected" => Some(AppointmentStatus::Rejected),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending and approved requests hold their time; everything else released it.
    pub fn holds_time(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Customer,
    Barber,
    Admin,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Customer => "customer",
            CancelledBy::Barber => "barber",
            CancelledBy::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(CancelledBy::Customer),
            "barber" => Some(CancelledBy::Barber),
            "admin" => Some(CancelledBy::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: String,
    pub request_id: String,
    pub barber_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// A request together with its reserved block, if staff approved one.
#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    #[serde(flatten)]
    pub request: AppointmentRequest,
    pub slot: Option<AppointmentSlot>,
}

impl Appointment {
    /// Start time that is actually booked: the approved slot wins over the request.
    pub fn start_time(&self) -> &str {
        self.slot
            .as_ref()
            .map(|s| s.start_time.as_str())
            .unwrap_or(&self.request.requested_start_time)
    }

    pub fn end_time(&self) -> Option<&str> {
        match &self.slot {
            Some(slot) => Some(slot.end_time.as_str()),
            None => self.request.requested_end_time.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_holds_time() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Approved,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("confirmed"), None);
        assert!(AppointmentStatus::Pending.holds_time());
        assert!(AppointmentStatus::Approved.holds_time());
        assert!(!AppointmentStatus::Rejected.holds_time());
        assert!(!AppointmentStatus::Cancelled.holds_time());
    }

    #[test]
    fn test_slot_overrides_requested_time() {
        let now = chrono::Utc::now().naive_utc();
        let request = AppointmentRequest {
            id: "a1".to_string(),
            barber_id: "b1".to_string(),
            customer_name: "Sam".to_string(),
            customer_phone: "+15550001111".to_string(),
            customer_email: None,
            date: "2025-06-16".to_string(),
            requested_start_time: "10:00".to_string(),
            requested_end_time: None,
            status: AppointmentStatus::Approved,
            cancelled_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let mut appt = Appointment { request, slot: None };
        assert_eq!(appt.start_time(), "10:00");
        assert_eq!(appt.end_time(), None);

        appt.slot = Some(AppointmentSlot {
            id: "s1".to_string(),
            request_id: "a1".to_string(),
            barber_id: "b1".to_string(),
            date: "2025-06-16".to_string(),
            start_time: "10:30".to_string(),
            end_time: "11:15".to_string(),
        });
        assert_eq!(appt.start_time(), "10:30");
        assert_eq!(appt.end_time(), Some("11:15"));
    }
}
