use chrono::Duration;

use crate::errors::AppError;
use crate::models::Appointment;
use crate::services::booking::starts_at;
use crate::services::clock::parse_time_to_minutes;
use crate::services::slots::SLOT_MINUTES;

pub fn generate_ics(appointment: &Appointment, shop_name: &str, barber_name: &str) -> Result<String, AppError> {
    let start = starts_at(appointment)?;
    let length = match appointment.end_time() {
        Some(end) => parse_time_to_minutes(end)? - parse_time_to_minutes(appointment.start_time())?,
        None => SLOT_MINUTES,
    };
    let end = start + Duration::minutes(length as i64);

    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = end.format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = appointment.request.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@barberbook", appointment.request.id);

    let summary = format!("{shop_name} with {barber_name}");
    let description = appointment
        .request
        .notes
        .as_deref()
        .unwrap_or("No additional notes");

    Ok(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Barberbook//Appointments//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use crate::models::{AppointmentRequest, AppointmentSlot, AppointmentStatus};

    fn appointment(slot: Option<(&str, &str)>, notes: Option<&str>) -> Appointment {
        let created = NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Appointment {
            request: AppointmentRequest {
                id: "test-123".to_string(),
                barber_id: "b1".to_string(),
                customer_name: "Alice".to_string(),
                customer_phone: "+1234567890".to_string(),
                customer_email: None,
                date: "2025-03-15".to_string(),
                requested_start_time: "14:00".to_string(),
                requested_end_time: None,
                status: AppointmentStatus::Approved,
                cancelled_by: None,
                notes: notes.map(str::to_string),
                created_at: created,
                updated_at: created,
            },
            slot: slot.map(|(start, end)| AppointmentSlot {
                id: "s1".to_string(),
                request_id: "test-123".to_string(),
                barber_id: "b1".to_string(),
                date: "2025-03-15".to_string(),
                start_time: start.to_string(),
                end_time: end.to_string(),
            }),
        }
    }

    #[test]
    fn test_generate_ics_uses_slot() {
        let ics = generate_ics(&appointment(Some(("14:30", "15:30")), Some("Skin fade")), "Fade Factory", "Marco").unwrap();
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("DTSTART:20250315T143000"));
        assert!(ics.contains("DTEND:20250315T153000"));
        assert!(ics.contains("DTSTAMP:20250310T100000"));
        assert!(ics.contains("SUMMARY:Fade Factory with Marco"));
        assert!(ics.contains("DESCRIPTION:Skin fade"));
        assert!(ics.contains("UID:test-123@barberbook"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_generate_ics_defaults_to_one_slot() {
        let ics = generate_ics(&appointment(None, None), "Test Shop", "Lee").unwrap();
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T143000"));
        assert!(ics.contains("DESCRIPTION:No additional notes"));
    }
}
