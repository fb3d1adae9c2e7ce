use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::clock::parse_time_to_minutes;

/// One barber's hours for one weekday (0 = Sunday … 6 = Saturday).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingHours {
    pub barber_id: String,
    pub weekday: u8,
    pub is_working: bool,
    pub start_time: String,
    pub end_time: String,
}

impl WorkingHours {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.weekday > 6 {
            return Err(AppError::invalid(format!(
                "weekday must be 0-6, got {}",
                self.weekday
            )));
        }
        if !self.is_working {
            return Ok(());
        }
        let start = parse_time_to_minutes(&self.start_time)?;
        let end = parse_time_to_minutes(&self.end_time)?;
        if start >= end {
            return Err(AppError::invalid(format!(
                "start time {} must be before end time {}",
                self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn weekday_name(weekday: u8) -> &'static str {
    match weekday {
        0 => "sun",
        1 => "mon",
        2 => "tue",
        3 => "wed",
        4 => "thu",
        5 => "fri",
        6 => "sat",
        _ => "?",
    }
}
