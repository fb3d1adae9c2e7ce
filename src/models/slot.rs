use serde::{Deserialize, Serialize};

/// Candidate slot handed to the booking UI. Built per query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}
