use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsStatus {
    Success,
    Error,
}

impl SmsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsStatus::Success => "success",
            SmsStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => SmsStatus::Success,
            _ => SmsStatus::Error,
        }
    }
}

/// Append-only record of every outbound SMS. `event` doubles as the
/// idempotency key for reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsLog {
    pub id: i64,
    pub to: String,
    pub message: String,
    pub event: String,
    pub status: SmsStatus,
    pub error: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemJobLog {
    pub id: i64,
    pub job_name: String,
    pub status: String,
    pub reminders_2h_sent: i64,
    pub reminders_1h_sent: i64,
    pub skipped: i64,
    pub errors: i64,
    pub total_approved: i64,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}
