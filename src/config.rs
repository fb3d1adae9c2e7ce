use std::env;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::reminders::DEFAULT_TOLERANCE_MINUTES;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub admin_phone: String,
    pub reminder_interval_secs: u64,
    /// Minutes either side of a reminder's target time that still count as due.
    pub reminder_tolerance_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "barberbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            admin_phone: env::var("ADMIN_PHONE").unwrap_or_default(),
            reminder_interval_secs: env::var("REMINDER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            reminder_tolerance_minutes: env::var("REMINDER_TOLERANCE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m| *m >= 0)
                .unwrap_or(DEFAULT_TOLERANCE_MINUTES),
        }
    }
}

const KEY_SHOP_NAME: &str = "shop_name";
const KEY_ADMIN_PHONE: &str = "admin_phone";
const KEY_SMS_SENDER: &str = "sms_sender";
const KEY_CANCELLATION_WINDOW: &str = "cancellation_window_hours";

/// Shop-level settings. Read from the `settings` table once at startup, with
/// the process config as fallback, and handed to whoever needs them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub shop_name: String,
    /// House phone; appointments booked under it get no reminders.
    pub admin_phone: String,
    /// Name prefixed to every outbound SMS.
    pub sms_sender: String,
    /// Customers cannot cancel closer than this to the start time.
    pub cancellation_window_hours: i64,
}

impl Settings {
    pub fn defaults(config: &AppConfig) -> Self {
        Self {
            shop_name: "Barbershop".to_string(),
            admin_phone: config.admin_phone.clone(),
            sms_sender: "Barbershop".to_string(),
            cancellation_window_hours: 2,
        }
    }

    pub fn load(conn: &Connection, config: &AppConfig) -> anyhow::Result<Self> {
        let defaults = Self::defaults(config);
        let text = |key: &str, fallback: String| -> anyhow::Result<String> {
            Ok(queries::get_setting(conn, key)?
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(fallback))
        };

        let cancellation_window_hours = match queries::get_setting(conn, KEY_CANCELLATION_WINDOW)? {
            Some(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("setting {KEY_CANCELLATION_WINDOW} is not a number: {raw:?}")
            })?,
            None => defaults.cancellation_window_hours,
        };

        let settings = Self {
            shop_name: text(KEY_SHOP_NAME, defaults.shop_name)?,
            admin_phone: text(KEY_ADMIN_PHONE, defaults.admin_phone)?,
            sms_sender: text(KEY_SMS_SENDER, defaults.sms_sender)?,
            cancellation_window_hours,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.shop_name.trim().is_empty() {
            return Err(AppError::invalid("shop_name must not be empty"));
        }
        if !(0..=168).contains(&self.cancellation_window_hours) {
            return Err(AppError::invalid(
                "cancellation_window_hours must be between 0 and 168",
            ));
        }
        Ok(())
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        queries::set_setting(conn, KEY_SHOP_NAME, &self.shop_name)?;
        queries::set_setting(conn, KEY_ADMIN_PHONE, &self.admin_phone)?;
        queries::set_setting(conn, KEY_SMS_SENDER, &self.sms_sender)?;
        queries::set_setting(
            conn,
            KEY_CANCELLATION_WINDOW,
            &self.cancellation_window_hours.to_string(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_token: "t".to_string(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            admin_phone: "+15559999999".to_string(),
            reminder_interval_secs: 300,
            reminder_tolerance_minutes: 5,
        }
    }

    #[test]
    fn test_load_falls_back_to_config() {
        let conn = db::init_db(":memory:").unwrap();
        let settings = Settings::load(&conn, &config()).unwrap();
        assert_eq!(settings, Settings::defaults(&config()));
        assert_eq!(settings.admin_phone, "+15559999999");
    }

    #[test]
    fn test_saved_settings_win() {
        let conn = db::init_db(":memory:").unwrap();
        let mut settings = Settings::defaults(&config());
        settings.shop_name = "Fade Factory".to_string();
        settings.cancellation_window_hours = 12;
        settings.save(&conn).unwrap();

        let loaded = Settings::load(&conn, &config()).unwrap();
        assert_eq!(loaded.shop_name, "Fade Factory");
        assert_eq!(loaded.cancellation_window_hours, 12);
    }

    #[test]
    fn test_bad_window_rejected() {
        let conn = db::init_db(":memory:").unwrap();
        queries::set_setting(&conn, KEY_CANCELLATION_WINDOW, "soon").unwrap();
        assert!(Settings::load(&conn, &config()).is_err());

        let mut settings = Settings::defaults(&config());
        settings.cancellation_window_hours = -1;
        assert!(settings.validate().is_err());
    }
}
