use serde::Serialize;

use crate::errors::AppError;
use crate::models::CancelledBy;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Barber,
}

/// Authenticated staff member behind an admin API call.
#[derive(Debug, Clone, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn admin() -> Self {
        Self {
            user_id: "admin".to_string(),
            role: Role::Admin,
        }
    }

    pub fn barber(barber_id: &str) -> Self {
        Self {
            user_id: barber_id.to_string(),
            role: Role::Barber,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins reach every barber; barbers only themselves.
    pub fn ensure_can_access(&self, barber_id: &str) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == barber_id {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "barber {} cannot act on barber {barber_id}",
                self.user_id
            )))
        }
    }

    pub fn ensure_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("admin role required".to_string()))
        }
    }

    /// Barber-scoped listing filter; `None` means every barber.
    pub fn barber_scope(&self) -> Option<&str> {
        match self.role {
            Role::Admin => None,
            Role::Barber => Some(&self.user_id),
        }
    }

    pub fn cancelled_by(&self) -> CancelledBy {
        match self.role {
            Role::Admin => CancelledBy::Admin,
            Role::Barber => CancelledBy::Barber,
        }
    }
}
