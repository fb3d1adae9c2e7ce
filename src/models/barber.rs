use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barber {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub is_active: bool,
}
