use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::Role;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DISABLED: &str = "disabled";

/// An account that can sign in to the admin API. Created by an
/// administrator; never self-registered.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub nickname: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Parse the stored role into the closed enum. A row with an unknown
    /// role string is data corruption and surfaces as an error rather than
    /// defaulting to any privilege level.
    pub fn role(&self) -> Result<Role, String> {
        self.role.parse()
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}
