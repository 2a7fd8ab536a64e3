use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: u8,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// User shape returned to clients; never carries credential material.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[schema(example = "user", value_type = String)]
    pub role: &'static str,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl PublicUser {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: Role::from_id(user.role_id).unwrap_or(Role::User).as_str(),
            created_at: user.created_at,
        }
    }
}

/// The roster a report's date range is densified against.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct RosterUser {
    pub id: u64,
    pub name: String,
    pub email: String,
}
