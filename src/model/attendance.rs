use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted classification of a check-in against the daily cutoff.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    OnTime,
    Late,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::OnTime => "on-time",
            Status::Late => "late",
        }
    }
}

/// Status as a report sees it. `Missing` exists only here: the aggregator
/// synthesizes it for user-days without a record, and the type split keeps
/// it out of the storage layer entirely.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReportStatus {
    Recorded(Status),
    Missing,
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Recorded(Status::OnTime) => "On time",
            ReportStatus::Recorded(Status::Late) => "Late",
            ReportStatus::Missing => "Missing",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    #[schema(example = "2026-01-05")]
    pub date_key: String,
    pub user_id: u64,
    /// Display-name snapshot taken at capture time; not revised on rename.
    pub user_name: String,
    #[schema(example = "2026-01-05T02:05:00Z", format = "date-time", value_type = String)]
    pub captured_at: DateTime<Utc>,
    #[schema(example = "on-time")]
    pub status: String,
    pub location_label: String,
    pub photo_url: Option<String>,
    pub photo_public_id: Option<String>,
    pub flag_comment: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub flagged_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    #[schema(example = "Asia/Dhaka")]
    pub timezone: Option<String>,
}
