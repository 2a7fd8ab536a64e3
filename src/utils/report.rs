use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, ReportStatus, Status};
use crate::model::user::RosterUser;
use crate::utils::time_rules::{
    format_date_in_zone, format_time_in_zone, status_for_record,
};

static DATE_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static MONTH_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

pub const EXPORT_HEADERS: [&str; 6] =
    ["Date", "Time", "Employee", "Status", "Location", "Flag Comment"];

pub fn is_valid_date_key(value: &str) -> bool {
    DATE_KEY_RE.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

pub fn is_valid_month_key(value: &str) -> bool {
    MONTH_KEY_RE.is_match(value)
}

/// Calendar day the registrar stamps on new records: the server's own UTC
/// date, not the user's local one.
pub fn today_key() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

pub fn current_month_key() -> String {
    Utc::now().format("%Y-%m").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRange {
    pub start: String,
    pub end: String,
}

/// A single `date` is shorthand for `start=end=date`; one missing endpoint
/// defaults to the other. Malformed keys or `start > end` yield `None`.
pub fn resolve_export_range(
    date: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> Option<ExportRange> {
    let (mut start, mut end) = (start, end);
    if start.is_none() && end.is_none() {
        start = date;
        end = date;
    }
    let start = start.or(end)?;
    let end = end.or(Some(start))?;

    if !is_valid_date_key(start) || !is_valid_date_key(end) {
        return None;
    }
    if start > end {
        return None;
    }

    Some(ExportRange {
        start: start.to_string(),
        end: end.to_string(),
    })
}

/// Every calendar day in the inclusive range, as date keys.
pub fn date_keys_between(start: &str, end: &str) -> Vec<String> {
    let (Ok(start), Ok(end)) = (
        NaiveDate::parse_from_str(start, "%Y-%m-%d"),
        NaiveDate::parse_from_str(end, "%Y-%m-%d"),
    ) else {
        return Vec::new();
    };

    let mut keys = Vec::new();
    let mut current = start;
    while current <= end {
        keys.push(current.format("%Y-%m-%d").to_string());
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    keys
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub on_time: u32,
    pub late: u32,
    pub total: u32,
    pub punctuality_rate: u32,
}

pub fn monthly_stats(statuses: &[Status]) -> MonthlyStats {
    let on_time = statuses.iter().filter(|s| **s == Status::OnTime).count() as u32;
    let late = statuses.iter().filter(|s| **s == Status::Late).count() as u32;
    let total = statuses.len() as u32;
    let punctuality_rate = if total == 0 {
        0
    } else {
        ((f64::from(on_time) / f64::from(total)) * 100.0).round() as u32
    };
    MonthlyStats {
        on_time,
        late,
        total,
        punctuality_rate,
    }
}

/// Reports never trust the persisted status; it is re-derived against the
/// cutoff in force at read time.
pub fn apply_current_status(record: &mut AttendanceRecord, cutoff_time: &str) {
    record.status = status_for_record(record, cutoff_time).as_str().to_string();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub date: String,
    pub time: String,
    pub employee: String,
    pub status: String,
    pub location: String,
    pub flag_comment: String,
}

impl ExportRow {
    pub fn cells(&self) -> [&str; 6] {
        [
            &self.date,
            &self.time,
            &self.employee,
            &self.status,
            &self.location,
            &self.flag_comment,
        ]
    }

    fn missing(date_key: &str, user_name: &str) -> Self {
        Self {
            date: date_key.to_string(),
            time: String::new(),
            employee: user_name.to_string(),
            status: ReportStatus::Missing.label().to_string(),
            location: String::new(),
            flag_comment: String::new(),
        }
    }

    fn recorded(record: &AttendanceRecord, cutoff_time: &str) -> Self {
        let status = ReportStatus::Recorded(status_for_record(record, cutoff_time));
        Self {
            date: record.date_key.clone(),
            time: format_time_in_zone(record.captured_at, record.timezone.as_deref()),
            employee: record.user_name.clone(),
            status: status.label().to_string(),
            location: record.location_label.clone(),
            flag_comment: record.flag_comment.clone().unwrap_or_default(),
        }
    }
}

/// Densified day × user matrix for a range export: a row for every pair,
/// synthesizing `Missing` where no record exists. Rows come out date
/// ascending, then roster (name) order within each date.
pub fn range_export_rows(
    range: &ExportRange,
    users: &[RosterUser],
    records: &[AttendanceRecord],
    cutoff_time: &str,
) -> Vec<ExportRow> {
    let by_user_day: HashMap<(u64, &str), &AttendanceRecord> = records
        .iter()
        .map(|record| ((record.user_id, record.date_key.as_str()), record))
        .collect();

    let mut rows = Vec::new();
    for date_key in date_keys_between(&range.start, &range.end) {
        for user in users {
            match by_user_day.get(&(user.id, date_key.as_str())) {
                Some(record) => rows.push(ExportRow::recorded(record, cutoff_time)),
                None => rows.push(ExportRow::missing(&date_key, &user.name)),
            }
        }
    }
    rows
}

/// Rows for a single user's month export, in capture order; the date column
/// is rendered in the record's own zone here, unlike the range export which
/// groups by the server-side date key.
pub fn user_month_rows(records: &[AttendanceRecord], cutoff_time: &str) -> Vec<ExportRow> {
    records
        .iter()
        .map(|record| {
            let mut row = ExportRow::recorded(record, cutoff_time);
            row.date = format_date_in_zone(record.captured_at, record.timezone.as_deref());
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: u64, user_id: u64, date_key: &str, hour_utc: u32) -> AttendanceRecord {
        AttendanceRecord {
            id,
            date_key: date_key.to_string(),
            user_id,
            user_name: format!("user-{user_id}"),
            captured_at: Utc.with_ymd_and_hms(2024, 1, 1, hour_utc, 30, 0).unwrap(),
            status: "on-time".to_string(),
            location_label: "HQ".to_string(),
            photo_url: None,
            photo_public_id: None,
            flag_comment: None,
            flagged_at: None,
            latitude: None,
            longitude: None,
            accuracy: None,
            timezone: Some("UTC".to_string()),
        }
    }

    fn roster(ids: &[(u64, &str)]) -> Vec<RosterUser> {
        ids.iter()
            .map(|(id, name)| RosterUser {
                id: *id,
                name: (*name).to_string(),
                email: format!("{name}@example.com"),
            })
            .collect()
    }

    #[test]
    fn test_resolve_export_range() {
        assert_eq!(
            resolve_export_range(Some("2024-01-02"), None, None),
            Some(ExportRange {
                start: "2024-01-02".to_string(),
                end: "2024-01-02".to_string()
            })
        );
        assert_eq!(
            resolve_export_range(None, Some("2024-01-01"), None),
            Some(ExportRange {
                start: "2024-01-01".to_string(),
                end: "2024-01-01".to_string()
            })
        );
        assert_eq!(
            resolve_export_range(None, None, Some("2024-01-03")),
            Some(ExportRange {
                start: "2024-01-03".to_string(),
                end: "2024-01-03".to_string()
            })
        );
        // start after end is rejected
        assert_eq!(
            resolve_export_range(None, Some("2024-01-05"), Some("2024-01-01")),
            None
        );
        assert_eq!(resolve_export_range(Some("01/02/2024"), None, None), None);
        assert_eq!(resolve_export_range(None, None, None), None);
    }

    #[test]
    fn test_date_keys_between_crosses_month_boundary() {
        let keys = date_keys_between("2024-01-30", "2024-02-02");
        assert_eq!(keys, ["2024-01-30", "2024-01-31", "2024-02-01", "2024-02-02"]);
        assert!(date_keys_between("2024-01-02", "2024-01-01").is_empty());
    }

    #[test]
    fn test_monthly_stats_guards_empty_month() {
        let stats = monthly_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.punctuality_rate, 0);
    }

    #[test]
    fn test_monthly_stats_rounds_rate() {
        let stats = monthly_stats(&[
            Status::OnTime,
            Status::OnTime,
            Status::OnTime,
            Status::Late,
        ]);
        assert_eq!(stats.on_time, 3);
        assert_eq!(stats.late, 1);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.punctuality_rate, 75);
    }

    #[test]
    fn test_range_export_densifies_missing_days() {
        let range = ExportRange {
            start: "2024-01-01".to_string(),
            end: "2024-01-03".to_string(),
        };
        let users = roster(&[(1, "alice"), (2, "bob")]);
        let records = vec![record(10, 1, "2024-01-02", 7)];

        let rows = range_export_rows(&range, &users, &records, "08:00");

        assert_eq!(rows.len(), 6);
        let missing = rows.iter().filter(|r| r.status == "Missing").count();
        assert_eq!(missing, 5);

        // date ascending, then roster order within each date
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[0].employee, "alice");
        assert_eq!(rows[1].employee, "bob");
        assert_eq!(rows[2].date, "2024-01-02");

        let present = rows.iter().find(|r| r.status != "Missing").unwrap();
        assert_eq!(present.date, "2024-01-02");
        assert_eq!(present.status, "On time");
        assert_eq!(present.location, "HQ");
    }

    #[test]
    fn test_missing_rows_have_blank_fields() {
        let range = ExportRange {
            start: "2024-01-01".to_string(),
            end: "2024-01-01".to_string(),
        };
        let rows = range_export_rows(&range, &roster(&[(1, "alice")]), &[], "08:00");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "Missing");
        assert_eq!(rows[0].time, "");
        assert_eq!(rows[0].location, "");
        assert_eq!(rows[0].flag_comment, "");
    }

    #[test]
    fn test_export_rows_reclassify_against_current_cutoff() {
        let range = ExportRange {
            start: "2024-01-01".to_string(),
            end: "2024-01-01".to_string(),
        };
        let users = roster(&[(1, "alice")]);
        // captured 07:30 UTC, persisted as on-time
        let records = vec![record(10, 1, "2024-01-01", 7)];

        let relaxed = range_export_rows(&range, &users, &records, "08:00");
        assert_eq!(relaxed[0].status, "On time");

        // tightening the cutoff flips the same record on the next read
        let strict = range_export_rows(&range, &users, &records, "07:00");
        assert_eq!(strict[0].status, "Late");
    }

    #[test]
    fn test_user_month_rows_render_in_record_zone() {
        let mut r = record(10, 1, "2024-01-01", 20);
        r.timezone = Some("Asia/Dhaka".to_string());
        let rows = user_month_rows(&[r], "08:00");
        // 20:30 UTC on Jan 1 is 02:30 on Jan 2 in Dhaka
        assert_eq!(rows[0].date, "2024-01-02");
        assert_eq!(rows[0].time, "02:30");
    }

    #[test]
    fn test_is_valid_date_key_rejects_impossible_dates() {
        assert!(is_valid_date_key("2024-02-29"));
        assert!(!is_valid_date_key("2023-02-29"));
        assert!(!is_valid_date_key("2024-13-01"));
        assert!(!is_valid_date_key("2024-1-1"));
    }
}
