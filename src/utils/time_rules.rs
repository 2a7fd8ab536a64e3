use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::attendance::{AttendanceRecord, Status};

static CUTOFF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap());

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CutoffTime {
    pub hour: u32,
    pub minute: u32,
}

pub fn parse_cutoff_time(value: &str) -> Option<CutoffTime> {
    let caps = CUTOFF_RE.captures(value)?;
    Some(CutoffTime {
        hour: caps[1].parse().ok()?,
        minute: caps[2].parse().ok()?,
    })
}

/// Wall-clock hour/minute of `instant` in the given IANA zone. An absent or
/// unknown zone id falls back to the host zone; callers never see an error.
pub fn local_time_parts(instant: DateTime<Utc>, timezone: Option<&str>) -> (u32, u32) {
    match timezone.and_then(|id| id.parse::<Tz>().ok()) {
        Some(zone) => {
            let local = instant.with_timezone(&zone);
            (local.hour(), local.minute())
        }
        None => {
            let local = instant.with_timezone(&chrono::Local);
            (local.hour(), local.minute())
        }
    }
}

/// Classify an instant against the cutoff. The boundary is inclusive: a
/// capture at exactly the cutoff minute is on time. A malformed cutoff
/// string counts as 08:00 so a corrupt setting never blocks check-ins.
pub fn status_for_time(
    instant: DateTime<Utc>,
    timezone: Option<&str>,
    cutoff_time: &str,
) -> Status {
    let cutoff = parse_cutoff_time(cutoff_time).unwrap_or(CutoffTime { hour: 8, minute: 0 });
    let (hour, minute) = local_time_parts(instant, timezone);
    if hour < cutoff.hour || (hour == cutoff.hour && minute <= cutoff.minute) {
        Status::OnTime
    } else {
        Status::Late
    }
}

pub fn status_for_record(record: &AttendanceRecord, cutoff_time: &str) -> Status {
    status_for_time(record.captured_at, record.timezone.as_deref(), cutoff_time)
}

pub fn format_time_in_zone(instant: DateTime<Utc>, timezone: Option<&str>) -> String {
    match timezone.and_then(|id| id.parse::<Tz>().ok()) {
        Some(zone) => instant.with_timezone(&zone).format("%H:%M").to_string(),
        None => instant.with_timezone(&chrono::Local).format("%H:%M").to_string(),
    }
}

pub fn format_date_in_zone(instant: DateTime<Utc>, timezone: Option<&str>) -> String {
    match timezone.and_then(|id| id.parse::<Tz>().ok()) {
        Some(zone) => instant.with_timezone(&zone).format("%Y-%m-%d").to_string(),
        None => instant
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_cutoff_time() {
        assert_eq!(
            parse_cutoff_time("08:00"),
            Some(CutoffTime { hour: 8, minute: 0 })
        );
        assert_eq!(
            parse_cutoff_time("23:59"),
            Some(CutoffTime { hour: 23, minute: 59 })
        );
        assert_eq!(parse_cutoff_time("24:00"), None);
        assert_eq!(parse_cutoff_time("8:00"), None);
        assert_eq!(parse_cutoff_time("08:60"), None);
        assert_eq!(parse_cutoff_time("nonsense"), None);
    }

    #[test]
    fn test_local_time_parts_in_zone() {
        // 02:05 UTC is 08:05 in Dhaka (+06:00, no DST)
        let instant = utc(2026, 1, 5, 2, 5, 0);
        assert_eq!(local_time_parts(instant, Some("Asia/Dhaka")), (8, 5));
        assert_eq!(local_time_parts(instant, Some("UTC")), (2, 5));
    }

    #[test]
    fn test_invalid_zone_falls_back_without_error() {
        let instant = utc(2026, 1, 5, 2, 5, 0);
        let fallback = local_time_parts(instant, None);
        assert_eq!(local_time_parts(instant, Some("Not/AZone")), fallback);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // exactly 08:00:00 local
        let at_cutoff = utc(2026, 1, 5, 2, 0, 0);
        assert_eq!(
            status_for_time(at_cutoff, Some("Asia/Dhaka"), "08:00"),
            Status::OnTime
        );
        // 08:00:59 still within the cutoff minute
        let same_minute = utc(2026, 1, 5, 2, 0, 59);
        assert_eq!(
            status_for_time(same_minute, Some("Asia/Dhaka"), "08:00"),
            Status::OnTime
        );
        // 08:01 is late
        let one_past = utc(2026, 1, 5, 2, 1, 0);
        assert_eq!(
            status_for_time(one_past, Some("Asia/Dhaka"), "08:00"),
            Status::Late
        );
    }

    #[test]
    fn test_earlier_hour_is_on_time() {
        let early = utc(2026, 1, 5, 1, 30, 0);
        assert_eq!(
            status_for_time(early, Some("Asia/Dhaka"), "08:00"),
            Status::OnTime
        );
    }

    #[test]
    fn test_malformed_cutoff_substitutes_default() {
        let instant = utc(2026, 1, 5, 1, 59, 0); // 07:59 Dhaka
        assert_eq!(
            status_for_time(instant, Some("Asia/Dhaka"), "not-a-time"),
            Status::OnTime
        );
        let later = utc(2026, 1, 5, 2, 1, 0); // 08:01 Dhaka
        assert_eq!(
            status_for_time(later, Some("Asia/Dhaka"), "25:99"),
            Status::Late
        );
    }

    #[test]
    fn test_no_timezone_still_classifies() {
        let instant = utc(2026, 1, 5, 2, 5, 0);
        let status = status_for_time(instant, None, "08:00");
        assert!(matches!(status, Status::OnTime | Status::Late));
    }

    #[test]
    fn test_format_time_in_zone() {
        let instant = utc(2026, 1, 5, 2, 5, 0);
        assert_eq!(format_time_in_zone(instant, Some("Asia/Dhaka")), "08:05");
        assert_eq!(format_date_in_zone(instant, Some("Asia/Dhaka")), "2026-01-05");
        // west of Greenwich the local date can lag the UTC date
        assert_eq!(
            format_date_in_zone(utc(2026, 1, 5, 2, 5, 0), Some("America/New_York")),
            "2026-01-04"
        );
    }
}
