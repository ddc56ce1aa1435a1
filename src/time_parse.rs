//! The timestamp grammar accepted by `at/<time>`.
//!
//! Accepts raw epoch integers (nanoseconds/milliseconds/seconds, disambiguated by magnitude),
//! several fixed textual formats, and progressively coarser date/time prefixes padded with
//! zeros in UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::errors::PosixError;

const NANOS_THRESHOLD: i64 = 2_147_483_648 * 1000;
const MILLIS_THRESHOLD: i64 = 2_147_483_648;
const SECONDS_THRESHOLD: i64 = 10_000;

/// Parses a timestamp string accepted in an `at/<time>` path component.
pub fn parse_at_time(s: &str) -> Result<DateTime<Utc>, PosixError> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = s.parse::<i64>() {
            if n > NANOS_THRESHOLD {
                let secs = n / 1_000_000_000;
                let nanos = (n % 1_000_000_000) as u32;
                return DateTime::from_timestamp(secs, nanos)
                    .ok_or_else(|| PosixError::invalid(format!("timestamp out of range: {s}")));
            } else if n > MILLIS_THRESHOLD {
                let secs = n / 1000;
                let nanos = ((n % 1000) * 1_000_000) as u32;
                return DateTime::from_timestamp(secs, nanos)
                    .ok_or_else(|| PosixError::invalid(format!("timestamp out of range: {s}")));
            } else if n > SECONDS_THRESHOLD {
                return DateTime::from_timestamp(n, 0)
                    .ok_or_else(|| PosixError::invalid(format!("timestamp out of range: {s}")));
            }
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S GMT") {
        return Ok(ndt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        // Ruby date, e.g. "Mon Jan 02 15:04:05 +0000 2006"
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%a %b %e %H:%M:%S %Y") {
        // ANSI C date, e.g. "Mon Jan  2 15:04:05 2006"
        return Ok(ndt.and_utc());
    }
    if let Some(dt) = parse_unix_date(s) {
        return Ok(dt);
    }
    if let Some(dt) = parse_coarse_prefix(s) {
        return Ok(dt);
    }

    Err(PosixError::invalid(format!(
        "unparseable at/<time> value: {s:?}"
    )))
}

/// Go's `time.UnixDate` layout, e.g. "Mon Jan  2 15:04:05 UTC 2006". chrono cannot resolve
/// arbitrary timezone abbreviations, so only the handful actually seen in practice are mapped.
fn parse_unix_date(s: &str) -> Option<DateTime<Utc>> {
    let fields: Vec<&str> = s.split_whitespace().collect();
    if fields.len() != 6 {
        return None;
    }
    let offset_hours: i32 = match fields[4] {
        "UTC" | "GMT" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    let without_zone = format!(
        "{} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], fields[5]
    );
    let ndt = NaiveDateTime::parse_from_str(&without_zone, "%a %b %e %H:%M:%S %Y").ok()?;
    Some((ndt - chrono::Duration::hours(offset_hours as i64)).and_utc())
}

/// The progressively coarser `YYYY[-MM[-DDTHH[:MM]]]` prefixes, zero-padded in UTC.
fn parse_coarse_prefix(s: &str) -> Option<DateTime<Utc>> {
    let (date_part, time_part) = match s.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (s, None),
    };

    let date_fields: Vec<&str> = date_part.split('-').collect();
    let year: i32 = date_fields.first()?.parse().ok()?;
    if date_fields.first()?.len() != 4 {
        return None;
    }
    let month: u32 = match date_fields.get(1) {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    let day: u32 = match date_fields.get(2) {
        Some(d) => d.parse().ok()?,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let (hour, minute) = match time_part {
        None => (0, 0),
        Some(t) => {
            let time_fields: Vec<&str> = t.split(':').collect();
            let hour: u32 = time_fields.first()?.parse().ok()?;
            let minute: u32 = match time_fields.get(1) {
                Some(m) => m.parse().ok()?,
                None => 0,
            };
            (hour, minute)
        }
    };

    let ndt = date.and_hms_opt(hour, minute, 0)?;
    Some(ndt.and_utc())
}

/// Formats a timestamp as RFC3339 with nanosecond precision, trimming trailing zeros from
/// the fractional part entirely (not just to the nearest milli/micro/nano boundary), and
/// omitting the fractional part altogether when it is zero.
pub fn format_rfc3339_nano(dt: DateTime<Utc>) -> String {
    let base = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = dt.nanosecond();
    if nanos == 0 {
        format!("{base}Z")
    } else {
        let frac = format!("{:09}", nanos);
        let trimmed = frac.trim_end_matches('0');
        format!("{base}.{trimmed}Z")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str, expected: &str) {
        let dt = parse_at_time(input).unwrap_or_else(|e| panic!("parsing {input:?}: {e}"));
        assert_eq!(format_rfc3339_nano(dt), expected, "input={input:?}");
    }

    #[test]
    fn s5_timestamp_roundtrips() {
        roundtrip("1346189075", "2012-08-28T21:24:35Z");
        roundtrip("1346189075374", "2012-08-28T21:24:35.374Z");
        roundtrip("1346189075374651880", "2012-08-28T21:24:35.37465188Z");
        roundtrip("2012", "2012-01-01T00:00:00Z");
        roundtrip("2012-08-28T21", "2012-08-28T21:00:00Z");
    }

    #[test]
    fn coarse_prefixes() {
        roundtrip("2012-08", "2012-08-01T00:00:00Z");
        roundtrip("2012-08-28", "2012-08-28T00:00:00Z");
        roundtrip("2012-08-28T21:24", "2012-08-28T21:24:00Z");
    }

    #[test]
    fn rfc3339_passthrough() {
        roundtrip("2012-08-28T21:24:35Z", "2012-08-28T21:24:35Z");
        roundtrip("2012-08-28T21:24:35.374Z", "2012-08-28T21:24:35.374Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_at_time("not a time").is_err());
    }
}
