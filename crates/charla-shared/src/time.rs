//! Timestamp normalization.
//!
//! Documents written by older clients carry timestamps in several shapes:
//! a native `{seconds, nanoseconds}` object, an ISO-8601 string, a bare
//! wall-clock `"HH:MM"` string, epoch milliseconds, or nothing at all.
//! [`TimeFormatter`] turns any of them into a `DateTime<Utc>`, a sortable
//! millisecond value, or a display string. Unparseable input always maps
//! to a sentinel and never to an error.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::constants::{NO_DATE, NO_TIME};

/// A timestamp as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Database-native timestamp object.
    Native {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: i64,
    },
    /// Epoch milliseconds.
    Millis(f64),
    /// ISO-8601 string or bare `HH:MM[:SS]`.
    Text(String),
    #[default]
    Null,
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Text(dt.to_rfc3339())
    }
}

impl From<Option<DateTime<Utc>>> for RawTimestamp {
    fn from(dt: Option<DateTime<Utc>>) -> Self {
        dt.map(RawTimestamp::from).unwrap_or(RawTimestamp::Null)
    }
}

impl From<&str> for RawTimestamp {
    fn from(s: &str) -> Self {
        RawTimestamp::Text(s.to_string())
    }
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Normalizes [`RawTimestamp`]s relative to a fixed display offset.
///
/// Wall-clock-only inputs (`"14:05"`) are resolved against *today* in that
/// offset, so every method takes the current instant explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFormatter {
    offset: FixedOffset,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimeFormatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Build from an offset in minutes east of UTC (Buenos Aires is -180).
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_datetime(&self, raw: &RawTimestamp, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match raw {
            RawTimestamp::Null => None,
            RawTimestamp::Native {
                seconds,
                nanoseconds,
            } => {
                let millis = seconds
                    .checked_mul(1000)?
                    .checked_add(nanoseconds / 1_000_000)?;
                Utc.timestamp_millis_opt(millis).single()
            }
            RawTimestamp::Millis(ms) => {
                if !ms.is_finite() || *ms == 0.0 {
                    return None;
                }
                Utc.timestamp_millis_opt(*ms as i64).single()
            }
            RawTimestamp::Text(s) => self.parse_text(s.trim(), now),
        }
    }

    /// Epoch milliseconds for sorting; `0` when the input is unusable.
    pub fn to_millis(&self, raw: &RawTimestamp, now: DateTime<Utc>) -> i64 {
        self.to_datetime(raw, now)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    /// 24-hour `HH:MM` in the display offset, or `"Sin hora"`.
    pub fn format_time(&self, raw: &RawTimestamp, now: DateTime<Utc>) -> String {
        match self.to_datetime(raw, now) {
            Some(dt) => dt.with_timezone(&self.offset).format("%H:%M").to_string(),
            None => NO_TIME.to_string(),
        }
    }

    /// Long Spanish date (`19 de octubre de 2026`), or `"Sin fecha"`.
    pub fn format_date(&self, raw: &RawTimestamp, now: DateTime<Utc>) -> String {
        use chrono::Datelike;

        match self.to_datetime(raw, now) {
            Some(dt) => {
                let local = dt.with_timezone(&self.offset);
                let month = MONTHS_ES[local.month0() as usize];
                format!("{} de {} de {}", local.day(), month, local.year())
            }
            None => NO_DATE.to_string(),
        }
    }

    fn parse_text(&self, s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        if let Some(time) = parse_wall_clock(s) {
            let today = now.with_timezone(&self.offset).date_naive();
            return self
                .offset
                .from_local_datetime(&today.and_time(time))
                .single()
                .map(|dt| dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        // ISO date-time without zone is local time, date-only is UTC.
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self
                    .offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc));
            }
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

/// `H:MM`, `HH:MM` or `HH:MM:SS`. Seconds are accepted but dropped.
fn parse_wall_clock(s: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let all_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    if parts[0].len() > 2 || !parts.iter().all(|p| all_digits(p)) {
        return None;
    }
    if parts[1..].iter().any(|p| p.len() != 2) {
        return None;
    }

    let h: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    NaiveTime::from_hms_opt(h, m, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0).unwrap()
    }

    #[test]
    fn native_object() {
        let fmt = TimeFormatter::utc();
        let raw = RawTimestamp::Native {
            seconds: 1_760_000_000,
            nanoseconds: 500_000_000,
        };
        assert_eq!(fmt.to_millis(&raw, now()), 1_760_000_000_500);
    }

    #[test]
    fn native_object_from_json_with_underscored_fields() {
        let raw: RawTimestamp =
            serde_json::from_str(r#"{"_seconds": 60, "_nanoseconds": 0}"#).unwrap();
        assert_eq!(
            raw,
            RawTimestamp::Native {
                seconds: 60,
                nanoseconds: 0
            }
        );
    }

    #[test]
    fn iso_string() {
        let fmt = TimeFormatter::utc();
        let raw = RawTimestamp::from("2026-10-19T08:05:00.000Z");
        assert_eq!(fmt.format_time(&raw, now()), "08:05");
        assert_eq!(fmt.format_date(&raw, now()), "19 de octubre de 2026");
    }

    #[test]
    fn wall_clock_string_is_today() {
        let fmt = TimeFormatter::utc();
        let raw = RawTimestamp::from("9:07");
        let dt = fmt.to_datetime(&raw, now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 10, 19, 9, 7, 0).unwrap());
        assert_eq!(fmt.format_time(&raw, now()), "09:07");

        let with_secs = RawTimestamp::from("23:59:58");
        assert_eq!(
            fmt.to_millis(&with_secs, now()),
            Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 0)
                .unwrap()
                .timestamp_millis()
        );
        assert_eq!(fmt.format_time(&with_secs, now()), "23:59");
    }

    #[test]
    fn wall_clock_respects_offset() {
        let fmt = TimeFormatter::from_offset_minutes(-180).unwrap();
        let raw = RawTimestamp::from("10:00");
        let dt = fmt.to_datetime(&raw, now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 10, 19, 13, 0, 0).unwrap());
        assert_eq!(fmt.format_time(&raw, now()), "10:00");
    }

    #[test]
    fn numeric_epoch_millis() {
        let fmt = TimeFormatter::utc();
        let raw: RawTimestamp = serde_json::from_str("1760882700000").unwrap();
        assert_eq!(fmt.to_millis(&raw, now()), 1_760_882_700_000);
    }

    #[test]
    fn sentinels_never_panic() {
        let fmt = TimeFormatter::utc();
        let bad = [
            RawTimestamp::Null,
            RawTimestamp::Millis(0.0),
            RawTimestamp::Millis(f64::NAN),
            RawTimestamp::Millis(f64::INFINITY),
            RawTimestamp::from(""),
            RawTimestamp::from("ayer"),
            RawTimestamp::from("25:00"),
            RawTimestamp::from("12:5"),
            RawTimestamp::from("123:45"),
            RawTimestamp::Native {
                seconds: i64::MAX,
                nanoseconds: 0,
            },
        ];
        for raw in &bad {
            assert_eq!(fmt.format_time(raw, now()), NO_TIME, "{raw:?}");
            assert_eq!(fmt.format_date(raw, now()), NO_DATE, "{raw:?}");
            assert_eq!(fmt.to_millis(raw, now()), 0, "{raw:?}");
        }
    }

    #[test]
    fn null_from_json() {
        let raw: RawTimestamp = serde_json::from_str("null").unwrap();
        assert_eq!(raw, RawTimestamp::Null);
    }

    #[test]
    fn date_only_string() {
        let fmt = TimeFormatter::utc();
        let raw = RawTimestamp::from("2025-01-02");
        assert_eq!(fmt.format_date(&raw, now()), "2 de enero de 2025");
    }
}
