//! Timestamp normalization and timezone resolution
//!
//! Converts the loosely-typed timestamp values of a raw table (epoch
//! integers, ISO-8601-ish text, already-zoned instants) into
//! timezone-aware instants in one target IANA zone. Every value is taken
//! to an absolute instant first; naive text is localized into the target
//! zone, everything else is converted into it.

use chrono::{
    DateTime, Days, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Error, Result};
use crate::table::Value;

/// Zone used when neither the caller nor the host environment supplies one
pub const FALLBACK_TZ: &str = "Etc/UTC";

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Unit of numeric epoch offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    Seconds,
    /// The wire unit of every supported source format
    #[default]
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    fn nanos_per_unit(self) -> i128 {
        match self {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }
}

/// A single date-like input to the date filter
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    /// Epoch offset, scaled by the operation's [`TimeUnit`]
    Epoch(i64),
    /// ISO-8601-ish text; naive text is localized into the target zone
    Text(String),
    /// An already-zoned instant, converted into the target zone
    Instant(DateTime<FixedOffset>),
}

impl From<i64> for DateInput {
    fn from(n: i64) -> DateInput {
        DateInput::Epoch(n)
    }
}

impl From<&str> for DateInput {
    fn from(s: &str) -> DateInput {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> DateInput {
        DateInput::Text(s)
    }
}

impl From<DateTime<FixedOffset>> for DateInput {
    fn from(dt: DateTime<FixedOffset>) -> DateInput {
        DateInput::Instant(dt)
    }
}

/// Resolve a timezone name to a concrete IANA zone.
///
/// `None` asks the host environment for its zone; when that is
/// unavailable (or not a recognized IANA name) the resolution falls back
/// to [`FALLBACK_TZ`] with a non-fatal warning. An explicit name that is
/// not a recognized IANA identifier is an error.
pub fn resolve_tz(tz: Option<&str>) -> Result<Tz> {
    match tz {
        Some(name) => name.parse::<Tz>().map_err(|_| {
            Error::InvalidData(format!("Invalid IANA timezone string: {}", name))
        }),
        None => match iana_time_zone::get_timezone() {
            Ok(name) => match name.parse::<Tz>() {
                Ok(zone) => Ok(zone),
                Err(_) => {
                    warn!(
                        "Host timezone '{}' is not a recognized IANA zone, falling back to {}",
                        name, FALLBACK_TZ
                    );
                    Ok(Tz::Etc__UTC)
                }
            },
            Err(_) => {
                warn!(
                    "No timezone specified and the host zone is unavailable, falling back to {}",
                    FALLBACK_TZ
                );
                Ok(Tz::Etc__UTC)
            }
        },
    }
}

/// Normalize a sequence of timestamp-like values into `zone`-aware
/// instants in one resolved zone.
///
/// Returns the instants together with the zone that was resolved (the
/// explicit `tz`, or the host/fallback zone when `tz` is `None`).
/// Normalizing an already-normalized sequence with the same zone leaves
/// every instant unchanged.
pub fn normalize(
    values: &[Value],
    tz: Option<&str>,
    unit: TimeUnit,
) -> Result<(Vec<DateTime<Tz>>, Tz)> {
    let zone = resolve_tz(tz)?;
    let instants = normalize_in(values, zone, unit)?;
    Ok((instants, zone))
}

/// Normalize into an already-resolved zone
pub fn normalize_in(values: &[Value], zone: Tz, unit: TimeUnit) -> Result<Vec<DateTime<Tz>>> {
    let mut instants = Vec::with_capacity(values.len());
    for (position, value) in values.iter().enumerate() {
        let instant = to_instant(value, zone, unit).map_err(|err| match err {
            Error::InvalidData(msg) => {
                Error::InvalidData(format!("{} (timestamp at row {})", msg, position))
            }
            other => other,
        })?;
        instants.push(instant);
    }
    Ok(instants)
}

/// Parse one date filter bound in the aggregate's zone
pub fn parse_date_input(input: &DateInput, zone: Tz, unit: TimeUnit) -> Result<DateTime<Tz>> {
    let value = match input {
        DateInput::Epoch(n) => Value::Int(*n),
        DateInput::Text(s) => Value::Text(s.clone()),
        DateInput::Instant(dt) => Value::Instant(*dt),
    };
    to_instant(&value, zone, unit)
}

/// Advance an instant by one calendar day in its own zone
pub fn add_one_day(instant: DateTime<Tz>) -> Result<DateTime<Tz>> {
    instant.checked_add_days(Days::new(1)).ok_or_else(|| {
        Error::InvalidData(format!("Date out of representable range: {}", instant))
    })
}

fn to_instant(value: &Value, zone: Tz, unit: TimeUnit) -> Result<DateTime<Tz>> {
    match value {
        Value::Int(n) => {
            let utc = epoch_nanos_to_utc((*n as i128) * unit.nanos_per_unit(), value)?;
            Ok(utc.with_timezone(&zone))
        }
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(unparseable(value));
            }
            let nanos = (*f * unit.nanos_per_unit() as f64).round();
            let utc = epoch_nanos_to_utc(nanos as i128, value)?;
            Ok(utc.with_timezone(&zone))
        }
        Value::Text(s) => parse_text(s, zone),
        Value::Instant(dt) => Ok(dt.with_timezone(&zone)),
        Value::Null => Err(unparseable(value)),
    }
}

fn epoch_nanos_to_utc(nanos: i128, original: &Value) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND))
        .map_err(|_| unparseable(original))?;
    let nsecs = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    match Utc.timestamp_opt(secs, nsecs) {
        LocalResult::Single(dt) => Ok(dt),
        _ => Err(unparseable(original)),
    }
}

fn parse_text(text: &str, zone: Tz) -> Result<DateTime<Tz>> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&zone));
    }
    // naive forms, highest precision first
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return localize(naive, zone);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return localize(naive, zone);
        }
    }
    Err(Error::InvalidData(format!(
        "Unparseable timestamp value: '{}'",
        text
    )))
}

fn localize(naive: NaiveDateTime, zone: Tz) -> Result<DateTime<Tz>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // ambiguous local times (DST fold) resolve to the earlier offset
        LocalResult::Ambiguous(earlier, _) => Ok(earlier),
        LocalResult::None => Err(Error::InvalidData(format!(
            "Local time {} does not exist in zone {}",
            naive,
            zone.name()
        ))),
    }
}

fn unparseable(value: &Value) -> Error {
    Error::InvalidData(format!("Unparseable timestamp value: {:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tz_valid_name() {
        let zone = resolve_tz(Some("Asia/Kolkata")).unwrap();
        assert_eq!(zone.name(), "Asia/Kolkata");
    }

    #[test]
    fn test_resolve_tz_invalid_name() {
        let result = resolve_tz(Some("Mars/Olympus_Mons"));
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_resolve_tz_unset_returns_some_zone() {
        // host zone or the Etc/UTC fallback, never an error
        let zone = resolve_tz(None).unwrap();
        assert!(!zone.name().is_empty());
    }

    #[test]
    fn test_normalize_epoch_millis() {
        let (instants, zone) =
            normalize(&[Value::Int(0), Value::Int(86_400_000)], Some("Etc/UTC"), TimeUnit::default())
                .unwrap();
        assert_eq!(zone.name(), "Etc/UTC");
        assert_eq!(instants[0].to_rfc3339(), "1970-01-01T00:00:00+00:00");
        assert_eq!(instants[1].to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_normalize_epoch_seconds_unit() {
        let (instants, _) =
            normalize(&[Value::Int(86_400)], Some("Etc/UTC"), TimeUnit::Seconds).unwrap();
        assert_eq!(instants[0].to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_normalize_converts_epoch_into_target_zone() {
        // epoch offsets are absolute; the wall clock moves with the zone
        let (instants, _) =
            normalize(&[Value::Int(0)], Some("Asia/Kolkata"), TimeUnit::default()).unwrap();
        assert_eq!(instants[0].to_rfc3339(), "1970-01-01T05:30:00+05:30");
    }

    #[test]
    fn test_normalize_naive_text_is_localized() {
        let (instants, _) = normalize(
            &[Value::from("2024-05-05 23:00")],
            Some("Asia/Kolkata"),
            TimeUnit::default(),
        )
        .unwrap();
        assert_eq!(instants[0].to_rfc3339(), "2024-05-05T23:00:00+05:30");
    }

    #[test]
    fn test_normalize_bare_date_is_midnight() {
        let (instants, _) = normalize(
            &[Value::from("2024-05-05")],
            Some("Etc/UTC"),
            TimeUnit::default(),
        )
        .unwrap();
        assert_eq!(instants[0].to_rfc3339(), "2024-05-05T00:00:00+00:00");
    }

    #[test]
    fn test_normalize_zoned_text_is_converted() {
        let (instants, _) = normalize(
            &[Value::from("2024-05-05T00:00:00+05:30")],
            Some("Etc/UTC"),
            TimeUnit::default(),
        )
        .unwrap();
        assert_eq!(instants[0].to_rfc3339(), "2024-05-04T18:30:00+00:00");
    }

    #[test]
    fn test_normalize_unparseable_text_names_position() {
        let result = normalize(
            &[Value::Int(0), Value::from("not a date")],
            Some("Etc/UTC"),
            TimeUnit::default(),
        );
        match result {
            Err(Error::InvalidData(msg)) => {
                assert!(msg.contains("not a date"));
                assert!(msg.contains("row 1"));
            }
            other => panic!("expected InvalidData, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_normalize_null_is_an_error() {
        let result = normalize(&[Value::Null], Some("Etc/UTC"), TimeUnit::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let (first, zone) = normalize(
            &[Value::Int(1_700_000_000_000)],
            Some("Asia/Kolkata"),
            TimeUnit::default(),
        )
        .unwrap();
        let again = normalize_in(
            &[Value::Instant(first[0].fixed_offset())],
            zone,
            TimeUnit::default(),
        )
        .unwrap();
        assert_eq!(first[0], again[0]);
        assert_eq!(first[0].to_rfc3339(), again[0].to_rfc3339());
    }

    #[test]
    fn test_dst_gap_is_rejected() {
        // 2024-03-10 02:30 never happened in US Eastern
        let result = normalize(
            &[Value::from("2024-03-10 02:30")],
            Some("America/New_York"),
            TimeUnit::default(),
        );
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_dst_fold_resolves_to_earlier_offset() {
        // 2024-11-03 01:30 happened twice in US Eastern; the earlier
        // occurrence is still on daylight time (-04:00)
        let (instants, _) = normalize(
            &[Value::from("2024-11-03 01:30")],
            Some("America/New_York"),
            TimeUnit::default(),
        )
        .unwrap();
        assert_eq!(instants[0].to_rfc3339(), "2024-11-03T01:30:00-04:00");
    }

    #[test]
    fn test_parse_date_input_epoch_and_text_agree() {
        let zone = resolve_tz(Some("Etc/UTC")).unwrap();
        let from_epoch =
            parse_date_input(&DateInput::Epoch(86_400_000), zone, TimeUnit::default()).unwrap();
        let from_text =
            parse_date_input(&DateInput::from("1970-01-02"), zone, TimeUnit::default()).unwrap();
        assert_eq!(from_epoch, from_text);
    }

    #[test]
    fn test_add_one_day() {
        let zone = resolve_tz(Some("Etc/UTC")).unwrap();
        let midnight =
            parse_date_input(&DateInput::from("2024-05-05"), zone, TimeUnit::default()).unwrap();
        let next = add_one_day(midnight).unwrap();
        assert_eq!(next.to_rfc3339(), "2024-05-06T00:00:00+00:00");
    }
}
