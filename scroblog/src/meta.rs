//! Log metadata
//!
//! The summary object that travels with every scrobble log: who the log
//! belongs to, the zone its timestamps are expressed in, how many rows it
//! holds and the range they span, and where the data came from. Metadata
//! is a derived view of the table: cheap to regenerate (one O(n) pass),
//! regenerated on every mutating operation, and never trusted from the
//! outside without validation.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Scrobble;
use crate::validate::validate_text;

/// Version of the canonical `{meta, scrobbles}` shape
pub const SCHEMA_VERSION: u32 = 1;

/// Provenance recorded when the caller supplies none
pub const DEFAULT_SOURCE: &str = "manual";

/// Provenance recorded on date-filtered logs
pub const SOURCE_FILTER: &str = "filter";

/// First and last scrobble instants, RFC 3339 with offset.
///
/// Both bounds are null exactly when the log is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Summary metadata of a scrobble log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Owner of the log; never blank
    pub username: String,
    /// IANA zone every timestamp in the table is expressed in
    pub tz: String,
    /// Canonical shape version, fixed at [`SCHEMA_VERSION`]
    pub schema_version: u32,
    /// Row count of the table this metadata describes
    pub num_scrobbles: u64,
    /// Span of the table's timestamps
    pub date_range: DateRange,
    /// Free-text provenance label; never blank
    pub source: String,
}

impl Meta {
    /// Derive metadata from validated rows.
    ///
    /// A `None` source becomes [`DEFAULT_SOURCE`]. The username must be
    /// non-blank.
    pub fn generate(
        scrobbles: &[Scrobble],
        username: &str,
        zone: Tz,
        source: Option<&str>,
    ) -> Result<Meta> {
        let username = validate_text(username, "username")?;
        let source = match source {
            Some(text) => validate_text(text, "source")?,
            None => DEFAULT_SOURCE.to_string(),
        };
        let date_range = match (
            scrobbles.iter().map(|s| s.timestamp).min(),
            scrobbles.iter().map(|s| s.timestamp).max(),
        ) {
            (Some(start), Some(end)) => DateRange {
                start: Some(start.to_rfc3339()),
                end: Some(end.to_rfc3339()),
            },
            _ => DateRange {
                start: None,
                end: None,
            },
        };
        let meta = Meta {
            username,
            tz: zone.name().to_string(),
            schema_version: SCHEMA_VERSION,
            num_scrobbles: scrobbles.len() as u64,
            date_range,
            source,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Shape-check a JSON value into metadata.
    ///
    /// A missing or unexpected key, or a field of the wrong JSON type, is
    /// a schema violation; a well-shaped field with a semantically
    /// invalid value (blank text, unknown zone, inconsistent date range)
    /// is invalid data.
    pub fn from_value(value: &serde_json::Value) -> Result<Meta> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::Schema("Expecting an object for meta".to_string()))?;
        const KEYS: [&str; 6] = [
            "username",
            "tz",
            "schema_version",
            "num_scrobbles",
            "date_range",
            "source",
        ];
        for key in KEYS {
            if !object.contains_key(key) {
                return Err(Error::Schema(format!("Missing meta key: {}", key)));
            }
        }
        for key in object.keys() {
            if !KEYS.contains(&key.as_str()) {
                return Err(Error::Schema(format!("Unexpected meta key: {}", key)));
            }
        }
        let username = shape_text(object, "username")?;
        let tz = shape_text(object, "tz")?;
        let schema_version = shape_integer(object, "schema_version")?;
        let num_scrobbles = shape_integer(object, "num_scrobbles")?;
        let source = shape_text(object, "source")?;
        let date_range = shape_date_range(&object["date_range"])?;

        if schema_version < 0 || num_scrobbles < 0 {
            return Err(Error::InvalidData(
                "Expecting non-negative integer values for meta counts".to_string(),
            ));
        }
        let meta = Meta {
            username,
            tz,
            schema_version: schema_version as u32,
            num_scrobbles: num_scrobbles as u64,
            date_range,
            source,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Semantic validation of an already-typed metadata object
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.username, "username")?;
        validate_text(&self.source, "source")?;
        self.tz.parse::<Tz>().map_err(|_| {
            Error::InvalidData(format!("Invalid IANA timezone string: {}", self.tz))
        })?;
        if self.schema_version != SCHEMA_VERSION {
            return Err(Error::InvalidData(format!(
                "Unsupported schema_version: {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        for (key, bound) in [
            ("start", &self.date_range.start),
            ("end", &self.date_range.end),
        ] {
            match bound {
                Some(text) => {
                    if self.num_scrobbles == 0 {
                        return Err(Error::InvalidData(format!(
                            "If num_scrobbles is 0, date_range {} must be null",
                            key
                        )));
                    }
                    DateTime::parse_from_rfc3339(text).map_err(|_| {
                        Error::InvalidData(format!(
                            "date_range {} is not an ISO-8601 timestamp: {}",
                            key, text
                        ))
                    })?;
                }
                None => {
                    if self.num_scrobbles > 0 {
                        return Err(Error::InvalidData(format!(
                            "date_range {} must be set when the log is non-empty",
                            key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Cross-check this metadata against the table it claims to describe
    pub fn check_against(&self, scrobbles: &[Scrobble]) -> Result<()> {
        if self.num_scrobbles != scrobbles.len() as u64 {
            return Err(Error::InvalidData(format!(
                "meta num_scrobbles ({}) does not match the table length ({})",
                self.num_scrobbles,
                scrobbles.len()
            )));
        }
        let start = scrobbles.iter().map(|s| s.timestamp).min();
        let end = scrobbles.iter().map(|s| s.timestamp).max();
        if self.date_range.start != start.map(|t| t.to_rfc3339()) {
            return Err(Error::InvalidData(
                "date_range start must match the earliest scrobble".to_string(),
            ));
        }
        if self.date_range.end != end.map(|t| t.to_rfc3339()) {
            return Err(Error::InvalidData(
                "date_range end must match the latest scrobble".to_string(),
            ));
        }
        Ok(())
    }
}

fn shape_text(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<String> {
    object[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Schema(format!("Expecting text for meta key: {}", key)))
}

fn shape_integer(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<i64> {
    object[key]
        .as_i64()
        .ok_or_else(|| Error::Schema(format!("Expecting an integer for meta key: {}", key)))
}

fn shape_date_range(value: &serde_json::Value) -> Result<DateRange> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Schema("Expecting an object for meta key: date_range".to_string()))?;
    for key in ["start", "end"] {
        if !object.contains_key(key) {
            return Err(Error::Schema(format!("date_range key not found: {}", key)));
        }
    }
    if object.len() != 2 {
        return Err(Error::Schema(
            "date_range keys must be exactly 'start' and 'end'".to_string(),
        ));
    }
    let bound = |key: &str| -> Result<Option<String>> {
        match &object[key] {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => Ok(Some(s.clone())),
            _ => Err(Error::Schema(format!(
                "Expecting text or null for date_range key: {}",
                key
            ))),
        }
    };
    Ok(DateRange {
        start: bound("start")?,
        end: bound("end")?,
    })
}
