//! Single scrobble records

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::table::Value;
use crate::timestamp::{self, TimeUnit};
use crate::validate::validate_text;

/// One recorded listen event.
///
/// A record is a value: transformations produce new records, never mutate
/// one in place. `timestamp`, `track`, and `artist` are always present;
/// `album` is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Scrobble {
    /// Timezone-aware instant of the listen
    pub timestamp: DateTime<Tz>,
    /// Track title
    pub track: String,
    /// Artist name
    pub artist: String,
    /// Album title, when the source knew it
    pub album: Option<String>,
}

impl Scrobble {
    /// Build a record from already-validated parts
    pub fn new(
        timestamp: DateTime<Tz>,
        track: impl Into<String>,
        artist: impl Into<String>,
        album: Option<String>,
    ) -> Scrobble {
        Scrobble {
            timestamp,
            track: track.into(),
            artist: artist.into(),
            album,
        }
    }

    /// Build a record from a JSON-shaped field mapping.
    ///
    /// `timestamp`, `track`, and `artist` keys are required; a missing key
    /// is a schema violation. The timestamp accepts the same inputs as the
    /// normalizer (epoch integers scaled by `unit`, ISO-like text, zoned
    /// instants) and lands in `zone`.
    pub fn from_value(value: &serde_json::Value, zone: Tz, unit: TimeUnit) -> Result<Scrobble> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidData("Expecting an object for a scrobble".to_string()))?;
        for key in ["timestamp", "track", "artist"] {
            if !object.contains_key(key) {
                return Err(Error::Schema(format!("Missing key: {}", key)));
            }
        }
        let raw_timestamp = Value::from_json(&object["timestamp"]);
        let timestamp = timestamp::normalize_in(&[raw_timestamp], zone, unit)?
            .pop()
            .ok_or_else(|| Error::InvalidData("Missing timestamp value".to_string()))?;
        let track = text_field(object, "track")?;
        let artist = text_field(object, "artist")?;
        let album = match object.get("album") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(Error::InvalidData(format!(
                    "Expecting text or null for key 'album', got: {}",
                    other
                )))
            }
        };
        Ok(Scrobble {
            timestamp,
            track,
            artist,
            album,
        })
    }

    /// Canonical JSON form: RFC 3339 timestamp with offset, null album
    /// when absent
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "track": self.track,
            "artist": self.artist,
            "album": self.album,
        })
    }

    /// The same record re-expressed in another zone (same instant)
    pub fn with_zone(&self, zone: Tz) -> Scrobble {
        Scrobble {
            timestamp: self.timestamp.with_timezone(&zone),
            track: self.track.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
        }
    }
}

fn text_field(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<String> {
    let text = object[key]
        .as_str()
        .ok_or_else(|| Error::InvalidData(format!("Expecting text for key '{}'", key)))?;
    validate_text(text, key)
}

impl fmt::Display for Scrobble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timestamp: {}", self.timestamp.to_rfc3339())?;
        writeln!(f, "Track: {}", self.track)?;
        writeln!(f, "Artist: {}", self.artist)?;
        writeln!(f, "Album: {}", self.album.as_deref().unwrap_or("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::resolve_tz;

    fn utc() -> Tz {
        resolve_tz(Some("Etc/UTC")).unwrap()
    }

    #[test]
    fn test_from_value_full_record() {
        let value = serde_json::json!({
            "timestamp": "2023-12-17T22:00:00+00:00",
            "track": "Clementine",
            "artist": "Elliott Smith",
            "album": "Elliott Smith",
        });
        let scrobble = Scrobble::from_value(&value, utc(), TimeUnit::default()).unwrap();
        assert_eq!(scrobble.track, "Clementine");
        assert_eq!(scrobble.album.as_deref(), Some("Elliott Smith"));
        assert_eq!(scrobble.timestamp.to_rfc3339(), "2023-12-17T22:00:00+00:00");
    }

    #[test]
    fn test_from_value_missing_required_key() {
        let value = serde_json::json!({"track": "Tr1", "artist": "Ar1"});
        let result = Scrobble::from_value(&value, utc(), TimeUnit::default());
        match result {
            Err(Error::Schema(msg)) => assert!(msg.contains("timestamp")),
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_album_defaults_to_null() {
        let value = serde_json::json!({
            "timestamp": 0,
            "track": "Tr1",
            "artist": "Ar1",
        });
        let scrobble = Scrobble::from_value(&value, utc(), TimeUnit::default()).unwrap();
        assert_eq!(scrobble.album, None);
    }

    #[test]
    fn test_from_value_blank_album_becomes_null() {
        let value = serde_json::json!({
            "timestamp": 0,
            "track": "Tr1",
            "artist": "Ar1",
            "album": "   ",
        });
        let scrobble = Scrobble::from_value(&value, utc(), TimeUnit::default()).unwrap();
        assert_eq!(scrobble.album, None);
    }

    #[test]
    fn test_to_value_round_trips() {
        let value = serde_json::json!({
            "timestamp": "2023-12-17T22:00:00+00:00",
            "track": "Clementine",
            "artist": "Elliott Smith",
            "album": null,
        });
        let scrobble = Scrobble::from_value(&value, utc(), TimeUnit::default()).unwrap();
        assert_eq!(scrobble.to_value(), value);
    }

    #[test]
    fn test_with_zone_preserves_instant() {
        let value = serde_json::json!({
            "timestamp": 0,
            "track": "Tr1",
            "artist": "Ar1",
        });
        let scrobble = Scrobble::from_value(&value, utc(), TimeUnit::default()).unwrap();
        let kolkata = resolve_tz(Some("Asia/Kolkata")).unwrap();
        let moved = scrobble.with_zone(kolkata);
        assert_eq!(moved.timestamp, scrobble.timestamp);
        assert_eq!(moved.timestamp.to_rfc3339(), "1970-01-01T05:30:00+05:30");
    }
}
