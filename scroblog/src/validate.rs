//! Record validation
//!
//! Turns a loosely-typed [`RawTable`] into canonical scrobble rows:
//! required columns checked, blank text nulled, rows with missing
//! required values dropped, timestamps normalized into one zone, the
//! optional album column injected, extra columns discarded.

use chrono_tz::Tz;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Scrobble;
use crate::table::{RawTable, Value};
use crate::timestamp::{self, TimeUnit};

/// Columns every raw table must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["timestamp", "track", "artist"];

/// Canonical column order of a validated table
pub const CANONICAL_COLUMNS: [&str; 4] = ["timestamp", "track", "artist", "album"];

/// A zero-row table carrying the canonical columns.
///
/// Row-oriented sources with no rows produce a table with no columns at
/// all; this stands in for it so an empty input validates as an empty
/// log.
pub fn empty_canonical_table() -> RawTable {
    let mut table = RawTable::new();
    for column in CANONICAL_COLUMNS {
        // cannot collide or mismatch on a fresh table
        let _ = table.push_column(column, Vec::new());
    }
    table
}

/// Validate a raw table into canonical rows in one resolved zone.
///
/// Blank and whitespace-only text counts as missing everywhere, including
/// in required columns, so a row with a blank track is dropped rather
/// than carried with a null. Dropping is silent and deterministic; the
/// count is logged at debug level. Epoch timestamps are read as
/// milliseconds.
pub fn validate_table(table: &RawTable, tz: Option<&str>) -> Result<(Vec<Scrobble>, Tz)> {
    for column in REQUIRED_COLUMNS {
        if !table.has_column(column) {
            return Err(Error::Schema(format!(
                "Required column not found: {}",
                column
            )));
        }
    }
    let zone = timestamp::resolve_tz(tz)?;

    let timestamps = table.column("timestamp").unwrap_or(&[]);
    let tracks = table.column("track").unwrap_or(&[]);
    let artists = table.column("artist").unwrap_or(&[]);
    let albums = table.column("album");

    let mut kept_timestamps = Vec::new();
    let mut kept_fields = Vec::new();
    let mut dropped = 0usize;
    for row in 0..table.len() {
        let raw_timestamp = blank_to_null(&timestamps[row]);
        let track = text_or_none(&tracks[row]);
        let artist = text_or_none(&artists[row]);
        let album = albums.and_then(|values| text_or_none(&values[row]));
        match (raw_timestamp, track, artist) {
            (raw, Some(track), Some(artist)) if !raw.is_null() => {
                kept_timestamps.push(raw);
                kept_fields.push((track, artist, album));
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("Dropped {} row(s) with missing required values", dropped);
    }

    let instants = timestamp::normalize_in(&kept_timestamps, zone, TimeUnit::Milliseconds)?;
    let scrobbles = instants
        .into_iter()
        .zip(kept_fields)
        .map(|(timestamp, (track, artist, album))| Scrobble::new(timestamp, track, artist, album))
        .collect();
    Ok((scrobbles, zone))
}

/// Re-validate already-typed rows.
///
/// Applies the same blank-to-null and required-field rules as
/// [`validate_table`] to rows that no longer need timestamp parsing,
/// e.g. on append.
pub fn validate_rows(rows: Vec<Scrobble>) -> Vec<Scrobble> {
    let before = rows.len();
    let kept: Vec<Scrobble> = rows
        .into_iter()
        .filter(|s| !s.track.trim().is_empty() && !s.artist.trim().is_empty())
        .map(|mut s| {
            if s.album.as_deref().is_some_and(|a| a.trim().is_empty()) {
                s.album = None;
            }
            s
        })
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        debug!("Dropped {} row(s) with missing required values", dropped);
    }
    kept
}

/// Require a non-blank text field
pub fn validate_text(text: &str, field: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::InvalidData(format!(
            "{} cannot be blank or only white-space",
            field
        )));
    }
    Ok(text.to_string())
}

fn blank_to_null(value: &Value) -> Value {
    match value {
        Value::Text(s) if s.trim().is_empty() => Value::Null,
        other => other.clone(),
    }
}

fn text_or_none(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
