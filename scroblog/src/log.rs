//! The scrobble log aggregate
//!
//! A [`ScrobbleLog`] owns one validated table of scrobbles and the
//! metadata derived from it. The two never diverge: every operation that
//! changes membership re-derives the metadata from scratch rather than
//! patching it. `append` (and the `_in_place` timezone conversion) are
//! the only operations that mutate a receiver; everything else returns a
//! new, independently-owned aggregate.

use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::slice;

use chrono::NaiveTime;
use chrono_tz::Tz;
use tracing::warn;

use crate::charts::{self, ChartEntry};
use crate::error::{Error, Result};
use crate::export::{self, MarkdownOptions};
use crate::meta::{Meta, SOURCE_FILTER};
use crate::record::Scrobble;
use crate::table::RawTable;
use crate::timestamp::{self, DateInput, TimeUnit};
use crate::validate;

/// Construction inputs besides the raw table.
///
/// When `meta` is present and valid it supplies the username, zone, and
/// source; otherwise those come from the individual fields.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Externally supplied metadata, cross-validated before use
    pub meta: Option<serde_json::Value>,
    /// Owner of the log; required when no valid `meta` is given
    pub username: Option<String>,
    /// IANA zone name; `None` resolves the host zone
    pub tz: Option<String>,
    /// Provenance label; `None` records "manual"
    pub source: Option<String>,
}

impl LogOptions {
    /// Options carrying only a username
    pub fn for_user(username: impl Into<String>) -> LogOptions {
        LogOptions {
            username: Some(username.into()),
            ..LogOptions::default()
        }
    }
}

/// What an [`append`](ScrobbleLog::append) call may carry
#[derive(Debug, Clone)]
pub enum Append {
    One(Scrobble),
    Many(Vec<Scrobble>),
    Log(ScrobbleLog),
}

impl From<Scrobble> for Append {
    fn from(scrobble: Scrobble) -> Append {
        Append::One(scrobble)
    }
}

impl From<Vec<Scrobble>> for Append {
    fn from(scrobbles: Vec<Scrobble>) -> Append {
        Append::Many(scrobbles)
    }
}

impl From<ScrobbleLog> for Append {
    fn from(log: ScrobbleLog) -> Append {
        Append::Log(log)
    }
}

/// A validated, timezone-aware scrobble log
#[derive(Debug, Clone)]
pub struct ScrobbleLog {
    scrobbles: Vec<Scrobble>,
    meta: Meta,
    zone: Tz,
}

impl ScrobbleLog {
    /// Build a log from a raw table.
    ///
    /// Supplied metadata is validated first; when it fails validation the
    /// construction does not fail; a warning is logged and metadata is
    /// regenerated from `username`/`tz`/`source` instead. The table runs
    /// through the record validator on either path, using the zone drawn
    /// from the winning metadata.
    pub fn new(table: &RawTable, options: LogOptions) -> Result<ScrobbleLog> {
        if let Some(raw_meta) = &options.meta {
            match Meta::from_value(raw_meta) {
                Ok(meta) => {
                    let (scrobbles, zone) = validate::validate_table(table, Some(&meta.tz))?;
                    let meta =
                        Meta::generate(&scrobbles, &meta.username, zone, Some(&meta.source))?;
                    return Ok(ScrobbleLog {
                        scrobbles,
                        meta,
                        zone,
                    });
                }
                Err(err) => warn!(
                    "Invalid meta supplied: {}. Regenerating meta from username, tz, and source.",
                    err
                ),
            }
        }
        let username = options.username.as_deref().ok_or_else(|| {
            Error::InvalidData("A username is required when no valid meta is supplied".to_string())
        })?;
        let (scrobbles, zone) = validate::validate_table(table, options.tz.as_deref())?;
        let meta = Meta::generate(&scrobbles, username, zone, options.source.as_deref())?;
        Ok(ScrobbleLog {
            scrobbles,
            meta,
            zone,
        })
    }

    /// Build a one-record log
    pub fn from_scrobble(scrobble: &Scrobble, options: LogOptions) -> Result<ScrobbleLog> {
        let record = scrobble
            .to_value()
            .as_object()
            .cloned()
            .ok_or_else(|| Error::InvalidData("Unrepresentable scrobble".to_string()))?;
        let table = RawTable::from_records(&[record]);
        ScrobbleLog::new(&table, options)
    }

    /// Rebuild from rows that already satisfy the table invariants
    fn from_validated(
        scrobbles: Vec<Scrobble>,
        username: &str,
        zone: Tz,
        source: &str,
    ) -> Result<ScrobbleLog> {
        let meta = Meta::generate(&scrobbles, username, zone, Some(source))?;
        Ok(ScrobbleLog {
            scrobbles,
            meta,
            zone,
        })
    }

    /// Number of scrobbles in the log
    pub fn len(&self) -> usize {
        self.scrobbles.len()
    }

    /// True when the log holds no scrobbles
    pub fn is_empty(&self) -> bool {
        self.scrobbles.is_empty()
    }

    /// The owned rows, in table order
    pub fn scrobbles(&self) -> &[Scrobble] {
        &self.scrobbles
    }

    /// The derived metadata
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Owner of the log
    pub fn username(&self) -> &str {
        &self.meta.username
    }

    /// IANA name of the zone the table is expressed in
    pub fn tz_name(&self) -> &str {
        &self.meta.tz
    }

    /// The resolved zone
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Provenance label
    pub fn source(&self) -> &str {
        &self.meta.source
    }

    /// The record at `index`; out of bounds is an invalid argument
    pub fn get(&self, index: usize) -> Result<Scrobble> {
        self.scrobbles.get(index).cloned().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Index {} out of bounds for a log of length {}",
                index,
                self.len()
            ))
        })
    }

    /// A new log over the rows in `range`, metadata regenerated, source
    /// inherited
    pub fn slice(&self, range: Range<usize>) -> Result<ScrobbleLog> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::InvalidArgument(format!(
                "Range {}..{} out of bounds for a log of length {}",
                range.start,
                range.end,
                self.len()
            )));
        }
        ScrobbleLog::from_validated(
            self.scrobbles[range].to_vec(),
            self.username(),
            self.zone,
            self.source(),
        )
    }

    /// Membership by value equality
    pub fn contains(&self, scrobble: &Scrobble) -> bool {
        self.scrobbles.contains(scrobble)
    }

    /// Iterate the rows in table order
    pub fn iter(&self) -> slice::Iter<'_, Scrobble> {
        self.scrobbles.iter()
    }

    /// Append records or another log in place.
    ///
    /// This is the one membership-changing operation that mutates its
    /// receiver; it returns the receiver for chaining. Appending a log
    /// requires matching usernames; a log in another zone has its
    /// timestamps converted into this log's zone first (never the
    /// reverse). Existing rows stay first, the combined rows are
    /// re-validated, and the metadata is regenerated. On error nothing
    /// has been mutated.
    pub fn append(&mut self, scrobbles: impl Into<Append>) -> Result<&mut ScrobbleLog> {
        let incoming = match scrobbles.into() {
            Append::One(scrobble) => vec![scrobble],
            Append::Many(scrobbles) => scrobbles,
            Append::Log(log) => {
                if log.username() != self.username() {
                    return Err(Error::InvalidData("The usernames don't match".to_string()));
                }
                log.scrobbles
            }
        };
        self.scrobbles
            .extend(incoming.into_iter().map(|s| s.with_zone(self.zone)));
        self.scrobbles = validate::validate_rows(std::mem::take(&mut self.scrobbles));
        self.meta = Meta::generate(
            &self.scrobbles,
            &self.meta.username,
            self.zone,
            Some(&self.meta.source),
        )?;
        Ok(self)
    }

    /// A new log with every timestamp re-expressed in `tz`
    pub fn tz_convert(&self, tz: &str) -> Result<ScrobbleLog> {
        let zone = timestamp::resolve_tz(Some(tz))?;
        let scrobbles = self
            .scrobbles
            .iter()
            .map(|s| s.with_zone(zone))
            .collect();
        ScrobbleLog::from_validated(scrobbles, self.username(), zone, self.source())
    }

    /// Convert this log's timestamps to `tz` in place
    pub fn tz_convert_in_place(&mut self, tz: &str) -> Result<&mut ScrobbleLog> {
        let converted = self.tz_convert(tz)?;
        *self = converted;
        Ok(self)
    }

    /// Rename the log's owner
    pub fn set_username(&mut self, username: &str) -> Result<()> {
        self.meta.username = validate::validate_text(username, "username")?;
        Ok(())
    }

    /// Replace the metadata with an externally supplied object.
    ///
    /// The object must pass shape and semantic validation and agree with
    /// the owned table. Changing the zone this way is not allowed; that
    /// requires converting the data via [`tz_convert`](Self::tz_convert).
    pub fn set_meta(&mut self, value: &serde_json::Value) -> Result<()> {
        let meta = Meta::from_value(value)?;
        if meta.tz != self.meta.tz {
            return Err(Error::OperationNotAllowed(
                "Timezone metadata cannot be changed without converting the timestamps; \
                 use tz_convert instead"
                    .to_string(),
            ));
        }
        meta.check_against(&self.scrobbles)?;
        self.meta = meta;
        Ok(())
    }

    /// Filter to scrobbles within a date range.
    ///
    /// Missing bounds default to the table's earliest/latest timestamp (a
    /// defaulted end stays inclusive of the final scrobble). Bounds parse
    /// in the log's zone; numeric bounds scale by `unit` (milliseconds
    /// when `None`). With `include_end`, a midnight-exact end (a bare
    /// calendar date) advances one calendar day so the whole day is
    /// covered. Selection is the half-open interval `start <= t < end`.
    /// The result's source is `"filter"`.
    pub fn filter_by_date(
        &self,
        start: Option<DateInput>,
        end: Option<DateInput>,
        unit: Option<TimeUnit>,
        include_end: bool,
    ) -> Result<ScrobbleLog> {
        let unit = unit.unwrap_or_default();
        let bounds = match (self.min_timestamp(), self.max_timestamp()) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        };
        let Some((min, max)) = bounds else {
            // empty log: nothing to select, but the provenance still flips
            return ScrobbleLog::from_validated(
                Vec::new(),
                self.username(),
                self.zone,
                SOURCE_FILTER,
            );
        };
        let start = match start {
            Some(input) => timestamp::parse_date_input(&input, self.zone, unit)?,
            None => min,
        };
        let (mut end, end_defaulted) = match end {
            Some(input) => (timestamp::parse_date_input(&input, self.zone, unit)?, false),
            None => (max, true),
        };
        if include_end && end.time() == NaiveTime::MIN {
            // a bare calendar date covers the whole day it names
            end = timestamp::add_one_day(end)?;
        }
        let scrobbles = self
            .scrobbles
            .iter()
            .filter(|s| {
                s.timestamp >= start
                    && (s.timestamp < end || (end_defaulted && s.timestamp == end))
            })
            .cloned()
            .collect();
        ScrobbleLog::from_validated(scrobbles, self.username(), self.zone, SOURCE_FILTER)
    }

    /// The first `n` rows (all of them when `n` exceeds the length)
    pub fn head(&self, n: usize) -> Result<ScrobbleLog> {
        let n = n.min(self.len());
        self.slice(0..n)
    }

    /// The last `n` rows
    pub fn tail(&self, n: usize) -> Result<ScrobbleLog> {
        let n = n.min(self.len());
        self.slice(self.len() - n..self.len())
    }

    /// A new log sorted chronologically (or reversed), metadata
    /// regenerated, source inherited
    pub fn sorted_by_time(&self, newest_first: bool) -> Result<ScrobbleLog> {
        let mut scrobbles = self.scrobbles.clone();
        scrobbles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if newest_first {
            scrobbles.reverse();
        }
        ScrobbleLog::from_validated(scrobbles, self.username(), self.zone, self.source())
    }

    /// Top `n` tracks/artists/albums by scrobble count
    pub fn top_charts(&self, kind: &str, n: usize) -> Result<Vec<ChartEntry>> {
        charts::top_charts(&self.scrobbles, kind, n)
    }

    /// Earliest timestamp in the table
    pub fn min_timestamp(&self) -> Option<chrono::DateTime<Tz>> {
        self.scrobbles.iter().map(|s| s.timestamp).min()
    }

    /// Latest timestamp in the table
    pub fn max_timestamp(&self) -> Option<chrono::DateTime<Tz>> {
        self.scrobbles.iter().map(|s| s.timestamp).max()
    }

    /// Canonical `{meta, scrobbles}` JSON value
    pub fn to_canonical_value(&self) -> Result<serde_json::Value> {
        let scrobbles: Vec<serde_json::Value> =
            self.scrobbles.iter().map(Scrobble::to_value).collect();
        Ok(serde_json::json!({
            "meta": serde_json::to_value(&self.meta)?,
            "scrobbles": scrobbles,
        }))
    }

    /// Rebuild a log from its canonical JSON value.
    ///
    /// The `scrobbles` key is required. `meta` is used when present and
    /// valid; top-level `username`/`tz`/`source` keys serve as the
    /// fallback, mirroring construction.
    pub fn from_canonical_value(value: &serde_json::Value) -> Result<ScrobbleLog> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidData("Expecting an object for log data".to_string()))?;
        let rows = object
            .get("scrobbles")
            .ok_or_else(|| Error::Schema("Key 'scrobbles' not found".to_string()))?
            .as_array()
            .ok_or_else(|| Error::InvalidData("Expecting an array for key 'scrobbles'".to_string()))?;
        let records = rows
            .iter()
            .map(|row| {
                row.as_object().cloned().ok_or_else(|| {
                    Error::InvalidData("Expecting an object for each scrobble".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let table = if records.is_empty() {
            validate::empty_canonical_table()
        } else {
            RawTable::from_records(&records)
        };
        let text_key = |key: &str| -> Option<String> {
            object.get(key).and_then(|v| v.as_str()).map(str::to_string)
        };
        ScrobbleLog::new(
            &table,
            LogOptions {
                meta: object.get("meta").cloned(),
                username: text_key("username"),
                tz: text_key("tz"),
                source: text_key("source"),
            },
        )
    }

    /// Canonical JSON text
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_canonical_value()?)?)
    }

    /// Parse a log from canonical JSON text
    pub fn from_json_str(text: &str) -> Result<ScrobbleLog> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        ScrobbleLog::from_canonical_value(&value)
    }

    /// Write canonical JSON to a file
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        export::write_string(&self.to_json_string()?, path)
    }

    /// Read a log from a canonical JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<ScrobbleLog> {
        let text = std::fs::read_to_string(path)?;
        ScrobbleLog::from_json_str(&text)
    }

    /// Render a markdown table of the log
    pub fn to_markdown(&self, options: &MarkdownOptions) -> String {
        export::render_markdown(self, options)
    }

    /// Canonical four-column CSV text
    pub fn to_csv_string(&self) -> Result<String> {
        export::csv_string(self)
    }

    /// Write canonical CSV to a file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        export::write_csv(self, path)
    }
}

/// Structural equality over the canonical representation: same metadata,
/// same rows in the same order
impl PartialEq for ScrobbleLog {
    fn eq(&self, other: &ScrobbleLog) -> bool {
        self.meta == other.meta && self.scrobbles == other.scrobbles
    }
}

impl<'a> IntoIterator for &'a ScrobbleLog {
    type Item = &'a Scrobble;
    type IntoIter = slice::Iter<'a, Scrobble>;

    fn into_iter(self) -> Self::IntoIter {
        self.scrobbles.iter()
    }
}

impl IntoIterator for ScrobbleLog {
    type Item = Scrobble;
    type IntoIter = std::vec::IntoIter<Scrobble>;

    fn into_iter(self) -> Self::IntoIter {
        self.scrobbles.into_iter()
    }
}

impl fmt::Display for ScrobbleLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = MarkdownOptions {
            max_rows: Some(10),
            show_header: false,
            ..MarkdownOptions::default()
        };
        f.write_str(&export::render_markdown(self, &options))
    }
}
