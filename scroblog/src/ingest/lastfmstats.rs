//! lastfmstats.com export ingestion
//!
//! Reads the two export formats of lastfmstats.com into a raw table plus
//! username and builds a validated log from them.
//!
//! A valid `lastfmstats-<username>.json` looks like (the `albumId` column
//! is optional):
//!
//! ```json
//! {"username":"lazulinoother","scrobbles":[{"track":"They'll Only Miss
//! You When You Leave","artist":"Carissa's Wierd","album":"Songs About
//! Leaving","albumId":"948a8a4c-23f3-4bf2-b201-dcb68a89b897",
//! "date":1757352413000}]}
//! ```
//!
//! The CSV export carries the same fields as five `;`-separated columns,
//! with the username embedded in the last header: `Date#<username>`. The
//! `date`/`Date#...` column holds epoch milliseconds.

use std::path::Path;

use crate::error::{Error, Result};
use crate::log::{LogOptions, ScrobbleLog};
use crate::table::{RawTable, Value};
use crate::validate::validate_text;

/// Provenance recorded on logs ingested from lastfmstats.com exports
pub const SOURCE_LASTFMSTATS: &str = "lastfmstats.com";

const CSV_COLUMNS: usize = 5;
const CSV_USERNAME_PREFIX: &str = "Date#";

/// Which lastfmstats export format a file is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
}

/// Read a lastfmstats.com export into a validated log.
///
/// `tz` is the zone the log's timestamps should be expressed in; `None`
/// resolves the host zone. The resulting log's source is
/// [`SOURCE_LASTFMSTATS`].
pub fn from_lastfmstats<P: AsRef<Path>>(
    path: P,
    format: SourceFormat,
    tz: Option<&str>,
) -> Result<ScrobbleLog> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let (username, table) = match format {
        SourceFormat::Json => parse_json(&text, path)?,
        SourceFormat::Csv => parse_csv(&text, path)?,
    };
    ScrobbleLog::new(
        &table,
        LogOptions {
            username: Some(username),
            tz: tz.map(str::to_string),
            source: Some(SOURCE_LASTFMSTATS.to_string()),
            ..LogOptions::default()
        },
    )
}

fn parse_json(text: &str, path: &Path) -> Result<(String, RawTable)> {
    let data: serde_json::Value = serde_json::from_str(text).map_err(|err| {
        Error::InvalidData(format!("Cannot parse file '{}': {}", path.display(), err))
    })?;
    let object = data
        .as_object()
        .ok_or_else(|| Error::InvalidData("Expecting a top-level object".to_string()))?;
    for key in ["username", "scrobbles"] {
        if !object.contains_key(key) {
            return Err(Error::Schema(format!("Key not found: '{}'", key)));
        }
    }
    let username = object["username"]
        .as_str()
        .ok_or_else(|| Error::InvalidData("Expecting text for key 'username'".to_string()))?;
    let username = validate_text(username, "username")?;
    let scrobbles = object["scrobbles"]
        .as_array()
        .ok_or_else(|| Error::InvalidData("Expecting an array for key 'scrobbles'".to_string()))?;
    let records = scrobbles
        .iter()
        .map(|row| {
            row.as_object().cloned().ok_or_else(|| {
                Error::InvalidData("Expecting an object for each scrobble".to_string())
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let mut table = lowercase_columns(RawTable::from_records(&records));
    if !table.has_column("date") && !records.is_empty() {
        return Err(Error::Schema("Column not found: date".to_string()));
    }
    table.rename_column("date", "timestamp");
    if records.is_empty() {
        // an empty export still validates as an empty log
        table = crate::validate::empty_canonical_table();
    }
    Ok((username, table))
}

fn parse_csv(text: &str, path: &Path) -> Result<(String, RawTable)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| {
            Error::InvalidData(format!("Cannot parse file '{}': {}", path.display(), err))
        })?
        .clone();
    if headers.len() != CSV_COLUMNS {
        return Err(Error::InvalidData(format!(
            "Wrong delimiter or missing columns: expected {} ';'-separated columns, got {}",
            CSV_COLUMNS,
            headers.len()
        )));
    }
    let last = &headers[CSV_COLUMNS - 1];
    let username = last.strip_prefix(CSV_USERNAME_PREFIX).ok_or_else(|| {
        Error::InvalidData(format!(
            "Expecting last column name of the form '{}<username>', got: '{}'",
            CSV_USERNAME_PREFIX, last
        ))
    })?;
    let username = validate_text(username.trim(), "username")?;

    let mut columns: Vec<(String, Vec<Value>)> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if i == CSV_COLUMNS - 1 {
                "timestamp".to_string()
            } else {
                name.trim().to_lowercase()
            };
            (name, Vec::new())
        })
        .collect();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            Error::InvalidData(format!("Cannot parse file '{}': {}", path.display(), err))
        })?;
        if record.len() != CSV_COLUMNS {
            // header is line 1, first record is line 2
            return Err(Error::InvalidData(format!(
                "Expected {} ';'-separated columns on line {}, got {}",
                CSV_COLUMNS,
                index + 2,
                record.len()
            )));
        }
        for (i, cell) in record.iter().enumerate() {
            let value = if i == CSV_COLUMNS - 1 {
                // the timestamp column holds epoch milliseconds
                match cell.trim().parse::<i64>() {
                    Ok(millis) => Value::Int(millis),
                    Err(_) => Value::Text(cell.to_string()),
                }
            } else {
                Value::Text(cell.to_string())
            };
            columns[i].1.push(value);
        }
    }
    Ok((username, RawTable::with_columns(columns)?))
}

fn lowercase_columns(table: RawTable) -> RawTable {
    let mut out = table;
    let names: Vec<String> = ["Date", "Track", "Artist", "Album", "AlbumId"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        out.rename_column(&name, &name.to_lowercase());
    }
    out
}
