//! Text-format writers
//!
//! Rendering and file sinks for the shapes the core guarantees: a
//! markdown table view, canonical four-column CSV, and the shared string
//! writer the JSON exporter reuses. Renderers sort chronologically
//! ascending unless asked for newest-first.

use std::path::Path;

use crate::error::{Error, Result};
use crate::log::ScrobbleLog;

/// Rows shown at each end of a truncated markdown rendering
pub const PREVIEW_ROWS: usize = 5;

/// Placeholder rendered instead of a table when the log is empty
const EMPTY_PLACEHOLDER: &str = "-----No scrobbles present-----";

/// Markdown rendering knobs
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Sort newest scrobbles to the top
    pub newest_first: bool,
    /// Beyond this many rows, render head and tail previews only
    pub max_rows: Option<usize>,
    /// strftime-style timestamp format for the Timestamp column
    pub datetime_format: String,
    /// Prepend the username / date-range header lines
    pub show_header: bool,
}

impl Default for MarkdownOptions {
    fn default() -> MarkdownOptions {
        MarkdownOptions {
            newest_first: false,
            max_rows: None,
            datetime_format: "%Y-%m-%d %H:%M".to_string(),
            show_header: true,
        }
    }
}

/// Render a log as a markdown pipe table.
///
/// Over-budget logs render the first and last [`PREVIEW_ROWS`] rows with
/// an ellipsis row between them and a "Showing X out of N scrobbles"
/// footer.
pub fn render_markdown(log: &ScrobbleLog, options: &MarkdownOptions) -> String {
    let mut rows: Vec<[String; 4]> = log
        .scrobbles()
        .iter()
        .map(|s| {
            [
                s.timestamp.format(&options.datetime_format).to_string(),
                s.track.clone(),
                s.artist.clone(),
                s.album.clone().unwrap_or_default(),
            ]
        })
        .collect();
    rows.sort_by(|a, b| a[0].cmp(&b[0]));
    if options.newest_first {
        rows.reverse();
    }

    let table = if rows.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        match options.max_rows {
            // below 2 * PREVIEW_ROWS the head and tail would overlap
            Some(budget) if rows.len() > budget.max(2 * PREVIEW_ROWS) => {
                let total = rows.len();
                let shown = 2 * PREVIEW_ROWS;
                let head = rows[..PREVIEW_ROWS].to_vec();
                let tail = rows[total - PREVIEW_ROWS..].to_vec();
                let mut preview = head;
                preview.push(std::array::from_fn(|_| "...".to_string()));
                preview.extend(tail);
                format!(
                    "{}\nShowing {} out of {} scrobbles",
                    pipe_table(&preview),
                    shown,
                    total
                )
            }
            _ => pipe_table(&rows),
        }
    };

    if !options.show_header {
        return table;
    }
    let range = &log.meta().date_range;
    format!(
        "ScrobbleLog for username: {}  \nFrom {} to {}\n\n{}",
        log.username(),
        range.start.as_deref().unwrap_or("-"),
        range.end.as_deref().unwrap_or("-"),
        table
    )
}

fn pipe_table(rows: &[[String; 4]]) -> String {
    const HEADERS: [&str; 4] = ["Timestamp", "Track", "Artist", "Album"];
    let mut widths = [0usize; 4];
    for (i, header) in HEADERS.iter().enumerate() {
        widths[i] = header.len();
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let mut out = String::new();
    out.push_str(&format_row(&HEADERS.map(str::to_string), &widths));
    let rule = std::array::from_fn(|i| "-".repeat(widths[i]));
    out.push_str(&format_row(&rule, &widths));
    for row in rows {
        out.push_str(&format_row(row, &widths));
    }
    out
}

fn format_row(cells: &[String; 4], widths: &[usize; 4]) -> String {
    format!(
        "| {:w0$} | {:w1$} | {:w2$} | {:w3$} |\n",
        cells[0],
        cells[1],
        cells[2],
        cells[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    )
}

/// Canonical four-column CSV text, RFC 3339 timestamps, table order
pub fn csv_string(log: &ScrobbleLog) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(["timestamp", "track", "artist", "album"])?;
    for scrobble in log.scrobbles() {
        writer.write_record([
            scrobble.timestamp.to_rfc3339().as_str(),
            scrobble.track.as_str(),
            scrobble.artist.as_str(),
            scrobble.album.as_deref().unwrap_or(""),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidData("CSV output is not valid UTF-8".to_string()))
}

/// Write CSV to a file
pub fn write_csv<P: AsRef<Path>>(log: &ScrobbleLog, path: P) -> Result<()> {
    write_string(&csv_string(log)?, path)
}

/// Shared file sink: create or truncate `path` and write `text`
pub fn write_string<P: AsRef<Path>>(text: &str, path: P) -> Result<()> {
    std::fs::write(path, text)?;
    Ok(())
}
