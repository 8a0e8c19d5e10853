//! Frequency charts
//!
//! Ranks the distinct values of one canonical column by scrobble count.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::log::ScrobbleLog;
use crate::record::Scrobble;

/// Column a chart ranks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Track,
    Artist,
    Album,
}

impl ChartKind {
    /// Plural display label ("Tracks", "Artists", "Albums")
    pub fn plural_label(self) -> &'static str {
        match self {
            ChartKind::Track => "Tracks",
            ChartKind::Artist => "Artists",
            ChartKind::Album => "Albums",
        }
    }

    /// Singular display label
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Track => "Track",
            ChartKind::Artist => "Artist",
            ChartKind::Album => "Album",
        }
    }
}

impl FromStr for ChartKind {
    type Err = Error;

    /// Case-insensitive, with any trailing plural "s" stripped, so
    /// "tracks", "Track", and "TRACKS" all resolve to [`ChartKind::Track`]
    fn from_str(s: &str) -> Result<ChartKind> {
        let folded = s.trim().to_lowercase();
        match folded.trim_end_matches('s') {
            "track" => Ok(ChartKind::Track),
            "artist" => Ok(ChartKind::Artist),
            "album" => Ok(ChartKind::Album),
            _ => Err(Error::InvalidArgument(format!(
                "'kind' must be a case-insensitive match for track(s), artist(s), or album(s); got: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One ranked chart row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    /// The distinct track/artist/album value
    pub name: String,
    /// How many scrobbles carry it
    pub scrobbles: u64,
}

/// Rank the distinct values of the chosen column by count.
///
/// Ordering is descending by count; ties keep the order in which the
/// values first appear in the table. Rows with a null album are left out
/// of the album chart. The result is truncated to `n` entries; `n = 0`
/// yields an empty chart.
pub fn top_charts(scrobbles: &[Scrobble], kind: &str, n: usize) -> Result<Vec<ChartEntry>> {
    let kind: ChartKind = kind.parse()?;
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for scrobble in scrobbles {
        let value = match kind {
            ChartKind::Track => Some(scrobble.track.as_str()),
            ChartKind::Artist => Some(scrobble.artist.as_str()),
            ChartKind::Album => scrobble.album.as_deref(),
        };
        let Some(value) = value else { continue };
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            first_seen.push(value);
        }
        *count += 1;
    }
    let mut entries: Vec<ChartEntry> = first_seen
        .into_iter()
        .map(|name| ChartEntry {
            name: name.to_string(),
            scrobbles: counts[name],
        })
        .collect();
    // stable sort: ties keep first-encountered order
    entries.sort_by(|a, b| b.scrobbles.cmp(&a.scrobbles));
    entries.truncate(n);
    Ok(entries)
}

/// Render a ranked chart as a markdown table with a heading
pub fn top_charts_markdown(log: &ScrobbleLog, kind: &str, n: usize) -> Result<String> {
    let parsed: ChartKind = kind.parse()?;
    let entries = top_charts(log.scrobbles(), kind, n)?;
    let mut out = format!(
        "Top {} {} for {}\n\n",
        n,
        parsed.plural_label(),
        log.username()
    );
    let name_width = entries
        .iter()
        .map(|e| e.name.len())
        .chain([parsed.label().len()])
        .max()
        .unwrap_or(0);
    out.push_str(&format!(
        "| {:name_width$} | Scrobbles |\n",
        parsed.label(),
        name_width = name_width
    ));
    out.push_str(&format!("| {:-<name_width$} | --------- |\n", ""));
    for entry in &entries {
        out.push_str(&format!(
            "| {:name_width$} | {:>9} |\n",
            entry.name, entry.scrobbles
        ));
    }
    Ok(out)
}
