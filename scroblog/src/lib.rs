//! # Scroblog
//!
//! A validated, time-ordered log of listen events (scrobbles) including:
//! - Raw-table validation (required columns, blank-to-null, row dropping)
//! - Timestamp normalization into one IANA timezone
//! - Derived metadata kept consistent with the table at all times
//! - Query operations (indexing, slicing, date filtering, top charts)
//! - lastfmstats.com ingestion and markdown/CSV/JSON export

pub mod charts;
pub mod error;
pub mod export;
pub mod ingest;
pub mod log;
pub mod meta;
pub mod record;
pub mod table;
pub mod timestamp;
pub mod validate;

pub use charts::{top_charts_markdown, ChartEntry, ChartKind};
pub use error::{Error, Result};
pub use export::MarkdownOptions;
pub use ingest::{from_lastfmstats, SourceFormat};
pub use log::{Append, LogOptions, ScrobbleLog};
pub use meta::{DateRange, Meta, DEFAULT_SOURCE, SCHEMA_VERSION};
pub use record::Scrobble;
pub use table::{RawTable, Value};
pub use timestamp::{DateInput, TimeUnit};
