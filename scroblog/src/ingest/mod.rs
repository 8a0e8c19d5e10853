//! Source-format ingestion
//!
//! Readers that turn external export files into raw tables and hand them
//! to the core validator.

mod lastfmstats;

pub use lastfmstats::{from_lastfmstats, SourceFormat, SOURCE_LASTFMSTATS};
