//! End-to-end tests of the scrobble log aggregate
//!
//! Exercises the invariants the crate promises: metadata always agrees
//! with the table, filters honor half-open bounds with whole-day end
//! handling, appends convert zones toward the receiver, and the
//! canonical JSON form round-trips.

use scroblog::{DateInput, LogOptions, RawTable, ScrobbleLog, Value};

fn raw_lastfm_rows() -> RawTable {
    // the shape ingestion collaborators hand over: epoch-ms 'date' column
    let records: Vec<serde_json::Map<String, serde_json::Value>> = vec![
        serde_json::from_str(r#"{"track":"A","artist":"X","date":0}"#).unwrap(),
        serde_json::from_str(r#"{"track":"B","artist":"Y","album":"Alb","date":86400000}"#)
            .unwrap(),
    ];
    let mut table = RawTable::from_records(&records);
    table.rename_column("date", "timestamp");
    table
}

fn utc_options() -> LogOptions {
    LogOptions {
        username: Some("sid".to_string()),
        tz: Some("Etc/UTC".to_string()),
        ..LogOptions::default()
    }
}

#[test]
fn epoch_ms_rows_produce_canonical_table_and_meta() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.meta().num_scrobbles, 2);
    assert_eq!(
        log.meta().date_range.start.as_deref(),
        Some("1970-01-01T00:00:00+00:00")
    );
    assert_eq!(
        log.meta().date_range.end.as_deref(),
        Some("1970-01-02T00:00:00+00:00")
    );
    // required fields survived, optional album only where given
    assert_eq!(log.get(0).unwrap().album, None);
    assert_eq!(log.get(1).unwrap().album.as_deref(), Some("Alb"));
}

#[test]
fn meta_always_agrees_with_table() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    for derived in [
        log.head(1).unwrap(),
        log.tail(1).unwrap(),
        log.slice(0..2).unwrap(),
        log.filter_by_date(None, None, None, true).unwrap(),
        log.tz_convert("Asia/Kolkata").unwrap(),
    ] {
        assert_eq!(derived.meta().num_scrobbles as usize, derived.len());
        let starts = derived.min_timestamp().map(|t| t.to_rfc3339());
        assert_eq!(derived.meta().date_range.start, starts);
    }
}

#[test]
fn filter_without_bounds_is_identity() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    let filtered = log.filter_by_date(None, None, None, true).unwrap();
    assert_eq!(filtered.len(), log.len());
    assert_eq!(filtered.scrobbles(), log.scrobbles());
}

#[test]
fn bare_date_end_is_whole_day_inclusive_but_half_open() {
    let table = RawTable::with_columns(vec![
        (
            "timestamp".to_string(),
            vec![
                Value::from("2024-05-05T23:00:00+00:00"),
                Value::from("2024-05-06T00:00:00+00:00"),
            ],
        ),
        (
            "track".to_string(),
            vec![Value::from("late"), Value::from("midnight")],
        ),
        (
            "artist".to_string(),
            vec![Value::from("X"), Value::from("Y")],
        ),
    ])
    .unwrap();
    let log = ScrobbleLog::new(&table, utc_options()).unwrap();
    let filtered = log
        .filter_by_date(
            Some(DateInput::from("2024-05-05")),
            Some(DateInput::from("2024-05-05")),
            None,
            true,
        )
        .unwrap();
    // the end bound advances to 2024-05-06T00:00, which stays excluded
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered.get(0).unwrap().track, "late");
    assert_eq!(filtered.source(), "filter");
}

#[test]
fn appending_a_log_in_another_zone_converts_toward_the_receiver() {
    let receiver_table = raw_lastfm_rows();
    let mut receiver = ScrobbleLog::new(&receiver_table, utc_options()).unwrap();
    let incoming = ScrobbleLog::new(
        &raw_lastfm_rows(),
        LogOptions {
            username: Some("sid".to_string()),
            tz: Some("Asia/Kolkata".to_string()),
            ..LogOptions::default()
        },
    )
    .unwrap();
    receiver.append(incoming).unwrap();
    assert_eq!(receiver.tz_name(), "Etc/UTC");
    assert_eq!(receiver.len(), 4);
    assert_eq!(receiver.meta().num_scrobbles, 4);
    for scrobble in &receiver {
        assert!(scrobble.timestamp.to_rfc3339().ends_with("+00:00"));
    }
}

#[test]
fn chart_kind_is_case_and_plural_insensitive_end_to_end() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    assert_eq!(
        log.top_charts("tracks", 3).unwrap(),
        log.top_charts("Track", 3).unwrap()
    );
    // n = 0 is an empty chart, not an error
    assert!(log.top_charts("album", 0).unwrap().is_empty());
}

#[test]
fn canonical_round_trip_preserves_equality() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    let back = ScrobbleLog::from_canonical_value(&log.to_canonical_value().unwrap()).unwrap();
    assert_eq!(back, log);

    let converted = log.tz_convert("Asia/Kolkata").unwrap();
    let back = ScrobbleLog::from_json_str(&converted.to_json_string().unwrap()).unwrap();
    assert_eq!(back, converted);
}

#[test]
fn tz_convert_is_idempotent() {
    let log = ScrobbleLog::new(&raw_lastfm_rows(), utc_options()).unwrap();
    let once = log.tz_convert("Asia/Kolkata").unwrap();
    assert_eq!(once.tz_convert("Asia/Kolkata").unwrap(), once);
}

#[test]
fn empty_log_has_null_bounds_and_renders_placeholder() {
    let table = RawTable::with_columns(vec![
        ("timestamp".to_string(), Vec::new()),
        ("track".to_string(), Vec::new()),
        ("artist".to_string(), Vec::new()),
    ])
    .unwrap();
    let log = ScrobbleLog::new(&table, utc_options()).unwrap();
    assert!(log.is_empty());
    assert_eq!(log.meta().num_scrobbles, 0);
    assert_eq!(log.meta().date_range.start, None);
    assert_eq!(log.meta().date_range.end, None);
    assert!(log.to_string().contains("No scrobbles present"));
}
