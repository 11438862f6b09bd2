//! Flat field codec for remote records
//!
//! A remote record is a map of named scalar fields. Decoding is lenient:
//! a missing or mistyped field falls back to its default instead of
//! failing the whole record.

use serde_json::{Map, Value};

use crate::{sanitize_interval, ProgressRecord, RecordTime, DEFAULT_INTERVAL};

pub const FIELD_SCORE: &str = "score";
pub const FIELD_FLOWERS_SEEN: &str = "flowersSeen";
pub const FIELD_INTERVAL: &str = "interval";
pub const FIELD_LAST_MODIFIED: &str = "lastModified";

/// Named fields of one remote record
pub type RecordFields = Map<String, Value>;

pub fn encode_fields(record: &ProgressRecord) -> RecordFields {
    let mut fields = Map::new();
    fields.insert(FIELD_SCORE.into(), Value::from(record.score));
    fields.insert(FIELD_FLOWERS_SEEN.into(), Value::from(record.flowers_seen));
    fields.insert(FIELD_INTERVAL.into(), Value::from(record.interval));
    fields.insert(
        FIELD_LAST_MODIFIED.into(),
        Value::from(record.last_modified.as_millis()),
    );
    fields
}

/// Decode a record. `now` stands in for a missing modification time.
pub fn decode_fields(fields: &RecordFields, now: RecordTime) -> ProgressRecord {
    let score = counter_field(fields, FIELD_SCORE);
    let flowers_seen = counter_field(fields, FIELD_FLOWERS_SEEN);
    let interval = fields
        .get(FIELD_INTERVAL)
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_INTERVAL);
    let last_modified = fields
        .get(FIELD_LAST_MODIFIED)
        .and_then(Value::as_i64)
        .map(RecordTime::from_millis)
        .unwrap_or(now);

    ProgressRecord {
        score,
        flowers_seen,
        interval: sanitize_interval(interval),
        last_modified,
    }
}

// Negative counters clamp to zero
fn counter_field(fields: &RecordFields, name: &str) -> u64 {
    match fields.get(name) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_i64().map(|n| n.max(0) as u64))
            .unwrap_or(0),
        None => 0,
    }
}
