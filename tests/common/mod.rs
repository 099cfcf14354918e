//! Shared test helpers.

mod mock_source;

pub use mock_source::MockSource;

use serde_json::Value;
use sheet_mirror::Record;

/// Build a record from field pairs.
pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
