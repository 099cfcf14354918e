// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The `Record` type: one row of external tabular data.
//!
//! A record is a mapping from field name to JSON scalar value. Fields are
//! kept in a `BTreeMap`, so iteration order is always lexicographic by field
//! name regardless of the order the source delivered them - the canonical
//! ordering the fingerprint relies on is structural, not an afterthought.
//!
//! # Identifier
//!
//! Each record is expected to carry an `id` field. Records where `id` is
//! absent, JSON null, or an empty string have no usable identity and are
//! skipped by the sync engine (a documented exclusion, not an error).
//! Numeric ids are canonicalized to their decimal string form, so a sheet
//! that flips between `42` and `"42"` addresses the same stored row.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name designated as the record identifier.
pub const ID_FIELD: &str = "id";

/// One row of external tabular data as a field-name-to-value mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// The record's identifier as text, if it has a usable one.
    ///
    /// Returns `None` for a missing field, JSON null, an empty string, or a
    /// non-scalar value.
    pub fn id(&self) -> Option<String> {
        match self.0.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Set a field value. Replaces any existing value for the field.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate fields in lexicographic order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
