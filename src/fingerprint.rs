// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content fingerprinting for change detection.
//!
//! A fingerprint is the SHA-256 digest of a record's canonical JSON
//! serialization, encoded as lowercase hex. Two invariants are load-bearing:
//!
//! - **Determinism**: identical field-value sets always produce the same
//!   fingerprint, regardless of the order fields were inserted. The
//!   [`Record`](crate::record::Record) keeps its fields in lexicographic
//!   order, so the serialization is canonical by construction.
//! - **Sensitivity**: any difference in any field value changes the
//!   fingerprint with overwhelming probability (SHA-256 collision
//!   resistance).
//!
//! The store compares fingerprints to decide whether a write is needed at
//! all; nothing else about the digest choice matters.

use crate::record::Record;
use sha2::{Digest, Sha256};

/// Compute the fingerprint for a record.
///
/// Serialization cannot fail for a map of JSON values, so this is
/// infallible.
pub fn fingerprint(record: &Record) -> String {
    let canonical =
        serde_json::to_vec(record).expect("serializing a JSON value map cannot fail");
    hex::encode(Sha256::digest(&canonical))
}
