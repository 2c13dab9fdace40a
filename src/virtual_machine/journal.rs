//! Append-only journal of observable effects.
//!
//! Events are produced by the EMIT opcode during execution and handed to the
//! committer by value once the execution finishes (or fails; the journal is
//! preserved up to the failure point). Emission order is preserved.

use crate::types::hash::Hash;
use crate::types::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single journal entry: a kind tag, a payload mapping, a content hash,
/// and a timestamp.
///
/// The VM leaves `timestamp` at zero so journals stay deterministic; the
/// committer may stamp it at persistence time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEvent {
    pub kind: String,
    pub payload: BTreeMap<String, Value>,
    pub hash: String,
    pub timestamp: i64,
}

impl JournalEvent {
    /// Creates an event, computing its content hash from kind and payload.
    pub fn new(kind: impl Into<String>, payload: BTreeMap<String, Value>) -> JournalEvent {
        let kind = kind.into();
        let hash = content_hash(&kind, &payload);
        JournalEvent {
            kind,
            payload,
            hash,
            timestamp: 0,
        }
    }
}

/// SHA-256 over `kind:json(payload)`, lowercase hex with a `0x` prefix.
///
/// The payload map is ordered, so the JSON form (and therefore the hash) is
/// deterministic.
pub fn content_hash(kind: &str, payload: &BTreeMap<String, Value>) -> String {
    let body = serde_json::to_string(payload).unwrap_or_default();
    Hash::sha256()
        .chain(kind.as_bytes())
        .chain(b":")
        .chain(body.as_bytes())
        .finalize()
        .to_hex_prefixed()
}
