//! Deterministic witness identifiers and the violation report.
//!
//! Two runs that observe the same failure produce the same witness id:
//!
//! 1. Build the witness key `{schema, class, subject, context}`
//! 2. Serialize it canonically (RFC 8785 / JCS: sorted keys, no whitespace)
//! 3. `witnessId = "w1_" || base32hex_lower(SHA256(keyBytes))`
//!
//! The human-readable message and the severity do not contribute to the id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

pub const WITNESS_SCHEMA: u32 = 1;

/// Compute a witness id from the canonical key fields.
pub fn compute_witness_id(class: &str, subject: &str, context: Option<&Value>) -> String {
    let key = canonical_witness_key(class, subject, context);
    content_digest("w1", &jcs_serialize(&key))
}

/// `{prefix}_` followed by lowercase unpadded base32hex of SHA-256(bytes).
pub fn content_digest(prefix: &str, bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!("{prefix}_{}", base32hex_lower_no_pad(&hash))
}

fn canonical_witness_key(class: &str, subject: &str, context: Option<&Value>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("schema".to_string(), Value::Number(WITNESS_SCHEMA.into()));
    map.insert("class".to_string(), Value::String(class.to_string()));
    map.insert("subject".to_string(), Value::String(subject.to_string()));
    map.insert(
        "context".to_string(),
        context.cloned().unwrap_or(Value::Null),
    );
    Value::Object(map)
}

/// RFC 8785 serialization for the value shapes witness keys use: strings,
/// integers, booleans, null, arrays and objects. Keys are sorted explicitly
/// so the result does not depend on serde_json's map ordering feature.
fn jcs_serialize(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    jcs_write(value, &mut buf);
    buf
}

fn jcs_write(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                buf.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                buf.extend_from_slice(u.to_string().as_bytes());
            } else {
                buf.extend_from_slice(n.to_string().as_bytes());
            }
        }
        // Display on a string Value is its escaped JSON form.
        Value::String(_) => buf.extend_from_slice(value.to_string().as_bytes()),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                jcs_write(item, buf);
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                buf.extend_from_slice(Value::String((*key).clone()).to_string().as_bytes());
                buf.push(b':');
                jcs_write(&map[*key], buf);
            }
            buf.push(b'}');
        }
    }
}

/// RFC 4648 base32hex, lowercase, without padding. Alphabet: 0-9 a-v.
fn base32hex_lower_no_pad(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    let mut result = String::with_capacity(data.len() * 8 / 5 + 1);
    let mut bits: u64 = 0;
    let mut num_bits: u32 = 0;

    for &byte in data {
        bits = (bits << 8) | u64::from(byte);
        num_bits += 8;
        while num_bits >= 5 {
            num_bits -= 5;
            let idx = ((bits >> num_bits) & 0x1f) as usize;
            result.push(ALPHABET[idx] as char);
        }
    }
    if num_bits > 0 {
        let idx = ((bits << (5 - num_bits)) & 0x1f) as usize;
        result.push(ALPHABET[idx] as char);
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One observed violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    pub witness_id: String,
    pub class: String,
    /// What the violation is about, e.g. `sentence:S0004` or `unit:12`.
    pub subject: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub severity: Severity,
}

impl Witness {
    pub fn new(
        class: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
        context: Option<Value>,
        severity: Severity,
    ) -> Self {
        let class = class.into();
        let subject = subject.into();
        let witness_id = compute_witness_id(&class, &subject, context.as_ref());
        Self {
            witness_id,
            class,
            subject,
            message: message.into(),
            context,
            severity,
        }
    }

    fn sort_key(&self) -> (&str, &str, String, &str) {
        (
            &self.class,
            &self.subject,
            self.context
                .as_ref()
                .map(|c| String::from_utf8_lossy(&jcs_serialize(c)).into_owned())
                .unwrap_or_default(),
            &self.witness_id,
        )
    }
}

impl PartialOrd for Witness {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Witness {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Every violation from one check or merge, sorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub report_schema: u32,
    /// `accepted` unless some witness has error severity.
    pub result: String,
    pub failure_classes: Vec<String>,
    pub violations: Vec<Witness>,
}

impl ViolationReport {
    pub fn from_witnesses(mut violations: Vec<Witness>) -> Self {
        violations.sort();
        violations.dedup_by(|a, b| a.witness_id == b.witness_id);
        let mut failure_classes: Vec<String> =
            violations.iter().map(|w| w.class.clone()).collect();
        failure_classes.sort();
        failure_classes.dedup();
        let rejected = violations.iter().any(|w| w.severity == Severity::Error);
        Self {
            report_schema: WITNESS_SCHEMA,
            result: if rejected { "rejected" } else { "accepted" }.to_string(),
            failure_classes,
            violations,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.result == "accepted"
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|w| w.severity == severity)
            .count()
    }
}

pub mod failure_class {
    pub const TILING_MISMATCH: &str = "tiling_mismatch";
    pub const COLLISION: &str = "collision";
    pub const GATE_VIOLATION: &str = "gate_violation";
    pub const BASKET_MISSING_OWN_UNIT: &str = "basket_missing_own_unit";
    pub const BATCH_STRUCTURALLY_INVALID: &str = "batch_structurally_invalid";
    pub const CROSS_BATCH_DUPLICATE: &str = "cross_batch_duplicate";
    pub const UNKNOWN_REFERENCE: &str = "unknown_reference";
    pub const OWNERSHIP_MISMATCH: &str = "ownership_mismatch";
    pub const OCCURRENCE_ORDER: &str = "occurrence_order";
}
