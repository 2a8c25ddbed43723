//! Closed value type stored in shards.
//!
//! Merkle leaves need a byte encoding that never depends on map iteration
//! order or on a serializer's formatting choices, so the canonical encoding
//! is defined here once and used by every hash over shard contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const TAG_INT: u8 = 0x01;
const TAG_FLOAT: u8 = 0x02;
const TAG_STR: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_MAP: u8 = 0x05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Tagged, length-prefixed encoding. Map entries are emitted in key order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// False when any float, at any nesting depth, is NaN or infinite. Such
    /// values have no JSON form and cannot appear in a snapshot.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::Map(entries) => entries.values().all(Value::is_finite),
            _ => true,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int(n) => {
                out.push(TAG_INT);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Value::Float(f) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::Str(s) => {
                out.push(TAG_STR);
                push_len_prefixed(out, s.as_bytes());
            }
            Value::Bytes(b) => {
                out.push(TAG_BYTES);
                push_len_prefixed(out, b);
            }
            Value::Map(entries) => {
                out.push(TAG_MAP);
                out.extend_from_slice(&(entries.len() as u64).to_be_bytes());
                for (k, v) in entries {
                    push_len_prefixed(out, k.as_bytes());
                    v.encode_into(out);
                }
            }
        }
    }
}

pub(crate) fn push_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    out.extend_from_slice(bytes);
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}
