//! The unit stored in an index: identity, text, embedding and metadata.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity assigned by a store. Monotonically increasing, never reused.
pub type DocId = u64;

/// Open key/value metadata attached to a record (source name, page, ...).
/// Always present; an empty map when the caller supplied nothing.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A scalar or string metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Int(i) => write!(f, "{i}"),
            MetaValue::Float(x) => write!(f, "{x}"),
            MetaValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

impl From<u32> for MetaValue {
    fn from(i: u32) -> Self {
        MetaValue::Int(i64::from(i))
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        MetaValue::Float(x)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// A stored chunk of text with its embedding.
///
/// Stores only hand out shared references, so a record cannot change after
/// insertion.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_json_keeps_scalar_kinds() {
        let json = r#"{"source":"a.pdf","page":3,"score":0.5,"ocr":false}"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta["source"], MetaValue::Text("a.pdf".into()));
        assert_eq!(meta["page"], MetaValue::Int(3));
        assert_eq!(meta["score"], MetaValue::Float(0.5));
        assert_eq!(meta["ocr"], MetaValue::Bool(false));
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"ocr":false,"page":3,"score":0.5,"source":"a.pdf"}"#
        );
    }

    #[test]
    fn display_is_bare_value() {
        assert_eq!(MetaValue::from("notes.md").to_string(), "notes.md");
        assert_eq!(MetaValue::from(12u32).to_string(), "12");
    }
}
