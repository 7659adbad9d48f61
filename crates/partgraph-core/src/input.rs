//! JSON graph document model.
//!
//! ```json
//! {
//!   "nodes": [{"id": 0, "type": "user", "weight": 1.0,
//!              "features": [{"name": "emb", "type": "dense", "value": [0.1, 0.2]}]}],
//!   "edges": [{"src": 0, "dst": 1, "type": "click", "weight": 2.0, "features": []}]
//! }
//! ```
//!
//! Unknown top-level fields on nodes and edges are kept so index definitions
//! can reference them.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::FeatureKind;

/// A node or edge `type`: either a name or an integer.
///
/// Both forms are registered under their string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeName {
    Number(i64),
    Text(String),
}

impl TypeName {
    /// Registry key for this type.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            TypeName::Number(n) => Cow::Owned(n.to_string()),
            TypeName::Text(s) => Cow::Borrowed(s),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            TypeName::Number(n) => Value::from(*n),
            TypeName::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        TypeName::Text(s.to_string())
    }
}

/// One `{name, type, value}` feature entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureJson {
    pub name: String,
    /// Feature kind as written; validated by [`FeatureJson::kind`]
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl FeatureJson {
    /// Parsed feature kind.
    pub fn kind(&self) -> Result<FeatureKind> {
        self.kind.parse()
    }

    /// Schema key, `"<kind>_<name>"`.
    pub fn key(&self) -> Result<String> {
        Ok(self.kind()?.key(&self.name))
    }

    /// Sparse indices.
    pub fn sparse_values(&self) -> Result<Vec<u64>> {
        self.array()?
            .iter()
            .map(|v| {
                v.as_u64().ok_or_else(|| {
                    Error::malformed(format!(
                        "sparse feature '{}' holds non-integer value {v}",
                        self.name
                    ))
                })
            })
            .collect()
    }

    /// Dense vector.
    pub fn dense_values(&self) -> Result<Vec<f32>> {
        self.array()?
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    Error::malformed(format!(
                        "dense feature '{}' holds non-numeric value {v}",
                        self.name
                    ))
                })
            })
            .collect()
    }

    /// Binary payload (the string's UTF-8 bytes).
    pub fn binary_value(&self) -> Result<Vec<u8>> {
        match &self.value {
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(Error::malformed(format!(
                "binary feature '{}' must be a string, got {other}",
                self.name
            ))),
        }
    }

    fn array(&self) -> Result<&Vec<Value>> {
        self.value.as_array().ok_or_else(|| {
            Error::malformed(format!(
                "feature '{}' of kind {} must be an array",
                self.name, self.kind
            ))
        })
    }
}

/// One node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_name: TypeName,
    pub weight: f32,
    #[serde(default)]
    pub features: Vec<FeatureJson>,
    /// Any other top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeJson {
    /// Top-level field by name, including the typed ones.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "type" => Some(self.type_name.to_value()),
            "weight" => Some(Value::from(self.weight)),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// One directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeJson {
    pub src: u64,
    pub dst: u64,
    #[serde(rename = "type")]
    pub type_name: TypeName,
    pub weight: f32,
    #[serde(default)]
    pub features: Vec<FeatureJson>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeJson {
    /// Top-level field by name, including the typed ones.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "src" => Some(Value::from(self.src)),
            "dst" => Some(Value::from(self.dst)),
            "type" => Some(self.type_name.to_value()),
            "weight" => Some(Value::from(self.weight)),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// A whole graph document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeJson>,
    #[serde(default)]
    pub edges: Vec<EdgeJson>,
}

impl GraphDocument {
    /// Load a document from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))
    }

    /// Parse a document from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::malformed(format!("invalid graph document: {e}")))
    }
}
