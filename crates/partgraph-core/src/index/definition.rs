//! Index definition document.
//!
//! Maps node/edge field paths to index keys:
//!
//! ```json
//! {
//!   "node": {
//!     "weight": "w:float:uint64_t:range_index",
//!     "features": {
//!       "city": "city:string:uint64_t:hash_index",
//!       "price": {"0": "price:float:uint64_t:range_index"}
//!     }
//!   },
//!   "edge": {"weight": "ew:float:uint64_t:hash_index"}
//! }
//! ```
//!
//! An index key is `"<name>:<valueType>:<idType>:<kind>"`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::value::ValueType;
use crate::codec::Encode;
use crate::error::{Error, Result};
use crate::schema::EntityClass;

/// Shape of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKind {
    /// Ids and weights grouped by value
    Hash,
    /// Entries sorted by value with cumulative weights
    Range,
    /// Range data per source node id
    Neighbor,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hash => "hash_index",
            IndexKind::Range => "range_index",
            IndexKind::Neighbor => "neighbor_index",
        }
    }

    /// Discriminant written to the descriptor file.
    pub fn tag(self) -> i32 {
        match self {
            IndexKind::Hash => 0,
            IndexKind::Range => 1,
            IndexKind::Neighbor => 2,
        }
    }
}

impl FromStr for IndexKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hash_index" => Ok(IndexKind::Hash),
            "range_index" => Ok(IndexKind::Range),
            "neighbor_index" => Ok(IndexKind::Neighbor),
            other => Err(Error::unknown_type("index kind", other)),
        }
    }
}

/// A parsed `"<name>:<valueType>:<idType>:<kind>"` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub name: String,
    pub value_type: ValueType,
    pub id_type: ValueType,
    pub kind: IndexKind,
}

impl IndexKey {
    /// Descriptor file contents: `i32 kind, i32 id type, i32 value type`.
    pub fn descriptor(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12);
        self.kind.tag().encode(&mut buf);
        self.id_type.codec_id().encode(&mut buf);
        self.value_type.codec_id().encode(&mut buf);
        buf
    }
}

impl FromStr for IndexKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [name, value_type, id_type, kind] = parts.as_slice() else {
            return Err(Error::malformed(format!(
                "index key '{s}' must have the form name:valueType:idType:kind"
            )));
        };
        if name.is_empty() {
            return Err(Error::malformed(format!("index key '{s}' has an empty name")));
        }
        Ok(Self {
            name: name.to_string(),
            value_type: value_type.parse()?,
            id_type: id_type.parse()?,
            kind: kind.parse()?,
        })
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name,
            self.value_type,
            self.id_type,
            self.kind.as_str()
        )
    }
}

/// Where an indexed value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// A top-level field such as `weight`
    Field(String),
    /// A feature's whole value
    Feature(String),
    /// One element of a feature's value array
    FeatureElement(String, usize),
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Field(name) => f.write_str(name),
            FieldPath::Feature(name) => write!(f, "features.{name}"),
            FieldPath::FeatureElement(name, i) => write!(f, "features.{name}[{i}]"),
        }
    }
}

/// A validated index definition.
#[derive(Debug, Clone, Default)]
pub struct IndexDefinition {
    node: Vec<(FieldPath, IndexKey)>,
    edge: Vec<(FieldPath, IndexKey)>,
    keys: BTreeMap<String, IndexKey>,
}

impl IndexDefinition {
    /// Parse a definition document.
    pub fn from_json(json: &Value) -> Result<Self> {
        let root = json
            .as_object()
            .ok_or_else(|| Error::malformed("index definition must be a JSON object"))?;
        let mut definition = Self::default();
        for (section, body) in root {
            let entity = match section.as_str() {
                "node" => EntityClass::Node,
                "edge" => EntityClass::Edge,
                other => {
                    return Err(Error::malformed(format!(
                        "unknown index definition section '{other}'"
                    )))
                }
            };
            let body = body.as_object().ok_or_else(|| {
                Error::malformed(format!("index definition section '{section}' must be an object"))
            })?;
            definition.parse_section(entity, body)?;
        }
        Ok(definition)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::malformed(format!("invalid index definition: {e}")))?;
        Self::from_json(&value)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
        Self::from_json(&value)
    }

    fn parse_section(&mut self, entity: EntityClass, body: &Map<String, Value>) -> Result<()> {
        for (field, spec) in body {
            if field != "features" {
                let key = expect_key(spec, field)?;
                self.add(entity, FieldPath::Field(field.clone()), key)?;
                continue;
            }
            let features = spec
                .as_object()
                .ok_or_else(|| Error::malformed("'features' must map feature names to index keys"))?;
            for (name, spec) in features {
                match spec {
                    Value::Object(elements) => {
                        for (i, spec) in elements {
                            let i: usize = i.parse().map_err(|_| {
                                Error::malformed(format!(
                                    "feature '{name}' element index '{i}' is not a number"
                                ))
                            })?;
                            let path = FieldPath::FeatureElement(name.clone(), i);
                            let key = expect_key(spec, &path.to_string())?;
                            self.add(entity, path, key)?;
                        }
                    }
                    other => {
                        let path = FieldPath::Feature(name.clone());
                        let key = expect_key(other, &path.to_string())?;
                        self.add(entity, path, key)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, entity: EntityClass, path: FieldPath, key: IndexKey) -> Result<()> {
        match self.keys.get(&key.name) {
            Some(existing) if *existing != key => {
                return Err(Error::malformed(format!(
                    "index '{}' declared as both '{existing}' and '{key}'",
                    key.name
                )))
            }
            Some(_) => {}
            None => {
                self.keys.insert(key.name.clone(), key.clone());
            }
        }
        match entity {
            EntityClass::Node => self.node.push((path, key)),
            EntityClass::Edge => self.edge.push((path, key)),
        }
        Ok(())
    }

    /// Node field mappings in document order.
    pub fn node_fields(&self) -> &[(FieldPath, IndexKey)] {
        &self.node
    }

    /// Edge field mappings in document order.
    pub fn edge_fields(&self) -> &[(FieldPath, IndexKey)] {
        &self.edge
    }

    /// Every distinct index, ordered by name.
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.keys.values()
    }

    pub fn key(&self, name: &str) -> Option<&IndexKey> {
        self.keys.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn expect_key(spec: &Value, path: &str) -> Result<IndexKey> {
    spec.as_str()
        .ok_or_else(|| Error::malformed(format!("index key for '{path}' must be a string")))?
        .parse()
}
