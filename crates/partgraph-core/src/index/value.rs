//! Index value and id types.
//!
//! The closed set of scalar types an index key may name, their codec ids, and
//! the typed values extracted from JSON.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::codec::Encode;
use crate::error::{Error, Result};

/// Scalar type of an index value or id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
}

impl ValueType {
    /// All types in codec-id order.
    pub const ALL: [ValueType; 12] = [
        ValueType::Int8,
        ValueType::Int16,
        ValueType::Int32,
        ValueType::Int64,
        ValueType::UInt8,
        ValueType::UInt16,
        ValueType::UInt32,
        ValueType::UInt64,
        ValueType::Float,
        ValueType::Double,
        ValueType::Bool,
        ValueType::String,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int8 => "int8_t",
            ValueType::Int16 => "int16_t",
            ValueType::Int32 => "int32_t",
            ValueType::Int64 => "int64_t",
            ValueType::UInt8 => "uint8_t",
            ValueType::UInt16 => "uint16_t",
            ValueType::UInt32 => "uint32_t",
            ValueType::UInt64 => "uint64_t",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Bool => "bool",
            ValueType::String => "string",
        }
    }

    /// Codec id written to index descriptors (`int8_t = 0` .. `string = 11`).
    pub fn codec_id(self) -> i32 {
        self as i32
    }

    /// Encoded width in bytes; `None` for length-prefixed strings.
    pub fn width(self) -> Option<usize> {
        match self {
            ValueType::Int8 | ValueType::UInt8 | ValueType::Bool => Some(1),
            ValueType::Int16 | ValueType::UInt16 => Some(2),
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float => Some(4),
            ValueType::Int64 | ValueType::UInt64 | ValueType::Double => Some(8),
            ValueType::String => None,
        }
    }

    /// Convert a JSON scalar into a value of this type.
    ///
    /// A single-element array is treated as its element.
    pub fn parse_json(self, json: &Value) -> Result<IndexValue> {
        let json = match json {
            Value::Array(items) if items.len() == 1 => &items[0],
            other => other,
        };
        let mismatch = || {
            Error::malformed(format!(
                "value {json} does not fit index type {}",
                self.as_str()
            ))
        };

        let signed = || json.as_i64().ok_or_else(mismatch);
        let unsigned = || json.as_u64().ok_or_else(mismatch);

        Ok(match self {
            ValueType::Int8 => IndexValue::Int8(i8::try_from(signed()?).map_err(|_| mismatch())?),
            ValueType::Int16 => {
                IndexValue::Int16(i16::try_from(signed()?).map_err(|_| mismatch())?)
            }
            ValueType::Int32 => {
                IndexValue::Int32(i32::try_from(signed()?).map_err(|_| mismatch())?)
            }
            ValueType::Int64 => IndexValue::Int64(signed()?),
            ValueType::UInt8 => {
                IndexValue::UInt8(u8::try_from(unsigned()?).map_err(|_| mismatch())?)
            }
            ValueType::UInt16 => {
                IndexValue::UInt16(u16::try_from(unsigned()?).map_err(|_| mismatch())?)
            }
            ValueType::UInt32 => {
                IndexValue::UInt32(u32::try_from(unsigned()?).map_err(|_| mismatch())?)
            }
            ValueType::UInt64 => IndexValue::UInt64(unsigned()?),
            ValueType::Float => IndexValue::Float(json.as_f64().ok_or_else(mismatch)? as f32),
            ValueType::Double => IndexValue::Double(json.as_f64().ok_or_else(mismatch)?),
            ValueType::Bool => IndexValue::Bool(json.as_bool().ok_or_else(mismatch)?),
            ValueType::String => match json {
                Value::String(s) => IndexValue::String(s.clone()),
                Value::Number(_) | Value::Bool(_) => IndexValue::String(json.to_string()),
                _ => return Err(mismatch()),
            },
        })
    }

    /// Convert a record id into a value of this type.
    pub fn id_value(self, id: u64) -> Result<IndexValue> {
        let overflow = || {
            Error::InvalidArgument(format!(
                "id {id} does not fit id type {}",
                self.as_str()
            ))
        };
        Ok(match self {
            ValueType::Int8 => IndexValue::Int8(i8::try_from(id).map_err(|_| overflow())?),
            ValueType::Int16 => IndexValue::Int16(i16::try_from(id).map_err(|_| overflow())?),
            ValueType::Int32 => IndexValue::Int32(i32::try_from(id).map_err(|_| overflow())?),
            ValueType::Int64 => IndexValue::Int64(i64::try_from(id).map_err(|_| overflow())?),
            ValueType::UInt8 => IndexValue::UInt8(u8::try_from(id).map_err(|_| overflow())?),
            ValueType::UInt16 => IndexValue::UInt16(u16::try_from(id).map_err(|_| overflow())?),
            ValueType::UInt32 => IndexValue::UInt32(u32::try_from(id).map_err(|_| overflow())?),
            ValueType::UInt64 => IndexValue::UInt64(id),
            ValueType::Float => IndexValue::Float(id as f32),
            ValueType::Double => IndexValue::Double(id as f64),
            ValueType::Bool => match id {
                0 => IndexValue::Bool(false),
                1 => IndexValue::Bool(true),
                _ => return Err(overflow()),
            },
            ValueType::String => IndexValue::String(id.to_string()),
        })
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ValueType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::unknown_type("value type", s))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed index value.
///
/// Values of one index all share a [`ValueType`]; ordering across types
/// falls back to the type order.
#[derive(Debug, Clone)]
pub enum IndexValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
}

impl IndexValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            IndexValue::Int8(_) => ValueType::Int8,
            IndexValue::Int16(_) => ValueType::Int16,
            IndexValue::Int32(_) => ValueType::Int32,
            IndexValue::Int64(_) => ValueType::Int64,
            IndexValue::UInt8(_) => ValueType::UInt8,
            IndexValue::UInt16(_) => ValueType::UInt16,
            IndexValue::UInt32(_) => ValueType::UInt32,
            IndexValue::UInt64(_) => ValueType::UInt64,
            IndexValue::Float(_) => ValueType::Float,
            IndexValue::Double(_) => ValueType::Double,
            IndexValue::Bool(_) => ValueType::Bool,
            IndexValue::String(_) => ValueType::String,
        }
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use IndexValue::*;
        match (self, other) {
            (Int8(a), Int8(b)) => a.cmp(b),
            (Int16(a), Int16(b)) => a.cmp(b),
            (Int32(a), Int32(b)) => a.cmp(b),
            (Int64(a), Int64(b)) => a.cmp(b),
            (UInt8(a), UInt8(b)) => a.cmp(b),
            (UInt16(a), UInt16(b)) => a.cmp(b),
            (UInt32(a), UInt32(b)) => a.cmp(b),
            (UInt64(a), UInt64(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (a, b) => a.value_type().cmp(&b.value_type()),
        }
    }
}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexValue {}

impl Encode for IndexValue {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            IndexValue::Int8(v) => v.encode(buf),
            IndexValue::Int16(v) => v.encode(buf),
            IndexValue::Int32(v) => v.encode(buf),
            IndexValue::Int64(v) => v.encode(buf),
            IndexValue::UInt8(v) => v.encode(buf),
            IndexValue::UInt16(v) => v.encode(buf),
            IndexValue::UInt32(v) => v.encode(buf),
            IndexValue::UInt64(v) => v.encode(buf),
            IndexValue::Float(v) => v.encode(buf),
            IndexValue::Double(v) => v.encode(buf),
            IndexValue::Bool(v) => v.encode(buf),
            IndexValue::String(v) => v.encode(buf),
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int8(v) => write!(f, "{v}"),
            IndexValue::Int16(v) => write!(f, "{v}"),
            IndexValue::Int32(v) => write!(f, "{v}"),
            IndexValue::Int64(v) => write!(f, "{v}"),
            IndexValue::UInt8(v) => write!(f, "{v}"),
            IndexValue::UInt16(v) => write!(f, "{v}"),
            IndexValue::UInt32(v) => write!(f, "{v}"),
            IndexValue::UInt64(v) => write!(f, "{v}"),
            IndexValue::Float(v) => write!(f, "{v}"),
            IndexValue::Double(v) => write!(f, "{v}"),
            IndexValue::Bool(v) => write!(f, "{v}"),
            IndexValue::String(v) => f.write_str(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codec_ids() {
        let ids: Vec<i32> = ValueType::ALL.iter().map(|t| t.codec_id()).collect();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
        assert_eq!(ValueType::Float.codec_id(), 8);
        assert_eq!(ValueType::String.codec_id(), 11);
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!("uint64_t".parse::<ValueType>().unwrap(), ValueType::UInt64);
        assert_eq!("double".parse::<ValueType>().unwrap(), ValueType::Double);
        assert!(matches!(
            "uint128_t".parse::<ValueType>(),
            Err(Error::UnknownType { what: "value type", .. })
        ));
    }

    #[test]
    fn test_parse_json_values() {
        assert_eq!(
            ValueType::Int8.parse_json(&json!(-3)).unwrap(),
            IndexValue::Int8(-3)
        );
        assert!(ValueType::UInt8.parse_json(&json!(300)).is_err());
        assert!(ValueType::UInt32.parse_json(&json!(-1)).is_err());
        assert_eq!(
            ValueType::Float.parse_json(&json!([2.5])).unwrap(),
            IndexValue::Float(2.5)
        );
        assert_eq!(
            ValueType::String.parse_json(&json!(42)).unwrap(),
            IndexValue::String("42".into())
        );
        assert!(ValueType::Bool.parse_json(&json!("yes")).is_err());
        assert!(ValueType::Double.parse_json(&json!([1.0, 2.0])).is_err());
    }

    #[test]
    fn test_encoded_widths() {
        for t in ValueType::ALL {
            let value = match t {
                ValueType::String => continue,
                ValueType::Bool => IndexValue::Bool(true),
                _ => t.id_value(1).unwrap(),
            };
            let mut buf = Vec::new();
            value.encode(&mut buf);
            assert_eq!(Some(buf.len()), t.width(), "{t}");
        }
    }

    #[test]
    fn test_ordering_uses_total_order_for_floats() {
        let mut values = vec![
            IndexValue::Double(3.0),
            IndexValue::Double(-1.0),
            IndexValue::Double(0.5),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                IndexValue::Double(-1.0),
                IndexValue::Double(0.5),
                IndexValue::Double(3.0)
            ]
        );
    }

    #[test]
    fn test_from_id_range() {
        assert_eq!(ValueType::UInt16.id_value(7).unwrap(), IndexValue::UInt16(7));
        assert!(ValueType::Int8.id_value(200).is_err());
        assert_eq!(
            ValueType::String.id_value(12).unwrap(),
            IndexValue::String("12".into())
        );
    }
}
