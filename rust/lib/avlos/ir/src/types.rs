//! Wire type catalog shared across all layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A wire data type.
///
/// Fixed-width scalars are copied with `memcpy` on the device side;
/// `Str` is variable length and goes through the string helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Void,
    Bool,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float,
    Double,
    #[serde(rename = "string")]
    Str,
}

impl DataType {
    /// Every type, in catalog order.
    pub const ALL: [DataType; 13] = [
        DataType::Void,
        DataType::Bool,
        DataType::Uint8,
        DataType::Int8,
        DataType::Uint16,
        DataType::Int16,
        DataType::Uint32,
        DataType::Int32,
        DataType::Uint64,
        DataType::Int64,
        DataType::Float,
        DataType::Double,
        DataType::Str,
    ];

    /// Look up a type by its schema name (`uint8`, `float`, `string`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.nickname() == name)
    }

    /// Schema name of the type.
    pub fn nickname(&self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Uint8 => "uint8",
            DataType::Int8 => "int8",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Str => "string",
        }
    }

    /// Native C type used in generated declarations.
    pub fn c_name(&self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Uint8 => "uint8_t",
            DataType::Int8 => "int8_t",
            DataType::Uint16 => "uint16_t",
            DataType::Int16 => "int16_t",
            DataType::Uint32 => "uint32_t",
            DataType::Int32 => "int32_t",
            DataType::Uint64 => "uint64_t",
            DataType::Int64 => "int64_t",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Str => "char[]",
        }
    }

    /// Native size in bytes. `None` for the variable-length string type.
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::Void => Some(0),
            DataType::Bool | DataType::Uint8 | DataType::Int8 => Some(1),
            DataType::Uint16 | DataType::Int16 => Some(2),
            DataType::Uint32 | DataType::Int32 | DataType::Float => Some(4),
            DataType::Uint64 | DataType::Int64 | DataType::Double => Some(8),
            DataType::Str => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Str)
    }

    /// True for types that can be copied with a single fixed-size `memcpy`.
    pub fn is_fixed_width(&self) -> bool {
        !self.is_void() && !self.is_string()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    /// Coerce a string (default/import value) into a scalar of this type.
    /// Returns `Ok(None)` for `void`.
    pub fn from_string(&self, s: &str) -> Result<Option<ScalarValue>, ParseValueError> {
        let s = s.trim();
        let err = || ParseValueError {
            value: s.to_string(),
            dtype: *self,
        };
        let value = match self {
            DataType::Void => return Ok(None),
            DataType::Bool => match s {
                "true" | "True" | "1" => ScalarValue::Bool(true),
                "false" | "False" | "0" => ScalarValue::Bool(false),
                _ => return Err(err()),
            },
            DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
                ScalarValue::UInt(s.parse().map_err(|_| err())?)
            }
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                ScalarValue::Int(s.parse().map_err(|_| err())?)
            }
            DataType::Float | DataType::Double => {
                ScalarValue::Float(s.parse().map_err(|_| err())?)
            }
            DataType::Str => ScalarValue::Str(s.to_string()),
        };
        Ok(Some(value))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nickname())
    }
}

/// A plain scalar value before unit tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScalarValue::UInt(v) => Some(*v as f64),
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::UInt(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Str(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse '{value}' as {dtype}")]
pub struct ParseValueError {
    pub value: String,
    pub dtype: DataType,
}
