use std::fmt;

use avlos_ir::{EnumValue, Quantity, ScalarValue};

/// A decoded endpoint value, or an argument to a write or call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a call to a function returning `void`.
    Void,
    Scalar(ScalarValue),
    Quantity(Quantity),
    Option(EnumValue),
    /// Names of the set flags of a bitmask, in declaration order.
    Flags(Vec<String>),
}

impl Value {
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Value::Quantity(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric magnitude, ignoring any unit.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => s.as_f64(),
            Value::Quantity(q) => Some(q.magnitude()),
            Value::Option(o) => Some(f64::from(o.index)),
            Value::Void | Value::Flags(_) => None,
        }
    }

    /// JSON form used by export. Quantities become `"<magnitude> <unit>"`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Void => serde_json::Value::Null,
            Value::Scalar(ScalarValue::Bool(b)) => (*b).into(),
            Value::Scalar(ScalarValue::UInt(v)) => (*v).into(),
            Value::Scalar(ScalarValue::Int(v)) => (*v).into(),
            Value::Scalar(ScalarValue::Float(v)) => (*v).into(),
            Value::Scalar(ScalarValue::Str(s)) => s.clone().into(),
            Value::Quantity(q) => q.to_string().into(),
            Value::Option(o) => o.name.clone().into(),
            Value::Flags(flags) => flags.clone().into(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Quantity(q) => write!(f, "{}", q),
            Value::Option(o) => write!(f, "{}", o),
            Value::Flags(flags) if flags.is_empty() => f.write_str("(no flags)"),
            Value::Flags(flags) => f.write_str(&flags.join(" ")),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Value::Scalar(v)
    }
}

impl From<Quantity> for Value {
    fn from(v: Quantity) -> Self {
        Value::Quantity(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Option(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(ScalarValue::Float(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(ScalarValue::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Scalar(ScalarValue::Int(i64::from(v)))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Scalar(ScalarValue::UInt(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(ScalarValue::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(ScalarValue::Str(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(ScalarValue::Str(v))
    }
}
