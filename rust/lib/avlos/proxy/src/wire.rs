//! Little-endian payload codec matching the generated dispatchers.
//!
//! Fixed-width values travel as their native little-endian bytes. Strings
//! travel as raw UTF-8; a trailing NUL from the device is dropped.

use avlos_ir::{DataType, ScalarValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("{dtype} payload must be {expected} bytes, got {actual}")]
    Length {
        dtype: DataType,
        expected: usize,
        actual: usize,
    },

    #[error("value {value} does not fit in {dtype}")]
    OutOfRange { value: String, dtype: DataType },

    #[error("cannot encode {value:?} as {dtype}")]
    TypeMismatch { value: ScalarValue, dtype: DataType },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("void carries no payload")]
    Void,
}

/// Encode one value as `dtype`.
pub fn encode(dtype: DataType, value: &ScalarValue) -> Result<Vec<u8>, CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        value: value.clone(),
        dtype,
    };
    let bytes = match dtype {
        DataType::Void => return Err(CodecError::Void),
        DataType::Str => match value {
            ScalarValue::Str(s) => s.as_bytes().to_vec(),
            _ => return Err(mismatch()),
        },
        DataType::Bool => match value {
            ScalarValue::Bool(b) => vec![u8::from(*b)],
            _ => vec![u8::from(integer(dtype, value)? != 0)],
        },
        DataType::Float => vec_of(single(dtype, value.as_f64().ok_or_else(mismatch)?)?.to_le_bytes()),
        DataType::Double => vec_of(value.as_f64().ok_or_else(mismatch)?.to_le_bytes()),
        DataType::Uint8 => vec_of(narrow::<u8>(dtype, value)?.to_le_bytes()),
        DataType::Int8 => vec_of(narrow::<i8>(dtype, value)?.to_le_bytes()),
        DataType::Uint16 => vec_of(narrow::<u16>(dtype, value)?.to_le_bytes()),
        DataType::Int16 => vec_of(narrow::<i16>(dtype, value)?.to_le_bytes()),
        DataType::Uint32 => vec_of(narrow::<u32>(dtype, value)?.to_le_bytes()),
        DataType::Int32 => vec_of(narrow::<i32>(dtype, value)?.to_le_bytes()),
        DataType::Uint64 => vec_of(narrow::<u64>(dtype, value)?.to_le_bytes()),
        DataType::Int64 => vec_of(narrow::<i64>(dtype, value)?.to_le_bytes()),
    };
    Ok(bytes)
}

/// Concatenate positional values into one payload.
pub fn encode_all<'a>(
    values: impl IntoIterator<Item = (DataType, &'a ScalarValue)>,
) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    for (dtype, value) in values {
        payload.extend(encode(dtype, value)?);
    }
    Ok(payload)
}

/// Decode a complete payload as `dtype`.
pub fn decode(dtype: DataType, data: &[u8]) -> Result<ScalarValue, CodecError> {
    if dtype.is_void() {
        return Err(CodecError::Void);
    }
    if dtype.is_string() {
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        return String::from_utf8(data[..end].to_vec())
            .map(ScalarValue::Str)
            .map_err(|_| CodecError::InvalidUtf8);
    }

    let expected = dtype.size().unwrap_or(0);
    if data.len() != expected {
        return Err(CodecError::Length {
            dtype,
            expected,
            actual: data.len(),
        });
    }
    let value = match dtype {
        DataType::Bool => ScalarValue::Bool(data[0] != 0),
        DataType::Uint8 => ScalarValue::UInt(u64::from(data[0])),
        DataType::Int8 => ScalarValue::Int(i64::from(data[0] as i8)),
        DataType::Uint16 => ScalarValue::UInt(u64::from(u16::from_le_bytes(array(dtype, data)?))),
        DataType::Int16 => ScalarValue::Int(i64::from(i16::from_le_bytes(array(dtype, data)?))),
        DataType::Uint32 => ScalarValue::UInt(u64::from(u32::from_le_bytes(array(dtype, data)?))),
        DataType::Int32 => ScalarValue::Int(i64::from(i32::from_le_bytes(array(dtype, data)?))),
        DataType::Uint64 => ScalarValue::UInt(u64::from_le_bytes(array(dtype, data)?)),
        DataType::Int64 => ScalarValue::Int(i64::from_le_bytes(array(dtype, data)?)),
        DataType::Float => ScalarValue::Float(f64::from(f32::from_le_bytes(array(dtype, data)?))),
        DataType::Double => ScalarValue::Float(f64::from_le_bytes(array(dtype, data)?)),
        DataType::Void | DataType::Str => return Err(CodecError::Void),
    };
    Ok(value)
}

fn vec_of<const N: usize>(bytes: [u8; N]) -> Vec<u8> {
    bytes.to_vec()
}

fn array<const N: usize>(dtype: DataType, data: &[u8]) -> Result<[u8; N], CodecError> {
    data.try_into().map_err(|_| CodecError::Length {
        dtype,
        expected: N,
        actual: data.len(),
    })
}

/// Whole-number view of a value. Floats must have no fractional part.
fn integer(dtype: DataType, value: &ScalarValue) -> Result<i128, CodecError> {
    match value {
        ScalarValue::Bool(b) => Ok(i128::from(*b)),
        ScalarValue::UInt(v) => Ok(i128::from(*v)),
        ScalarValue::Int(v) => Ok(i128::from(*v)),
        ScalarValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i128),
        ScalarValue::Float(f) => Err(CodecError::OutOfRange {
            value: f.to_string(),
            dtype,
        }),
        ScalarValue::Str(_) => Err(CodecError::TypeMismatch {
            value: value.clone(),
            dtype,
        }),
    }
}

/// Narrow to `f32`. A finite value must stay finite.
fn single(dtype: DataType, value: f64) -> Result<f32, CodecError> {
    let narrowed = value as f32;
    if value.is_finite() && !narrowed.is_finite() {
        return Err(CodecError::OutOfRange {
            value: value.to_string(),
            dtype,
        });
    }
    Ok(narrowed)
}

fn narrow<N: TryFrom<i128>>(dtype: DataType, value: &ScalarValue) -> Result<N, CodecError> {
    let wide = integer(dtype, value)?;
    N::try_from(wide).map_err(|_| CodecError::OutOfRange {
        value: wide.to_string(),
        dtype,
    })
}
