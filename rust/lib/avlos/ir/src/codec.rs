//! Flag and option codecs for bitmask and enum endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered flag names of a bitmask endpoint. Flag `i` maps to bit `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmask {
    flags: Vec<String>,

    /// Name reported when no bit is set (e.g. `NONE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_name: Option<String>,
}

impl Bitmask {
    pub fn new<S: Into<String>>(flags: impl IntoIterator<Item = S>) -> Self {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
            default_name: None,
        }
    }

    /// Report `name` instead of an empty list when no flag is set.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Names of the flags whose bit is set in `value`, in flag order.
    pub fn decode(&self, value: u64) -> Vec<String> {
        let matches: Vec<String> = self
            .flags
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < 64 && value & (1u64 << i) != 0)
            .map(|(_, name)| name.clone())
            .collect();
        match (&self.default_name, matches.is_empty()) {
            (Some(default), true) => vec![default.clone()],
            _ => matches,
        }
    }

    /// OR together the bits of every known flag in `names`.
    /// Unknown names are ignored.
    pub fn encode<S: AsRef<str>>(&self, names: &[S]) -> u64 {
        self.flags
            .iter()
            .enumerate()
            .filter(|(i, flag)| *i < 64 && names.iter().any(|n| n.as_ref() == flag.as_str()))
            .fold(0, |acc, (i, _)| acc | (1u64 << i))
    }
}

/// One option of an enum endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    pub index: u8,
    pub name: String,
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Input accepted when encoding an enum value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumInput {
    Index(i64),
    Option(EnumValue),
    Name(String),
}

impl From<i64> for EnumInput {
    fn from(v: i64) -> Self {
        EnumInput::Index(v)
    }
}

impl From<EnumValue> for EnumInput {
    fn from(v: EnumValue) -> Self {
        EnumInput::Option(v)
    }
}

impl From<&str> for EnumInput {
    fn from(v: &str) -> Self {
        EnumInput::Name(v.to_string())
    }
}

impl From<String> for EnumInput {
    fn from(v: String) -> Self {
        EnumInput::Name(v)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("value {value} is out of range for {count} options")]
    OutOfRange { value: i64, count: usize },

    #[error("'{0}' is not an option of this enum")]
    UnknownName(String),

    #[error("option '{0}' does not belong to this enum")]
    ForeignOption(String),
}

/// Sequential (0-based, declaration order) option names of an enum endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    options: Vec<String>,
}

impl OptionSet {
    pub fn new<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Self {
        Self {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// All options as values, in declaration order. Options past the
    /// `u8` index range have no wire value and are left out.
    pub fn values(&self) -> Vec<EnumValue> {
        self.options
            .iter()
            .zip(0..=u8::MAX)
            .map(|(name, index)| EnumValue {
                index,
                name: name.clone(),
            })
            .collect()
    }

    pub fn by_name(&self, name: &str) -> Option<EnumValue> {
        let index = self.options.iter().position(|o| o == name)?;
        Some(EnumValue {
            index: u8::try_from(index).ok()?,
            name: name.to_string(),
        })
    }

    /// Map a raw wire value to the option at that index.
    pub fn decode(&self, value: u64) -> Result<EnumValue, OptionError> {
        let index = u8::try_from(value).ok();
        match index.and_then(|i| Some((i, self.options.get(usize::from(i))?))) {
            Some((index, name)) => Ok(EnumValue {
                index,
                name: name.clone(),
            }),
            None => Err(OptionError::OutOfRange {
                value: i64::try_from(value).unwrap_or(i64::MAX),
                count: self.options.len(),
            }),
        }
    }

    /// Resolve an index, option or option name to its wire value.
    pub fn encode(&self, input: impl Into<EnumInput>) -> Result<u8, OptionError> {
        match input.into() {
            EnumInput::Index(v) => match u8::try_from(v) {
                Ok(index) if usize::from(index) < self.options.len() => Ok(index),
                _ => Err(OptionError::OutOfRange {
                    value: v,
                    count: self.options.len(),
                }),
            },
            EnumInput::Option(opt) => match self.options.get(usize::from(opt.index)) {
                Some(name) if *name == opt.name => Ok(opt.index),
                _ => Err(OptionError::ForeignOption(opt.name)),
            },
            EnumInput::Name(name) => self
                .by_name(&name)
                .map(|v| v.index)
                .ok_or(OptionError::UnknownName(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Vec<Vec<&'static str>> {
        vec![
            vec!["NONE"],
            vec!["ONE"],
            vec!["TWO"],
            vec!["ONE", "TWO"],
            vec!["FOUR"],
            vec!["ONE", "FOUR"],
            vec!["TWO", "FOUR"],
            vec!["ONE", "TWO", "FOUR"],
        ]
    }

    #[test]
    fn bitmask_decode_encode() {
        let mask = Bitmask::new(["ONE", "TWO", "FOUR"]);
        assert_eq!(mask.decode(5), vec!["ONE", "FOUR"]);
        assert_eq!(mask.encode(&["TWO", "FOUR"]), 6);
        assert!(mask.decode(0).is_empty());
    }

    #[test]
    fn bitmask_reference_table() {
        let mask = Bitmask::new(["ONE", "TWO", "FOUR"]).with_default_name("NONE");
        for (i, expected) in reference().iter().enumerate() {
            assert_eq!(mask.decode(i as u64), *expected, "decode({})", i);
            assert_eq!(mask.encode(expected), i as u64, "encode({:?})", expected);
        }
    }

    #[test]
    fn bitmask_ignores_unknown_names() {
        let mask = Bitmask::new(["ONE", "TWO", "FOUR"]);
        assert_eq!(mask.encode(&["EIGHT"]), 0);
        assert_eq!(mask.encode(&["ONE", "bogus"]), 1);
    }

    #[test]
    fn bitmask_ignores_bits_beyond_flags() {
        let mask = Bitmask::new(["ONE", "TWO"]);
        assert_eq!(mask.decode(0b1111), vec!["ONE", "TWO"]);
    }

    #[test]
    fn enum_round_trip() {
        let set = OptionSet::new(["IDLE", "CALIBRATE", "CL_CONTROL"]);
        for value in set.values() {
            // by index
            let raw = set.encode(value.index as i64).unwrap();
            assert_eq!(set.decode(raw as u64).unwrap(), value);
            // by instance
            let raw = set.encode(value.clone()).unwrap();
            assert_eq!(set.decode(raw as u64).unwrap(), value);
            // by name
            let raw = set.encode(value.name.as_str()).unwrap();
            assert_eq!(set.decode(raw as u64).unwrap(), value);
        }
    }

    #[test]
    fn enum_rejects_invalid_input() {
        let set = OptionSet::new(["A", "B"]);
        assert!(matches!(set.encode(2i64), Err(OptionError::OutOfRange { .. })));
        assert!(matches!(set.encode(-1i64), Err(OptionError::OutOfRange { .. })));
        assert!(matches!(set.encode("C"), Err(OptionError::UnknownName(_))));
        let foreign = EnumValue {
            index: 1,
            name: "Z".into(),
        };
        assert!(matches!(set.encode(foreign), Err(OptionError::ForeignOption(_))));
        assert!(set.decode(5).is_err());
    }

    #[test]
    fn options_past_u8_range_do_not_wrap() {
        let set = OptionSet::new((0..258).map(|i| format!("O{}", i)));
        let values = set.values();
        assert_eq!(values.len(), 256);
        assert_eq!(values[255].name, "O255");
        assert_eq!(set.by_name("O256"), None);
        assert!(matches!(set.encode("O256"), Err(OptionError::UnknownName(_))));
        assert!(matches!(set.encode(256i64), Err(OptionError::OutOfRange { .. })));
        assert!(set.decode(256).is_err());
        assert_eq!(set.decode(0).unwrap().name, "O0");
    }
}
