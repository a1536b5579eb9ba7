use avlos_ir::{EntityKind, OptionError, ParseValueError, QuantityParseError, UnitConversionError};
use thiserror::Error;

use crate::transport::TransportError;
use crate::wire::CodecError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Unknown child name on a node.
    #[error("'{node}' has no attribute '{name}'")]
    MissingAttribute { node: String, name: String },

    #[error("'{path}' is a {kind}, not a {expected}")]
    WrongKind {
        path: String,
        kind: EntityKind,
        expected: &'static str,
    },

    #[error("'{0}' has no getter")]
    NotReadable(String),

    #[error("'{0}' has no setter")]
    NotWritable(String),

    #[error("'{path}' takes {expected} argument(s), {got} given")]
    ArgumentCount {
        path: String,
        expected: usize,
        got: usize,
    },

    #[error("'{path}' cannot accept {value}")]
    InvalidValue { path: String, value: String },

    #[error("device hash {remote:#x} does not match schema hash {local:#x}")]
    HashMismatch { local: u32, remote: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Conversion(#[from] UnitConversionError),

    #[error(transparent)]
    Option(#[from] OptionError),

    #[error(transparent)]
    Quantity(#[from] QuantityParseError),

    #[error(transparent)]
    Parse(#[from] ParseValueError),
}

impl ProxyError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Transport(TransportError::Timeout { .. }))
    }
}
