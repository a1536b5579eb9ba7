//! Avlos device-tree Intermediate Representation (IR)
//!
//! Data structures shared between:
//! - parser (schema document -> tree)
//! - validator (pre-generation checks)
//! - codegen (embedded C dispatchers + docs)
//! - proxy (host-side remote access)
//!
//! Four layers:
//! 1. Types: wire type catalog
//! 2. Units: physical unit registry + quantities
//! 3. Codecs: bitmask flags and enum options
//! 4. Tree: nodes and endpoints with stable IDs

pub mod types;
pub mod unit;
pub mod codec;
pub mod tree;

pub use types::*;
pub use unit::*;
pub use codec::*;
pub use tree::*;
