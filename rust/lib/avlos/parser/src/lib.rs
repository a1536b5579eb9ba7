//! Avlos schema parser
//!
//! Builds a [`DeviceTree`](avlos_ir::DeviceTree) from a schema document that
//! has already been loaded into a `serde_json::Value` (YAML and JSON loaders
//! both land there). Used by:
//! - codegen binary (schema file -> C sources)
//! - proxy (schema -> live remote object graph)

pub mod allocator;
pub mod builder;
pub mod error;
pub mod hash;

pub use allocator::EndpointAllocator;
pub use builder::{build_tree, BuildOptions};
pub use error::{SchemaError, SchemaIssue, SchemaIssueKind};
pub use hash::{canonical_json, hash_document};
