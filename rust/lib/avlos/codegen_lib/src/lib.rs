/// Codegen Library - shared code generation logic
///
/// Used by the `avlos` binary (and tests) to turn a validated device tree into
/// embedded C dispatchers and reference documentation.

pub mod c;
pub mod formatting;
pub mod pipeline;
pub mod rst;

use avlos_ir::DeviceTree;

pub use c::{CGenerator, CGeneratorConfig, CPaths};
pub use pipeline::{generate, GenerateError, GenerateOptions};
pub use rst::{RstGenerator, RstGeneratorConfig};

/// Autogenerated-file banner shared by every output.
pub const AUTOGEN_NOTICE: &str = "This file was automatically generated using Avlos.\n\
Any changes to this file will be overwritten when\n\
content is regenerated.";

/// Codegen trait - implement this for each output flavour
pub trait Codegen {
    fn generate(&self, tree: &DeviceTree) -> anyhow::Result<GeneratedCode>;
    fn language(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedCode {
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedCode {
    /// Look up a generated file by path.
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path)
    }
}
