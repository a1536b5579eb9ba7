/// Validate -> generate -> write -> format.
///
/// Nothing is written unless validation passes and every generator succeeds.

use std::path::{Path, PathBuf};

use avlos_ir::DeviceTree;
use avlos_validate::{validate, ValidationError};
use thiserror::Error;
use tracing::info;

use crate::formatting::{format_files, DEFAULT_STYLE};
use crate::{Codegen, GeneratedFile};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("validation failed with {} error(s):\n{}", .0.len(), format_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("{language} generator failed: {error:#}")]
    Generator {
        language: String,
        error: anyhow::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Run `clang-format` over written C files.
    pub format: bool,
    pub style: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format: true,
            style: DEFAULT_STYLE.to_string(),
        }
    }
}

/// Run every generator over `tree` and write the results.
/// Returns the paths written, in generator order.
pub fn generate(
    tree: &DeviceTree,
    generators: &[&dyn Codegen],
    options: &GenerateOptions,
) -> Result<Vec<PathBuf>, GenerateError> {
    let report = validate(tree);
    if !report.is_ok() {
        return Err(GenerateError::Validation(report.errors));
    }

    let mut files: Vec<GeneratedFile> = Vec::new();
    for generator in generators {
        let code = generator
            .generate(tree)
            .map_err(|error| GenerateError::Generator {
                language: generator.language().to_string(),
                error,
            })?;
        files.extend(code.files);
    }

    let mut written = Vec::with_capacity(files.len());
    for file in &files {
        let path = PathBuf::from(&file.path);
        write_file(&path, &file.content)?;
        info!(path = %path.display(), "wrote");
        written.push(path);
    }

    if options.format {
        format_files(&written, &options.style);
    }
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<(), GenerateError> {
    let io_err = |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)
}
