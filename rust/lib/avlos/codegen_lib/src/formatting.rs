/// Best-effort `clang-format` pass over generated sources.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

pub const CLANG_FORMAT: &str = "clang-format";
pub const DEFAULT_STYLE: &str = "LLVM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted,
    /// The formatter is not installed.
    Unavailable,
    Failed,
}

/// True if `clang-format` can be spawned.
pub fn is_clang_format_available() -> bool {
    Command::new(CLANG_FORMAT)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Format one file in place. Never returns an error.
pub fn format_c_code(path: &Path, style: &str) -> FormatOutcome {
    format_with(CLANG_FORMAT, path, style)
}

fn format_with(program: &str, path: &Path, style: &str) -> FormatOutcome {
    let result = Command::new(program)
        .arg("-i")
        .arg(format!("--style={}", style))
        .arg(path)
        .output();
    match result {
        Ok(output) if output.status.success() => {
            debug!(path = %path.display(), "formatted");
            FormatOutcome::Formatted
        }
        Ok(output) => {
            warn!(
                path = %path.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "{} failed",
                program
            );
            FormatOutcome::Failed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => FormatOutcome::Unavailable,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not run {}", program);
            FormatOutcome::Failed
        }
    }
}

/// Format every C source or header in `paths`; other files are skipped.
pub fn format_files<P: AsRef<Path>>(paths: &[P], style: &str) -> Vec<(String, FormatOutcome)> {
    paths
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("c" | "h")))
        .map(|p| (p.display().to_string(), format_c_code(p, style)))
        .collect()
}
