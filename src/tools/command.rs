//! Process plumbing shared by the system tool adapters.

use crate::error::ToolError;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Longest stderr excerpt kept in a [`ToolError::Failed`].
const STDERR_LIMIT: usize = 600;

/// Run `cmd` to completion, mapping spawn and exit failures to [`ToolError`].
///
/// `tool` is the human-facing name used in errors; it usually matches the
/// binary name but stays stable when the binary path is overridden.
pub fn run(tool: &str, cmd: &mut Command) -> Result<Output, ToolError> {
    debug!("Running {}: {:?}", tool, cmd);

    let output = match cmd.output() {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ToolError::NotFound {
                tool: tool.to_string(),
            })
        }
        Err(e) => return Err(ToolError::Io(e)),
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr: stderr_excerpt(&output.stderr),
        })
    }
}

/// Fail with [`ToolError::MissingOutput`] unless `path` exists and is non-empty.
pub fn expect_output(tool: &str, path: &Path) -> Result<(), ToolError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(ToolError::MissingOutput {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

/// Trimmed, length-capped UTF-8 rendering of a tool's stderr.
pub fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_LIMIT {
        return text.to_string();
    }
    let mut end = STDERR_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &text[..end])
}
