//! Exclusion of files from the render pass.
//! Besides the `.kilnignore` file at the template root, every path whose file
//! or directory name starts with an underscore is treated as a partial and
//! never rendered on its own.

use crate::constants::{DEFAULT_IGNORE_PATTERNS, IGNORE_FILE};
use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use std::{fs::read_to_string, path::Path};

/// Reads the ignore file of a template root and compiles it together with
/// the default patterns.
///
/// # Notes
/// - A missing ignore file yields the default patterns only
/// - Each non-empty line not starting with `#` is a glob pattern
/// - Invalid patterns result in `Error::IgnoreError`
pub fn parse_ignore_file<P: AsRef<Path>>(templates_root: P) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORE_PATTERNS {
        builder.add(compile(pattern)?);
    }

    let ignore_path = templates_root.as_ref().join(IGNORE_FILE);
    if let Ok(contents) = read_to_string(&ignore_path) {
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder.add(compile(line)?);
        }
    } else {
        debug!("{} does not exist", ignore_path.display());
    }

    builder
        .build()
        .map_err(|e| Error::IgnoreError(format!("{IGNORE_FILE} loading failed: {e}")))
}

fn compile(pattern: &str) -> Result<Glob> {
    Glob::new(pattern)
        .map_err(|e| Error::IgnoreError(format!("{IGNORE_FILE} loading failed: {e}")))
}
