//! Discovery of template entries.
//! Enumeration only reads the template tree; writing the rendered output is
//! left to [`crate::processor`].

use globset::GlobSet;
use log::debug;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::TEMPLATE_SUFFIX;
use crate::error::{Error, Result};

/// One template file, keyed by its path relative to the template root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    relative_path: PathBuf,
    content: String,
}

impl TemplateEntry {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(relative_path: P, content: S) -> Self {
        Self { relative_path: relative_path.into(), content: content.into() }
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Output path relative to the project root: the template path with the
    /// template suffix removed.
    pub fn destination_path(&self) -> PathBuf {
        match self
            .relative_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(TEMPLATE_SUFFIX))
        {
            Some(stripped) => self.relative_path.with_file_name(stripped),
            None => self.relative_path.clone(),
        }
    }

    /// Override key for the template-relative path.
    pub fn template_key(&self) -> String {
        path_key(&self.relative_path)
    }

    /// Override key for the destination-relative path.
    pub fn destination_key(&self) -> String {
        path_key(&self.destination_path())
    }
}

/// Templates compiled into kiln, used when the configuration names no
/// template directory.
const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    (".env.j2", include_str!("../templates/.env.j2")),
    ("lib/auth.ts.j2", include_str!("../templates/lib/auth.ts.j2")),
    ("lib/prisma.ts.j2", include_str!("../templates/lib/prisma.ts.j2")),
];

/// Where a render pass reads its templates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Directory(PathBuf),
    Builtin,
}

impl From<&Path> for TemplateSource {
    fn from(path: &Path) -> Self {
        TemplateSource::Directory(path.to_path_buf())
    }
}

impl From<PathBuf> for TemplateSource {
    fn from(path: PathBuf) -> Self {
        TemplateSource::Directory(path)
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::Directory(path) => write!(f, "{}", path.display()),
            TemplateSource::Builtin => f.write_str("built-in templates"),
        }
    }
}

/// The built-in template entries, in path order.
pub fn builtin_entries() -> Vec<TemplateEntry> {
    BUILTIN_TEMPLATES.iter().map(|(path, content)| TemplateEntry::new(*path, *content)).collect()
}

/// Checks whether a file name marks a template: it carries the template
/// suffix and something in front of it.
pub fn is_template_file(file_name: &str) -> bool {
    file_name.len() > TEMPLATE_SUFFIX.len() && file_name.ends_with(TEMPLATE_SUFFIX)
}

/// Joins the components of a relative path with `/`, whatever the platform.
pub fn path_key(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path of `path` below `root`.
///
/// # Errors
/// * `Error::IoError` if `path` does not live under `root`
pub fn relative_to<'p>(root: &Path, path: &'p Path) -> Result<&'p Path> {
    path.strip_prefix(root).map_err(|_| {
        Error::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside of {}", path.display(), root.display()),
        ))
    })
}

/// Walks the template tree depth-first, in file name order, and reads every
/// template file that is not ignored.
///
/// # Errors
/// * `Error::WalkError` if a directory cannot be traversed
/// * `Error::IoError` if a template file cannot be read
pub fn enumerate_entries(templates_root: &Path, ignored: &GlobSet) -> Result<Vec<TemplateEntry>> {
    let mut entries = Vec::new();

    for dir_entry in WalkDir::new(templates_root).sort_by_file_name() {
        let dir_entry = dir_entry?;
        if dir_entry.file_type().is_dir() {
            continue;
        }

        let relative_path = relative_to(templates_root, dir_entry.path())?;
        let key = path_key(relative_path);

        if ignored.is_match(&key) {
            debug!("Skipping ignored file: {key}");
            continue;
        }

        let is_template =
            relative_path.file_name().and_then(|name| name.to_str()).is_some_and(is_template_file);
        if !is_template {
            debug!("Skipping non-template file: {key}");
            continue;
        }

        let content = fs::read_to_string(dir_entry.path()).map_err(Error::IoError)?;
        entries.push(TemplateEntry::new(relative_path, content));
    }

    Ok(entries)
}
