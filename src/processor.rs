//! The render pass: turns a template tree into files under the project root.

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ignore::parse_ignore_file;
use crate::renderer::TemplateRenderer;
use crate::template::{builtin_entries, enumerate_entries, TemplateEntry, TemplateSource};

/// Variables shared by every template of a render pass.
pub type Context = Map<String, Value>;

/// Per-file variables keyed by destination-relative or template-relative path.
pub type Overrides = IndexMap<String, Context>;

/// Computes the variables visible to one entry.
///
/// Global data is overridden key by key by the entry registered under the
/// destination path or, when there is none, under the template path.
pub fn scope_for(global: &Context, overrides: &Overrides, entry: &TemplateEntry) -> Value {
    let mut scope = global.clone();
    let entry_overrides =
        overrides.get(&entry.destination_key()).or_else(|| overrides.get(&entry.template_key()));
    if let Some(entry_overrides) = entry_overrides {
        for (key, value) in entry_overrides {
            scope.insert(key.clone(), value.clone());
        }
    }
    Value::Object(scope)
}

/// Fails on the first override key that matches neither the destination nor
/// the template key of any entry.
pub fn check_overrides(entries: &[TemplateEntry], overrides: &Overrides) -> Result<()> {
    let unmatched = overrides.keys().find(|key| {
        !entries
            .iter()
            .any(|entry| entry.destination_key() == **key || entry.template_key() == **key)
    });
    match unmatched {
        Some(key) => Err(Error::UnmatchedOverride { key: key.clone() }),
        None => Ok(()),
    }
}

pub struct Processor<'a> {
    renderer: &'a dyn TemplateRenderer,
    source: &'a TemplateSource,
    project_root: &'a Path,
}

impl<'a> Processor<'a> {
    pub fn new(
        renderer: &'a dyn TemplateRenderer,
        source: &'a TemplateSource,
        project_root: &'a Path,
    ) -> Self {
        Self { renderer, source, project_root }
    }

    fn entries(&self) -> Result<Vec<TemplateEntry>> {
        match self.source {
            TemplateSource::Directory(root) if !root.exists() => {
                warn!("Template directory {} does not exist, nothing to render", root.display());
                Ok(Vec::new())
            }
            TemplateSource::Directory(root) => {
                let ignored = parse_ignore_file(root)?;
                enumerate_entries(root, &ignored)
            }
            TemplateSource::Builtin => Ok(builtin_entries()),
        }
    }

    /// Renders every template entry and writes it under the project root,
    /// overwriting existing files.
    ///
    /// A missing template directory only produces a warning. Every override
    /// key must name an entry, checked before anything is written. The first
    /// entry that fails to render aborts the pass; files already written stay
    /// on disk.
    ///
    /// # Errors
    /// * `Error::UnmatchedOverride` for variables no template would receive
    /// * `Error::TemplateRenderError` naming the template path
    /// * `Error::IoError`, `Error::WalkError`, `Error::IgnoreError` for file system problems
    pub fn process(&self, global: &Context, overrides: &Overrides) -> Result<()> {
        let entries = self.entries()?;
        check_overrides(&entries, overrides)?;
        debug!("Rendering {} templates from {}", entries.len(), self.source);

        for entry in &entries {
            self.process_entry(entry, global, overrides)?;
        }
        Ok(())
    }

    fn process_entry(
        &self,
        entry: &TemplateEntry,
        global: &Context,
        overrides: &Overrides,
    ) -> Result<()> {
        let scope = scope_for(global, overrides, entry);
        let content = self.renderer.render(entry.content(), &scope).map_err(|e| {
            let message = match e {
                Error::MinijinjaError(inner) => inner.to_string(),
                other => other.to_string(),
            };
            Error::TemplateRenderError { path: entry.template_key(), message }
        })?;

        let target = self.project_root.join(entry.destination_path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(Error::IoError)?;
        }
        fs::write(&target, content).map_err(Error::IoError)?;
        debug!("Writing file: {}", target.display());
        Ok(())
    }
}

/// Renders the templates of `source` into `project_root`.
pub fn render_templates(
    renderer: &dyn TemplateRenderer,
    project_root: &Path,
    source: &TemplateSource,
    global: &Context,
    overrides: &Overrides,
) -> Result<()> {
    Processor::new(renderer, source, project_root).process(global, overrides)
}
