//! Configuration handling for kiln.
//! This module discovers and parses the pipeline configuration: which tools
//! run in which phase, where the templates live and which value is
//! harvested from the provisioning tool.

use crate::constants::{CONFIG_FILES, DEFAULT_COMMIT_MESSAGE};
use crate::error::{Error, Result};
use crate::template::TemplateSource;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Built-in pipeline used when no configuration file is found.
pub const DEFAULT_CONFIG: &str = r#"
preflight:
  - label: Checking Node.js
    command: node
    args: ["--version"]
  - label: Checking npm
    command: npm
    args: ["--version"]
scaffold:
  label: Creating Next.js application
  command: npx
  args: ["create-next-app@latest"]
install:
  - label: Installing shadcn/ui
    command: npx
    args: ["shadcn@latest", "init", "--defaults"]
  - label: Installing Prisma and Better Auth
    command: npm
    args: ["install", "prisma", "@prisma/client", "better-auth"]
init:
  - label: Initializing Prisma
    command: npx
    args: ["prisma", "init"]
harvest:
  label: Provisioning Postgres database
  command: npx
  args: ["create-db@latest"]
  prefix: "postgresql://"
  target: ".env"
  variable: database_url
post_process:
  - label: Generating auth schema
    command: npx
    args: ["@better-auth/cli@latest", "generate", "--yes"]
  - label: Generating Prisma client
    command: npx
    args: ["prisma", "generate"]
  - label: Pushing database schema
    command: npx
    args: ["prisma", "db", "push"]
commit:
  message: "Initial commit from kiln"
"#;

/// One external command of the pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandConfig {
    /// Progress label; defaults to the command line
    #[serde(default)]
    pub label: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for this command
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// Written to the command's stdin, which is then closed
    #[serde(default)]
    pub stdin: Option<String>,
}

/// Provisioning command whose output carries a required value.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HarvestConfig {
    #[serde(flatten)]
    pub command: CommandConfig,
    /// Scheme prefix of the token to recover, e.g. `postgresql://`
    pub prefix: String,
    /// Destination-relative path of the file that embeds the value
    pub target: String,
    /// Variable name under which the value is exposed to `target`
    pub variable: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommitConfig {
    #[serde(default = "default_commit_message")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EditorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Replaces the platform default editor command
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { enabled: true, command: None, args: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Template tree relative to the configuration file; the built-in
    /// templates are used when unset
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    #[serde(default)]
    pub preflight: Vec<CommandConfig>,
    pub scaffold: CommandConfig,
    #[serde(default)]
    pub install: Vec<CommandConfig>,
    #[serde(default)]
    pub init: Vec<CommandConfig>,
    #[serde(default)]
    pub harvest: Option<HarvestConfig>,
    #[serde(default)]
    pub post_process: Vec<CommandConfig>,
    #[serde(default)]
    pub commit: Option<CommitConfig>,
    #[serde(default)]
    pub editor: EditorConfig,
    /// Additional global template data
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_true() -> bool {
    true
}

/// Parses the configuration content, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::ConfigError` if the content is neither valid JSON nor valid YAML
///   for the configuration schema
pub fn parse_config(content: &str) -> Result<Config> {
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {e}"))),
    }
}

/// Returns the first of `config_files` that exists in `dir`.
pub fn find_config<P: AsRef<Path>>(dir: P, config_files: &[&str]) -> Option<PathBuf> {
    config_files.iter().map(|file| dir.as_ref().join(file)).find(|path| path.is_file())
}

/// Configuration together with the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    /// Where templates are read from, honouring an explicit override.
    pub fn template_source(&self, override_dir: Option<&Path>) -> TemplateSource {
        match (override_dir, &self.config.templates_dir) {
            (Some(dir), _) => TemplateSource::Directory(dir.to_path_buf()),
            (None, Some(dir)) => TemplateSource::Directory(self.base_dir.join(dir)),
            (None, None) => TemplateSource::Builtin,
        }
    }
}

/// Resolves the configuration for a run.
///
/// An explicit path must exist. Without one, `search_dir` is searched for
/// `kiln.json`, `kiln.yml` and `kiln.yaml`; when none exists the built-in
/// default applies with `search_dir` as its base directory.
pub fn get_config(explicit: Option<&Path>, search_dir: &Path) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(Error::ConfigError(format!(
                "Invalid configuration path: {}",
                path.display()
            )));
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config(search_dir, &CONFIG_FILES),
    };

    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(&path).map_err(Error::IoError)?;
            let base_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| search_dir.to_path_buf());
            Ok(LoadedConfig { config: parse_config(&content)?, base_dir })
        }
        None => {
            debug!(
                "No configuration file found (tried: {}), using defaults",
                CONFIG_FILES.join(", ")
            );
            Ok(LoadedConfig {
                config: parse_config(DEFAULT_CONFIG)?,
                base_dir: search_dir.to_path_buf(),
            })
        }
    }
}
