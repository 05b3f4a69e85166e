//! Common constants used throughout kiln.

/// Supported configuration file names
pub const CONFIG_FILES: [&str; 3] = ["kiln.json", "kiln.yml", "kiln.yaml"];

/// kiln's ignore file name, read from the template root
pub const IGNORE_FILE: &str = ".kilnignore";

/// Suffix marking a file in the template tree as a template
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// Patterns excluded from every render pass.
/// Files and directories starting with an underscore are partials.
pub const DEFAULT_IGNORE_PATTERNS: [&str; 2] = ["**/_*", "**/.DS_Store"];

/// Environment variable forcing development mode when set to a non-empty value
pub const DEV_MODE_VAR: &str = "KILN_DEV";

/// Marker file of a development checkout
pub const MANIFEST_FILE: &str = "Cargo.toml";

/// How many ancestors of the running executable are searched for a checkout
pub const DEV_SEARCH_DEPTH: usize = 4;

/// Default commit message for the generated project
pub const DEFAULT_COMMIT_MESSAGE: &str = "Initial commit from kiln";
