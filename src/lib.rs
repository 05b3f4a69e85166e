//! kiln bootstraps a web application by chaining external scaffolding tools
//! and rendering a template tree over their result.

/// Command-line interface module for the kiln application
pub mod cli;

/// Pipeline configuration
/// Supports JSON and YAML formats (kiln.json, kiln.yml, kiln.yaml)
pub mod config;

pub mod constants;

/// Development checkout detection
pub mod devmode;

/// Platform-dependent editor launch command
pub mod editor;

/// Explicit process environment
pub mod env;

/// Error types and handling for the kiln application
pub mod error;

/// Extraction of values from free-form command output
pub mod extract;

/// File and directory ignore patterns
/// Processes .kilnignore files and the underscore partial convention
pub mod ignore;

pub mod logger;

/// Ordered, typed pipeline steps and their execution
pub mod pipeline;

/// External command execution
pub mod process;

/// Render pass writing the template tree into the project
pub mod processor;

/// Template rendering engine
pub mod renderer;

/// Template entry discovery
pub mod template;
