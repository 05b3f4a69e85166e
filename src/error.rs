//! Error handling for kiln.
//! Defines the error taxonomy shared by the process runner, the template renderer
//! and the pipeline orchestrator.

use std::io;
use thiserror::Error;

use crate::pipeline::Phase;

/// Custom error types for kiln operations.
///
/// Fatal variants abort the pipeline at the first failing required step.
/// `BestEffortFailure` only ever reaches the log.
#[derive(Error, Debug)]
pub enum Error {
    /// The external tool could not be located or started.
    #[error("Failed to start '{command}': {source}.")]
    SpawnError {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A required command exited unsuccessfully.
    #[error(
        "Command '{command}' failed with {}.{}",
        describe_exit(.code),
        describe_stderr(.stderr)
    )]
    CommandFailed { command: String, code: Option<i32>, stderr: String },

    /// The expected value was not found in a tool's output.
    #[error("Could not find the expected value in the output of '{tool}'.")]
    ExtractionFailed { tool: String },

    /// The text-substitution engine rejected a template.
    #[error("Failed to render template '{path}': {message}.")]
    TemplateRenderError { path: String, message: String },

    /// Variables were registered for a file no template renders.
    #[error("No template renders '{key}', the variables registered for it would be lost.")]
    UnmatchedOverride { key: String },

    /// A step marked best-effort failed; logged and never propagated.
    #[error("Step '{label}' failed and was skipped: {source}")]
    BestEffortFailure {
        label: String,
        #[source]
        source: Box<Error>,
    },

    /// The first fatal failure of a pipeline run.
    #[error("{phase} failed: {source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Errors raised while walking the template directory
    #[error("Failed to walk template directory: {0}.")]
    WalkError(#[from] walkdir::Error),

    #[error("Template engine error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    /// Represents errors that occur during configuration parsing or processing
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// Represents errors in processing .kilnignore files
    #[error("Ignore file error: {0}.")]
    IgnoreError(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" {stderr}")
    }
}

/// Convenience type alias for Results with kiln's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
