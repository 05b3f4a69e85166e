//! Execution of external tools.
//!
//! A [`ProcessRunner`] runs one command either with its output captured
//! ([`ProcessRunner::run`]) or attached to the caller's terminal
//! ([`ProcessRunner::run_inherit`]). Failure policy is resolved from the exit
//! code, with [`RunOptions::allow_non_zero_exit`] as a per-call override.

use indexmap::IndexMap;
use log::debug;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::env::Environment;
use crate::error::{Error, Result};

/// Per-call options recognised by the runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Defaults to the caller's current directory when unset.
    pub working_dir: Option<PathBuf>,
    /// Merged on top of the runner's environment, winning on collision.
    pub env: IndexMap<String, String>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    /// Report a non-zero exit in the result instead of failing.
    pub allow_non_zero_exit: bool,
}

/// A single external command: program, ordered arguments and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    options: RunOptions,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self { program: program.into(), args: Vec::new(), options: RunOptions::default() }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.options.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.options.env.insert(key.into(), value.into());
        }
        self
    }

    pub fn stdin<S: Into<String>>(mut self, payload: S) -> Self {
        self.options.stdin = Some(payload.into());
        self
    }

    pub fn allow_non_zero_exit(mut self, allow: bool) -> Self {
        self.options.allow_non_zero_exit = allow;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Absent when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Applies the failure policy of `command` to a finished process.
///
/// # Errors
/// * `Error::CommandFailed` if the process did not exit with 0 and the
///   command does not allow non-zero exits
pub fn check_exit(command: &CommandSpec, output: CommandOutput) -> Result<CommandOutput> {
    if output.success() || command.options.allow_non_zero_exit {
        return Ok(output);
    }
    Err(Error::CommandFailed {
        command: command.to_string(),
        code: output.exit_code,
        stderr: output.stderr,
    })
}

/// Seam between the orchestrator and the operating system.
pub trait ProcessRunner {
    /// Runs a command to completion, capturing stdout and stderr in full.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;

    /// Runs a command attached to the caller's terminal. The returned output
    /// carries only the exit code.
    fn run_inherit(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
///
/// The child sees exactly the variables of the runner's [`Environment`] plus
/// the per-call overrides.
pub struct SystemRunner {
    env: Environment,
}

impl SystemRunner {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    fn spawn(
        &self,
        spec: &CommandSpec,
        output: fn() -> Stdio,
        inherit_stdin: bool,
    ) -> Result<Child> {
        let stdin = if spec.options.stdin.is_some() {
            Stdio::piped()
        } else if inherit_stdin {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(self.env.vars())
            .envs(&spec.options.env)
            .stdin(stdin)
            .stdout(output())
            .stderr(output());
        if let Some(dir) = &spec.options.working_dir {
            command.current_dir(dir);
        }

        debug!(
            "Running '{}' in {}",
            spec,
            spec.options
                .working_dir
                .as_deref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        );

        command.spawn().map_err(|source| Error::SpawnError { command: spec.to_string(), source })
    }
}

// Writes the payload from a separate thread so a child filling its output
// pipes cannot block us while we are still writing its input.
fn feed_stdin(child: &mut Child, payload: Option<&str>) -> Option<JoinHandle<io::Result<()>>> {
    let payload = payload?.to_string();
    let mut stdin = child.stdin.take()?;
    Some(thread::spawn(move || stdin.write_all(payload.as_bytes())))
}

fn join_writer(writer: Option<JoinHandle<io::Result<()>>>) -> Result<()> {
    if let Some(Ok(Err(err))) = writer.map(JoinHandle::join) {
        // The child may legitimately exit without reading its input.
        if err.kind() != io::ErrorKind::BrokenPipe {
            return Err(Error::IoError(err));
        }
    }
    Ok(())
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let mut child = self.spawn(command, Stdio::piped, false)?;
        let writer = feed_stdin(&mut child, command.options.stdin.as_deref());
        let output = child.wait_with_output().map_err(Error::IoError)?;
        join_writer(writer)?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("'{}' exited with {:?}", command, result.exit_code);
        check_exit(command, result)
    }

    fn run_inherit(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let mut child = self.spawn(command, Stdio::inherit, true)?;
        let writer = feed_stdin(&mut child, command.options.stdin.as_deref());
        let status = child.wait().map_err(Error::IoError)?;
        join_writer(writer)?;

        let result = CommandOutput { exit_code: status.code(), ..CommandOutput::default() };
        debug!("'{}' exited with {:?}", command, result.exit_code);
        check_exit(command, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_spaced_args() {
        let command = CommandSpec::new("git").args(["commit", "-m", "Initial commit"]);
        assert_eq!(command.to_string(), "git commit -m \"Initial commit\"");
    }

    #[test]
    fn test_check_exit_policy() {
        let command = CommandSpec::new("false");
        let failed = CommandOutput { exit_code: Some(3), ..CommandOutput::default() };

        match check_exit(&command, failed.clone()) {
            Err(Error::CommandFailed { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("Expected CommandFailed, got {other:?}"),
        }

        let tolerant = command.allow_non_zero_exit(true);
        assert_eq!(check_exit(&tolerant, failed.clone()).unwrap(), failed);
    }
}
