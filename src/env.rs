//! Explicit process environment.
//!
//! Components that would otherwise read ambient process state (environment
//! variables, the program's own location, the host platform) take an
//! [`Environment`] instead, so tests can hand them a synthetic one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Host operating system families that need different editor commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    MacOs,
    Windows,
    Linux,
}

impl HostOs {
    /// The platform this binary was compiled for. Every non-macOS,
    /// non-Windows target is treated as Linux.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else if cfg!(target_os = "windows") {
            HostOs::Windows
        } else {
            HostOs::Linux
        }
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    current_exe: Option<PathBuf>,
    os: HostOs,
}

impl Environment {
    /// Creates an empty environment for the current host.
    pub fn new() -> Self {
        Self { vars: BTreeMap::new(), current_exe: None, os: HostOs::current() }
    }

    /// Snapshots the running process. Variables whose name or value is not
    /// valid UTF-8 are left out.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars, current_exe: std::env::current_exe().ok(), os: HostOs::current() }
    }

    pub fn with_var<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_current_exe<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.current_exe = Some(path.into());
        self
    }

    pub fn with_os(mut self, os: HostOs) -> Self {
        self.os = os;
        self
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Path of the running program, if known.
    pub fn current_exe(&self) -> Option<&Path> {
        self.current_exe.as_deref()
    }

    pub fn os(&self) -> HostOs {
        self.os
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}
