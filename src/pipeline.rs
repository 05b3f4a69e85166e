//! Pipeline orchestration.
//!
//! A run is an ordered list of typed [`Step`]s, each tagged with the [`Phase`]
//! it belongs to and a [`FailurePolicy`]. [`plan`] builds that list from the
//! configuration; [`Pipeline::run`] executes it in order and stops at the first
//! required step that fails. Nothing already written to disk is rolled back.

use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{CommandConfig, Config, LoadedConfig};
use crate::devmode::is_dev_checkout;
use crate::editor::editor_command;
use crate::env::{Environment, HostOs};
use crate::error::{Error, Result};
use crate::extract::{extract_first, uri_with_prefix};
use crate::process::{CommandSpec, ProcessRunner};
use crate::processor::{render_templates, Context, Overrides};
use crate::renderer::TemplateRenderer;
use crate::template::TemplateSource;

/// Phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Preflight,
    PrimaryScaffold,
    DependencyInstall,
    ExternalInit,
    ValueHarvest,
    TemplateRender,
    PostProcess,
    VersionControlCommit,
    EditorLaunch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preflight => "Preflight",
            Phase::PrimaryScaffold => "PrimaryScaffold",
            Phase::DependencyInstall => "DependencyInstall",
            Phase::ExternalInit => "ExternalInit",
            Phase::ValueHarvest => "ValueHarvest",
            Phase::TemplateRender => "TemplateRender",
            Phase::PostProcess => "PostProcess",
            Phase::VersionControlCommit => "VersionControlCommit",
            Phase::EditorLaunch => "EditorLaunch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Failure aborts the run.
    Required,
    /// Failure is logged and the rest of the phase is skipped.
    BestEffort,
}

/// Where a command's stdout and stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Capture,
    Inherit,
}

/// Decides whether a token of captured output is the harvested value.
pub type TokenPredicate = Box<dyn Fn(&str) -> bool>;

pub enum Action {
    /// Run an external command.
    Run { command: CommandSpec, output: OutputMode },
    /// Run a command and register the first matching token of its output as
    /// `variable` for the file keyed by `target`.
    Harvest { command: CommandSpec, predicate: TokenPredicate, target: String, variable: String },
    /// Render the templates into the project root.
    Render { templates: TemplateSource, project_root: PathBuf },
}

pub struct Step {
    pub label: String,
    pub phase: Phase,
    pub policy: FailurePolicy,
    pub action: Action,
}

impl Step {
    pub fn required<S: Into<String>>(label: S, phase: Phase, action: Action) -> Self {
        Self { label: label.into(), phase, policy: FailurePolicy::Required, action }
    }

    pub fn best_effort<S: Into<String>>(label: S, phase: Phase, action: Action) -> Self {
        Self { label: label.into(), phase, policy: FailurePolicy::BestEffort, action }
    }

    /// The command this step runs, if any.
    pub fn command(&self) -> Option<&CommandSpec> {
        match &self.action {
            Action::Run { command, .. } | Action::Harvest { command, .. } => Some(command),
            Action::Render { .. } => None,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum Outcome {
    Done,
    Failed { phase: Phase, error: Error },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Outcome::Done => Ok(()),
            Outcome::Failed { phase, error } => {
                Err(Error::PhaseFailed { phase, source: Box::new(error) })
            }
        }
    }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct Request {
    pub app_name: String,
    /// Directory the scaffolder runs in; the project is created inside it.
    pub invocation_dir: PathBuf,
    /// Arguments forwarded to the scaffold command after the name.
    pub passthrough: Vec<String>,
    pub templates_dir: Option<PathBuf>,
    pub launch_editor: bool,
}

impl Request {
    pub fn project_root(&self) -> PathBuf {
        self.invocation_dir.join(&self.app_name)
    }
}

/// Starts `program` the way the host resolves it. On Windows it goes through
/// `cmd /C`, since `npm` and `npx` are `.cmd` shims that are only found by
/// the shell.
pub fn host_command(os: HostOs, program: &str) -> CommandSpec {
    match os {
        HostOs::Windows => CommandSpec::new("cmd").args(["/C", program]),
        HostOs::MacOs | HostOs::Linux => CommandSpec::new(program),
    }
}

fn command_for(config: &CommandConfig, dir: &Path, os: HostOs) -> CommandSpec {
    let command =
        host_command(os, &config.command).args(&config.args).envs(&config.env).current_dir(dir);
    match &config.stdin {
        Some(payload) => command.stdin(payload),
        None => command,
    }
}

fn label_for(config: &CommandConfig) -> String {
    match &config.label {
        Some(label) => label.clone(),
        None => CommandSpec::new(&config.command).args(&config.args).to_string(),
    }
}

/// Global template data: configured `data` plus `app_name` and `project_dir`.
pub fn global_data(config: &Config, request: &Request) -> Context {
    let mut global = config.data.clone();
    global.insert("app_name".to_string(), Value::String(request.app_name.clone()));
    global.insert(
        "project_dir".to_string(),
        Value::String(request.project_root().display().to_string()),
    );
    global
}

/// Builds the ordered step list of a run.
pub fn plan(loaded: &LoadedConfig, request: &Request, env: &Environment) -> Vec<Step> {
    let config = &loaded.config;
    let project_root = request.project_root();
    let os = env.os();
    let mut steps = Vec::new();

    for probe in &config.preflight {
        let command = command_for(probe, &request.invocation_dir, os);
        steps.push(Step::required(
            label_for(probe),
            Phase::Preflight,
            Action::Run { command, output: OutputMode::Capture },
        ));
    }

    let scaffold = command_for(&config.scaffold, &request.invocation_dir, os)
        .arg(&request.app_name)
        .args(&request.passthrough);
    steps.push(Step::required(
        label_for(&config.scaffold),
        Phase::PrimaryScaffold,
        Action::Run { command: scaffold, output: OutputMode::Inherit },
    ));

    let dependent =
        [(Phase::DependencyInstall, &config.install), (Phase::ExternalInit, &config.init)];
    for (phase, commands) in dependent {
        for entry in commands {
            let command = command_for(entry, &project_root, os);
            steps.push(Step::required(
                label_for(entry),
                phase,
                Action::Run { command, output: OutputMode::Inherit },
            ));
        }
    }

    if let Some(harvest) = &config.harvest {
        // The exit code is not trusted; only the presence of the value counts.
        let command =
            command_for(&harvest.command, &project_root, os).allow_non_zero_exit(true);
        let prefix = harvest.prefix.clone();
        steps.push(Step::required(
            label_for(&harvest.command),
            Phase::ValueHarvest,
            Action::Harvest {
                command,
                predicate: Box::new(move |token: &str| uri_with_prefix(&prefix)(token)),
                target: harvest.target.clone(),
                variable: harvest.variable.clone(),
            },
        ));
    }

    steps.push(Step::required(
        "Rendering templates",
        Phase::TemplateRender,
        Action::Render {
            templates: loaded.template_source(request.templates_dir.as_deref()),
            project_root: project_root.clone(),
        },
    ));

    for entry in &config.post_process {
        let command = command_for(entry, &project_root, os);
        steps.push(Step::required(
            label_for(entry),
            Phase::PostProcess,
            Action::Run { command, output: OutputMode::Inherit },
        ));
    }

    if let Some(commit) = &config.commit {
        if is_dev_checkout(env) {
            info!("Running from a development checkout, skipping the initial commit");
        } else {
            let git = |args: &[&str]| {
                CommandSpec::new("git").args(args.iter().copied()).current_dir(&project_root)
            };
            let commands = [
                ("Initializing git repository", git(&["init"])),
                ("Staging files", git(&["add", "-A"])),
                ("Creating initial commit", git(&["commit", "-m"]).arg(&commit.message)),
            ];
            for (label, command) in commands {
                steps.push(Step::best_effort(
                    label,
                    Phase::VersionControlCommit,
                    Action::Run { command, output: OutputMode::Capture },
                ));
            }
        }
    }

    if request.launch_editor && config.editor.enabled {
        let command = editor_command(os, &config.editor, &project_root);
        steps.push(Step::best_effort(
            "Opening editor",
            Phase::EditorLaunch,
            Action::Run { command, output: OutputMode::Capture },
        ));
    }

    steps
}

pub struct Pipeline<'a> {
    runner: &'a dyn ProcessRunner,
    renderer: &'a dyn TemplateRenderer,
    global: Context,
    steps: Vec<Step>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        renderer: &'a dyn TemplateRenderer,
        global: Context,
        steps: Vec<Step>,
    ) -> Self {
        Self { runner, renderer, global, steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Executes the steps in order.
    ///
    /// Returns `Outcome::Failed` for the first required step that fails; no
    /// later step runs. Best-effort failures are logged as warnings and skip
    /// only the remaining steps of their own phase.
    pub fn run(&self) -> Outcome {
        let mut overrides = Overrides::new();
        let mut abandoned: Option<Phase> = None;
        let total = self.steps.len();

        for (index, step) in self.steps.iter().enumerate() {
            if abandoned == Some(step.phase) {
                debug!("Skipping '{}' after an earlier failure in {}", step.label, step.phase);
                continue;
            }

            println!("[{}/{}] {}", index + 1, total, step.label);
            if let Err(error) = self.execute(step, &mut overrides) {
                match step.policy {
                    FailurePolicy::Required => return Outcome::Failed { phase: step.phase, error },
                    FailurePolicy::BestEffort => {
                        let failure = Error::BestEffortFailure {
                            label: step.label.clone(),
                            source: Box::new(error),
                        };
                        warn!("{failure}");
                        abandoned = Some(step.phase);
                    }
                }
            }
        }

        Outcome::Done
    }

    fn execute(&self, step: &Step, overrides: &mut Overrides) -> Result<()> {
        match &step.action {
            Action::Run { command, output: OutputMode::Capture } => {
                let output = self.runner.run(command)?;
                if !output.stdout.trim().is_empty() {
                    debug!("{}: {}", command, output.stdout.trim());
                }
                Ok(())
            }
            Action::Run { command, output: OutputMode::Inherit } => {
                self.runner.run_inherit(command)?;
                Ok(())
            }
            Action::Harvest { command, predicate, target, variable } => {
                let output = self.runner.run(command)?;
                if !output.success() {
                    warn!(
                        "'{}' exited with {:?}, looking for {} anyway",
                        command, output.exit_code, variable
                    );
                }

                let text = format!("{}\n{}", output.stdout, output.stderr);
                let value = extract_first(&text, |token: &str| predicate(token))
                    .ok_or_else(|| Error::ExtractionFailed { tool: command.to_string() })?;

                overrides
                    .entry(target.clone())
                    .or_default()
                    .insert(variable.clone(), Value::String(value.to_string()));
                debug!("Harvested '{variable}' for {target}");
                Ok(())
            }
            Action::Render { templates, project_root } => render_templates(
                self.renderer,
                project_root,
                templates,
                &self.global,
                overrides,
            ),
        }
    }
}
