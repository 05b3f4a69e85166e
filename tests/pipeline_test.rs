use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::Path;

use kiln::config::{parse_config, LoadedConfig, DEFAULT_CONFIG};
use kiln::constants::DEV_MODE_VAR;
use kiln::env::{Environment, HostOs};
use kiln::error::{Error, Result};
use kiln::pipeline::{
    global_data, plan, Action, FailurePolicy, Outcome, Phase, Pipeline, Request, Step,
};
use kiln::process::{check_exit, CommandOutput, CommandSpec, ProcessRunner};
use kiln::processor::Context;
use kiln::renderer::MiniJinjaRenderer;
use kiln::template::TemplateSource;
use tempfile::TempDir;

const CONFIG: &str = r#"
templates_dir: templates
preflight:
  - command: node
    args: ["--version"]
scaffold:
  command: npx
  args: ["create-next-app@latest"]
install:
  - command: npm
    args: ["install", "prisma"]
init:
  - label: Initializing Prisma
    command: npx
    args: ["prisma", "init"]
harvest:
  command: npx
  args: ["create-db@latest"]
  prefix: "postgresql://"
  target: ".env"
  variable: database_url
post_process:
  - command: npx
    args: ["prisma", "generate"]
commit:
  message: "Initial commit"
"#;

const PROVISION_OUTPUT: &str = "Creating db...\npostgresql://u:p@host:5432/db\nDone";

#[derive(Clone)]
enum Reply {
    Exit(i32, &'static str),
    Missing,
}

/// Records every command and answers from a script keyed by command line prefix.
struct MockRunner {
    replies: Vec<(&'static str, Reply)>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl MockRunner {
    fn new() -> Self {
        Self { replies: Vec::new(), calls: RefCell::new(Vec::new()) }
    }

    fn reply(mut self, prefix: &'static str, reply: Reply) -> Self {
        self.replies.push((prefix, reply));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|command| command.to_string()).collect()
    }

    fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|line| line.starts_with(prefix))
    }

    fn respond(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(command.clone());
        let line = command.to_string();
        let reply = self
            .replies
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Exit(0, ""));

        match reply {
            Reply::Missing => Err(Error::SpawnError {
                command: line,
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            }),
            Reply::Exit(code, stdout) => {
                let output = CommandOutput {
                    exit_code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                };
                check_exit(command, output)
            }
        }
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.respond(command)
    }

    fn run_inherit(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.respond(command)
            .map(|output| CommandOutput { exit_code: output.exit_code, ..CommandOutput::default() })
    }
}

struct Fixture {
    workspace: TempDir,
    loaded: LoadedConfig,
    request: Request,
}

impl Fixture {
    fn new() -> Self {
        let workspace = TempDir::new().unwrap();
        let templates = workspace.path().join("templates");
        fs::create_dir_all(templates.join("lib")).unwrap();
        fs::write(templates.join(".env.j2"), "DATABASE_URL=\"{{ database_url }}\"\n").unwrap();
        fs::write(templates.join("lib/app.ts.j2"), "export const name = \"{{ app_name }}\";\n")
            .unwrap();

        let loaded = LoadedConfig {
            config: parse_config(CONFIG).unwrap(),
            base_dir: workspace.path().to_path_buf(),
        };
        let request = Request {
            app_name: "shop".to_string(),
            invocation_dir: workspace.path().to_path_buf(),
            passthrough: vec!["--typescript".to_string()],
            templates_dir: None,
            launch_editor: true,
        };
        Self { workspace, loaded, request }
    }

    fn project(&self) -> std::path::PathBuf {
        self.workspace.path().join("shop")
    }

    fn run(&self, runner: &MockRunner, env: &Environment) -> Outcome {
        let renderer = MiniJinjaRenderer::new();
        let pipeline = Pipeline::new(
            runner,
            &renderer,
            global_data(&self.loaded.config, &self.request),
            plan(&self.loaded, &self.request, env),
        );
        pipeline.run()
    }
}

fn linux() -> Environment {
    Environment::new().with_os(HostOs::Linux)
}

#[test]
fn test_plan_orders_phases() {
    let fixture = Fixture::new();
    let steps = plan(&fixture.loaded, &fixture.request, &linux());

    let phases: Vec<Phase> = steps.iter().map(|step| step.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Preflight,
            Phase::PrimaryScaffold,
            Phase::DependencyInstall,
            Phase::ExternalInit,
            Phase::ValueHarvest,
            Phase::TemplateRender,
            Phase::PostProcess,
            Phase::VersionControlCommit,
            Phase::VersionControlCommit,
            Phase::VersionControlCommit,
            Phase::EditorLaunch,
        ]
    );

    let policies: Vec<FailurePolicy> = steps.iter().map(|step| step.policy).collect();
    assert!(policies[..7].iter().all(|policy| *policy == FailurePolicy::Required));
    assert!(policies[7..].iter().all(|policy| *policy == FailurePolicy::BestEffort));

    let scaffold = steps[1].command().unwrap();
    assert_eq!(scaffold.to_string(), "npx create-next-app@latest shop --typescript");
    assert_eq!(scaffold.options().working_dir.as_deref(), Some(fixture.workspace.path()));

    let install = steps[2].command().unwrap();
    assert_eq!(install.options().working_dir.as_deref(), Some(fixture.project().as_path()));
    assert_eq!(steps[3].label, "Initializing Prisma");
    assert_eq!(steps[2].label, "npm install prisma");

    let harvest = steps[4].command().unwrap();
    assert!(harvest.options().allow_non_zero_exit);

    let commit = steps[9].command().unwrap();
    assert_eq!(commit.to_string(), "git commit -m \"Initial commit\"");

    let editor = steps[10].command().unwrap();
    assert_eq!(editor.program(), "code");
}

#[test_log::test]
fn test_successful_run_renders_harvested_value() {
    let fixture = Fixture::new();
    let runner = MockRunner::new().reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT));

    let outcome = fixture.run(&runner, &linux());

    assert!(outcome.is_done());
    assert_eq!(
        fs::read_to_string(fixture.project().join(".env")).unwrap(),
        "DATABASE_URL=\"postgresql://u:p@host:5432/db\"\n"
    );
    assert_eq!(
        fs::read_to_string(fixture.project().join("lib/app.ts")).unwrap(),
        "export const name = \"shop\";\n"
    );
    assert_eq!(
        runner.calls(),
        vec![
            "node --version".to_string(),
            "npx create-next-app@latest shop --typescript".to_string(),
            "npm install prisma".to_string(),
            "npx prisma init".to_string(),
            "npx create-db@latest".to_string(),
            "npx prisma generate".to_string(),
            "git init".to_string(),
            "git add -A".to_string(),
            "git commit -m \"Initial commit\"".to_string(),
            format!("code {}", fixture.project().display()),
        ]
    );
}

#[test]
fn test_primary_scaffold_failure_short_circuits() {
    let fixture = Fixture::new();
    let runner = MockRunner::new()
        .reply("npx create-next-app", Reply::Exit(1, ""))
        .reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT));

    match fixture.run(&runner, &linux()) {
        Outcome::Failed { phase, error } => {
            assert_eq!(phase, Phase::PrimaryScaffold);
            assert!(matches!(error, Error::CommandFailed { code: Some(1), .. }));
        }
        Outcome::Done => panic!("Expected the scaffold phase to fail"),
    }
    assert_eq!(runner.calls().len(), 2);
    assert!(!fixture.project().exists());
}

#[test]
fn test_preflight_spawn_error_stops_before_mutation() {
    let fixture = Fixture::new();
    let runner = MockRunner::new().reply("node", Reply::Missing);

    let outcome = fixture.run(&runner, &linux());

    assert!(matches!(
        outcome,
        Outcome::Failed { phase: Phase::Preflight, error: Error::SpawnError { .. } }
    ));
    assert_eq!(runner.calls(), vec!["node --version".to_string()]);
}

#[test]
fn test_missing_value_is_extraction_failure() {
    let fixture = Fixture::new();
    let runner = MockRunner::new().reply("npx create-db", Reply::Exit(0, "Creating db...\nDone"));

    let outcome = fixture.run(&runner, &linux());

    match outcome {
        Outcome::Failed { phase, error: Error::ExtractionFailed { tool } } => {
            assert_eq!(phase, Phase::ValueHarvest);
            assert_eq!(tool, "npx create-db@latest");
        }
        other => panic!("Expected ExtractionFailed, got {other:?}"),
    }
    assert!(!runner.called("npx prisma generate"));
    assert!(!fixture.project().join(".env").exists());
}

#[test]
fn test_harvest_tolerates_non_zero_exit() {
    let fixture = Fixture::new();
    let runner =
        MockRunner::new().reply("npx create-db", Reply::Exit(2, "url: postgresql://u:p@h/db"));

    assert!(fixture.run(&runner, &linux()).is_done());
    assert_eq!(
        fs::read_to_string(fixture.project().join(".env")).unwrap(),
        "DATABASE_URL=\"postgresql://u:p@h/db\"\n"
    );
}

#[test_log::test]
fn test_commit_failure_is_best_effort() {
    let fixture = Fixture::new();
    let runner = MockRunner::new()
        .reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT))
        .reply("git add", Reply::Exit(128, ""));

    assert!(fixture.run(&runner, &linux()).is_done());
    assert!(runner.called("git init"));
    assert!(runner.called("git add -A"));
    assert!(!runner.called("git commit"));
    assert!(runner.called("code"));
}

#[test]
fn test_editor_failure_is_best_effort() {
    let fixture = Fixture::new();
    let runner = MockRunner::new()
        .reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT))
        .reply("code", Reply::Missing);

    let outcome = fixture.run(&runner, &linux());
    assert!(outcome.is_done());
    assert!(outcome.into_result().is_ok());
}

#[test]
fn test_dev_checkout_skips_commit() {
    let fixture = Fixture::new();
    let env = linux().with_var(DEV_MODE_VAR, "1");
    let runner = MockRunner::new().reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT));

    let steps = plan(&fixture.loaded, &fixture.request, &env);
    assert!(steps.iter().all(|step| step.phase != Phase::VersionControlCommit));

    assert!(fixture.run(&runner, &env).is_done());
    assert!(!runner.called("git"));
}

#[test]
fn test_editor_can_be_disabled() {
    let mut fixture = Fixture::new();
    fixture.request.launch_editor = false;

    let steps = plan(&fixture.loaded, &fixture.request, &linux());
    assert!(steps.iter().all(|step| step.phase != Phase::EditorLaunch));
}

#[test]
fn test_failed_outcome_into_result() {
    let fixture = Fixture::new();
    let runner = MockRunner::new().reply("npx create-next-app", Reply::Exit(1, ""));

    match fixture.run(&runner, &linux()).into_result() {
        Err(Error::PhaseFailed { phase, .. }) => assert_eq!(phase, Phase::PrimaryScaffold),
        other => panic!("Expected PhaseFailed, got {other:?}"),
    }
}

#[test]
fn test_hand_built_steps_with_injected_predicate() {
    let workspace = TempDir::new().unwrap();
    let templates = workspace.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("token.txt.j2"), "{{ token }}|{{ app_name }}").unwrap();
    let project = workspace.path().join("out");

    let runner =
        MockRunner::new().reply("issue-token", Reply::Exit(0, "your key: token=abc123 (keep it)"));
    let renderer = MiniJinjaRenderer::new();
    let mut global = Context::new();
    global.insert("app_name".to_string(), serde_json::json!("demo"));

    let steps = vec![
        Step::required(
            "Issuing token",
            Phase::ValueHarvest,
            Action::Harvest {
                command: CommandSpec::new("issue-token"),
                predicate: Box::new(|token: &str| token.starts_with("token=")),
                target: "token.txt.j2".to_string(),
                variable: "token".to_string(),
            },
        ),
        Step::required(
            "Rendering",
            Phase::TemplateRender,
            Action::Render { templates: templates.clone().into(), project_root: project.clone() },
        ),
    ];

    assert!(Pipeline::new(&runner, &renderer, global, steps).run().is_done());
    assert_eq!(
        fs::read_to_string(Path::new(&project).join("token.txt")).unwrap(),
        "token=abc123|demo"
    );
}

fn default_fixture() -> (TempDir, LoadedConfig, Request) {
    let workspace = TempDir::new().unwrap();
    let loaded = LoadedConfig {
        config: parse_config(DEFAULT_CONFIG).unwrap(),
        base_dir: workspace.path().to_path_buf(),
    };
    let request = Request {
        app_name: "shop".to_string(),
        invocation_dir: workspace.path().to_path_buf(),
        passthrough: Vec::new(),
        templates_dir: None,
        launch_editor: false,
    };
    (workspace, loaded, request)
}

#[test_log::test]
fn test_default_config_renders_harvested_url() {
    let (workspace, loaded, request) = default_fixture();
    let runner = MockRunner::new().reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT));
    let renderer = MiniJinjaRenderer::new();

    let steps = plan(&loaded, &request, &linux());
    let render = steps.iter().find(|step| step.phase == Phase::TemplateRender).unwrap();
    assert!(matches!(&render.action, Action::Render { templates: TemplateSource::Builtin, .. }));

    let global = global_data(&loaded.config, &request);
    assert!(Pipeline::new(&runner, &renderer, global, steps).run().is_done());

    let env = fs::read_to_string(workspace.path().join("shop/.env")).unwrap();
    assert!(env.contains("DATABASE_URL=\"postgresql://u:p@host:5432/db\""));
    assert!(workspace.path().join("shop/lib/auth.ts").exists());
    assert!(runner.called("npx prisma db push"));
}

#[test]
fn test_harvest_target_without_template_fails_render() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.workspace.path().join("templates/.env.j2")).unwrap();
    let runner = MockRunner::new().reply("npx create-db", Reply::Exit(0, PROVISION_OUTPUT));

    match fixture.run(&runner, &linux()) {
        Outcome::Failed { phase, error: Error::UnmatchedOverride { key } } => {
            assert_eq!(phase, Phase::TemplateRender);
            assert_eq!(key, ".env");
        }
        other => panic!("Expected UnmatchedOverride, got {other:?}"),
    }
    assert!(!runner.called("npx prisma generate"));
}

#[test]
fn test_windows_runs_tools_through_cmd() {
    let (workspace, loaded, mut request) = default_fixture();
    request.launch_editor = true;
    let windows = Environment::new().with_os(HostOs::Windows);

    let steps = plan(&loaded, &request, &windows);
    let lines: Vec<String> =
        steps.iter().filter_map(Step::command).map(|command| command.to_string()).collect();

    assert_eq!(lines[0], "cmd /C node --version");
    assert_eq!(lines[1], "cmd /C npm --version");
    assert_eq!(lines[2], "cmd /C npx create-next-app@latest shop");
    assert!(lines.contains(&"cmd /C npx create-db@latest".to_string()));
    assert!(lines.contains(&"git init".to_string()));
    assert_eq!(
        lines.last().unwrap(),
        &format!("cmd /C code {}", workspace.path().join("shop").display())
    );
    assert_eq!(steps[2].label, "Creating Next.js application");
}

#[test]
fn test_configured_stdin_reaches_command() {
    let workspace = TempDir::new().unwrap();
    let config = parse_config(
        "scaffold:\n  command: create-app\n  stdin: \"y\\n\"\ninit:\n  - command: setup\n",
    )
    .unwrap();
    let loaded = LoadedConfig { config, base_dir: workspace.path().to_path_buf() };
    let request = Request {
        app_name: "shop".to_string(),
        invocation_dir: workspace.path().to_path_buf(),
        passthrough: Vec::new(),
        templates_dir: None,
        launch_editor: false,
    };

    let steps = plan(&loaded, &request, &linux());

    assert_eq!(steps[0].command().unwrap().options().stdin.as_deref(), Some("y\n"));
    assert_eq!(steps[1].command().unwrap().options().stdin, None);
}
