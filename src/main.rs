//! kiln's main application entry point.
//! Parses the command line, resolves the configuration and hands the planned
//! steps to the pipeline.

use kiln::{
    cli::{get_args, Args, Commands, CreateArgs},
    config::get_config,
    env::Environment,
    error::{default_error_handler, Error, Result},
    logger::init_logger,
    pipeline::{global_data, plan, Pipeline, Request},
    process::SystemRunner,
    renderer::MiniJinjaRenderer,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Create(create) => create_project(create),
    }
}

/// Runs the full pipeline for `kiln create`.
///
/// # Flow
/// 1. Resolves the configuration relative to the current directory
/// 2. Plans the steps (dev checkouts get no commit phase)
/// 3. Executes them, stopping at the first required failure
fn create_project(args: CreateArgs) -> Result<()> {
    let env = Environment::from_process();
    let invocation_dir = std::env::current_dir().map_err(Error::IoError)?;
    let loaded = get_config(args.config.as_deref(), &invocation_dir)?;

    let request = Request {
        app_name: args.name,
        invocation_dir,
        passthrough: args.passthrough,
        templates_dir: args.templates,
        launch_editor: !args.no_editor,
    };

    let runner = SystemRunner::new(env.clone());
    let renderer = MiniJinjaRenderer::new();
    let pipeline = Pipeline::new(
        &runner,
        &renderer,
        global_data(&loaded.config, &request),
        plan(&loaded, &request, &env),
    );

    pipeline.run().into_result()?;

    println!(
        "Application '{}' created successfully in {}.",
        request.app_name,
        request.project_root().display()
    );
    Ok(())
}
