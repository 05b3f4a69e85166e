use std::path::Path;

use crate::config::EditorConfig;
use crate::env::HostOs;
use crate::process::CommandSpec;

/// Builds the command opening the generated project in an editor.
///
/// A configured command replaces the platform default; the project root is
/// always the last argument.
pub fn editor_command(os: HostOs, config: &EditorConfig, project_root: &Path) -> CommandSpec {
    let root = project_root.display().to_string();
    let command = match (&config.command, os) {
        (Some(command), _) => CommandSpec::new(command).args(config.args.iter().cloned()),
        (None, HostOs::MacOs) => CommandSpec::new("open").args(["-a", "Visual Studio Code"]),
        (None, HostOs::Windows) => CommandSpec::new("cmd").args(["/C", "code"]),
        (None, HostOs::Linux) => CommandSpec::new("code"),
    };
    command.arg(root).current_dir(project_root)
}
