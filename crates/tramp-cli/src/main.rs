mod commands;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tramp_core::services::{settings_loader, Orchestrator};

use crate::commands::Command;

#[derive(Debug, Parser)]
#[command(
    name = "trampoline",
    about = "Start, stop and track locally run Spring Boot services",
    long_about = None
)]
struct Cli {
    /// Settings folder; defaults to $TRAMPOLINE_HOME or ~/.trampoline.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log to trampoline.log in the settings folder instead of stderr.
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let folder = settings_loader::resolve_folder(cli.home);
    let settings = settings_loader::load(&folder)?;
    let _guard = setup_logging(&settings.log_path(), cli.log_file)?;
    tracing::debug!(folder = %settings.settings_folder.display(), "settings loaded");

    let orchestrator = Orchestrator::new(&settings)?;
    commands::run(&orchestrator, cli.command).await
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the tracing subscriber. The returned guard must be held for the
/// duration of the program when logging to a file.
fn setup_logging(
    log_path: &Path,
    to_file: bool,
) -> color_eyre::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if !to_file {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter())
            .init();
        return Ok(None);
    }

    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "trampoline.log".to_string());
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter())
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    use crate::commands::{GroupCommand, InstanceCommand};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn group_members_carry_delays() {
        let cli = Cli::try_parse_from([
            "trampoline",
            "group",
            "add",
            "--name",
            "backend",
            "--member",
            "orders",
            "--member",
            "billing:5",
        ])
        .unwrap();
        let Command::Group(GroupCommand::Add { name, members }) = cli.command else {
            panic!("expected group add");
        };
        assert_eq!(name, "backend");
        assert_eq!(members, vec![("orders".to_string(), 0), ("billing".to_string(), 5)]);
    }

    #[test]
    fn vm_arguments_may_start_with_a_dash() {
        let cli = Cli::try_parse_from([
            "trampoline",
            "--home",
            "/tmp/tramp",
            "instance",
            "start",
            "svc",
            "--port",
            "8081",
            "--vm-args",
            "-Xmx256m -Dspring.profiles.active=dev",
        ])
        .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/tramp")));
        let Command::Instance(InstanceCommand::Start { port, vm_args, .. }) = cli.command else {
            panic!("expected instance start");
        };
        assert_eq!(port, 8081);
        assert_eq!(vm_args, "-Xmx256m -Dspring.profiles.active=dev");
    }

    #[test]
    fn malformed_member_delay_is_rejected() {
        let result = Cli::try_parse_from([
            "trampoline", "group", "add", "--name", "g", "--member", "orders:soon",
        ]);
        assert!(result.is_err());
    }
}
