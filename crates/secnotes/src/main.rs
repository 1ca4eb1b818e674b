mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libsecnotes_core::SecNotesError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = run_command(&cli);

    if let Err(e) = result {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_env("SECNOTES_LOG")
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_command(cli: &Cli) -> Result<(), SecNotesError> {
    match &cli.command {
        Command::Init {
            name,
            collab,
            database,
            project,
            force,
        } => commands::init::run(
            cli,
            commands::init::InitOptions {
                name: name.clone(),
                collab: *collab,
                database: database.clone(),
                project: project.clone(),
                force: *force,
            },
        ),
        Command::Note { cmd } => commands::note::run(cli, cmd.clone()),
        Command::Trail { cmd } => commands::trail::run(cli, cmd.clone()),
        Command::Import { file, tool } => commands::import::run(cli, file, tool),
        Command::Sync => commands::sync::run(cli),
        Command::Watch { interval } => commands::watch::run(cli, *interval),
    }
}
