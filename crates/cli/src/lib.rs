pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "nestplan",
    about = "Nestplan operator CLI",
    long_about = "Operate Nestplan migrations, configuration inspection, readiness checks, \
                  and workflow thread status.",
    after_help = "Examples:\n  nestplan migrate\n  nestplan status <thread-id>\n  nestplan doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Show the checkpointed status of one workflow thread")]
    Status {
        #[arg(help = "Workflow thread id")]
        thread_id: String,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate configuration, API key presence, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::try_init();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Status { thread_id } => commands::status::run(&thread_id),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
