//! artifactctl CLI Application

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use artifactctl::cli::{
    self, Cli, CliError, Commands, EXIT_OK, PullCommands, exit_code_for, render_error,
};
use artifactctl::commands;
use artifactctl::tracing::{Level, TracingConfig, TracingFormat, init_tracing};
use tracing::instrument;

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    // Usage errors exit here with clap's own status (2).
    let cli = cli::parse();

    let exit_code = run_with_tokio(cli);
    std::process::exit(exit_code);
}

/// Create tokio runtime and run async path
fn run_with_tokio(cli: Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> i32 {
    let json_mode = cli.json;

    // Biased so an interrupt wins over a pull finishing at the same moment.
    // Dropping `real_main` cancels any in-flight extraction.
    tokio::select! {
        biased;

        _ = tokio::signal::ctrl_c() => {
            let err = CliError::Interrupted;
            render_error(&err, json_mode);
            exit_code_for(&err)
        }
        result = real_main(cli) => {
            match result {
                Ok(()) => EXIT_OK,
                Err(err) => {
                    render_error(&err, json_mode);
                    exit_code_for(&err)
                }
            }
        }
    }
}

#[instrument(name = "artifactctl_real_main", skip(cli))]
async fn real_main(cli: Cli) -> Result<(), CliError> {
    let level = Level::from(cli.level);
    init_tracing(TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level,
        ..Default::default()
    })
    .map_err(|e| CliError::config(e.to_string()))?;

    match cli.command {
        Commands::Version => {
            println!("{}", commands::version::get_version_info());
            Ok(())
        }
        Commands::Pull {
            subcommand: PullCommands::Artifact(args),
        } => commands::pull::execute_pull_artifact(&args, cli.timeout, cli.json).await,
    }
}
