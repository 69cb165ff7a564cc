use artifactctl_oci::ErrorKind;
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI usage or validation error exit code
pub const EXIT_CLI: i32 = 2;
/// Registry, verification or extraction error exit code
pub const EXIT_PULL: i32 = 3;
/// Exit code for SIGINT (128 + signal number 2)
pub const EXIT_SIGINT: i32 = 130;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI usage or validation error (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(artifactctl::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Pull failure (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(artifactctl::cli::pull))]
    Pull {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Interrupted by the user (exit code 130)
    #[error("Interrupted")]
    #[diagnostic(code(artifactctl::cli::interrupted))]
    Interrupted,
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new pull error
    #[must_use]
    pub fn pull(message: impl Into<String>) -> Self {
        Self::Pull {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new pull error with help text
    #[must_use]
    pub fn pull_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Pull {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Convert `artifactctl_oci::Error` to the appropriate `CliError` variant.
///
/// Reference and destination problems are usage errors (exit code 2);
/// everything that happens once the registry is involved is a pull error
/// (exit code 3).
impl From<artifactctl_oci::Error> for CliError {
    fn from(err: artifactctl_oci::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::InvalidReference => Self::config_with_help(
                message,
                "Artifact URLs look like oci://ghcr.io/org/repo:tag",
            ),
            ErrorKind::InvalidDestination => Self::config_with_help(
                message,
                "The output directory must already exist; it is never created",
            ),
            ErrorKind::AuthenticationFailure => Self::pull_with_help(
                message,
                "Run 'docker login <registry>' or pass --creds <user:password>",
            ),
            ErrorKind::ResolutionFailure => {
                Self::pull_with_help(message, "Check that the repository and tag exist")
            }
            ErrorKind::FetchFailure => Self::pull(message),
            ErrorKind::DigestMismatch => Self::pull_with_help(
                message,
                "The registry served content that does not match its manifest",
            ),
            ErrorKind::ExtractionFailure => {
                Self::pull_with_help(message, "Check that the output directory is writable")
            }
            ErrorKind::DeadlineExceeded => {
                Self::pull_with_help(message, "Increase the limit with --timeout")
            }
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Pull { .. } => EXIT_PULL,
        CliError::Interrupted => EXIT_SIGINT,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Pull { .. } => "pull",
                CliError::Interrupted => "interrupted",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        // Use miette for human-friendly error display
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        // Ensure output is flushed before potential process exit
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Main CLI entry point for artifactctl.
///
/// Pulls OCI artifacts and extracts their content to local directories.
#[derive(Parser, Debug)]
#[command(name = "artifactctl")]
#[command(about = "Pull OCI artifacts and extract their content to local directories")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    /// Emit JSON envelope instead of progress lines.
    #[arg(long, global = true, help = "Emit JSON envelope instead of progress lines")]
    pub json: bool,

    /// Upper bound for the whole operation.
    #[arg(
        long,
        global = true,
        env = "ARTIFACTCTL_TIMEOUT",
        help = "Timeout for the operation (e.g. 60s, 5m)",
        default_value = "5m",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information.
    #[command(about = "Show version information")]
    Version,
    /// Pull content from a registry.
    #[command(about = "Pull content from a registry")]
    Pull {
        /// Pull subcommand to execute.
        #[command(subcommand)]
        subcommand: PullCommands,
    },
}

/// Pull subcommands.
#[derive(Subcommand, Debug)]
pub enum PullCommands {
    /// Download an OCI artifact and extract its content.
    #[command(
        about = "Pull artifact",
        long_about = "The pull artifact command downloads and extracts the OCI artifact content to the given path.\n\
                      The pull command uses the credentials from '~/.docker/config.json'.",
        after_help = "Examples:\n  # Pull an OCI artifact from GHCR\n  artifactctl pull artifact oci://ghcr.io/org/manifests/app:v0.0.1 --output ./path/to/local/manifests"
    )]
    Artifact(PullArtifactArgs),
}

/// Arguments for `pull artifact`.
#[derive(Args, Debug, Clone)]
pub struct PullArtifactArgs {
    /// Artifact URL, e.g. `oci://ghcr.io/org/manifests/app:v0.0.1`.
    #[arg(value_name = "URL", help = "Artifact URL (oci://<host>/<repository>:<tag>)")]
    pub url: String,

    /// Directory the artifact content is extracted into.
    #[arg(
        long,
        short = 'o',
        value_name = "PATH",
        help = "Path where the artifact content should be extracted"
    )]
    pub output: PathBuf,

    /// Credentials for the registry, replacing the docker config lookup.
    #[arg(
        long,
        value_name = "USER:PASSWORD",
        help = "Credentials for the registry in the format <username>[:<password>]; a bare value is used as a token"
    )]
    pub creds: Option<String>,

    /// Use plain HTTP to talk to the registry.
    #[arg(long, help = "Use plain HTTP instead of HTTPS (for local registries)")]
    pub insecure: bool,
}

/// Parse command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
