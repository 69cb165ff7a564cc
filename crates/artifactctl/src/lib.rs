//! artifactctl command-line interface.
//!
//! The binary is a thin wrapper around this library: argument parsing and
//! error rendering live in [`cli`], subcommands in [`commands`].

// The CLI prints progress and JSON envelopes directly.
#![allow(clippy::print_stdout, clippy::print_stderr)]

pub mod cli;
pub mod commands;
pub mod output;
pub mod tracing;
