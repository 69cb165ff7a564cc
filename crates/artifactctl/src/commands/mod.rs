//! Subcommand implementations.

pub mod pull;
pub mod version;
