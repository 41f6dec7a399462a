//! Mivida CLI - command-line surface over the vault
//!
//! Each invocation opens the JSON-file store, runs one command and exits.
//! The sealing key only lives for the duration of the process, so commands
//! that read sealed secrets take the PIN from `--pin` or `$MIVIDA_PIN`.

pub mod commands;
pub mod config;

pub use commands::{run, Cli, Commands, PolicyCommands};
pub use config::CliConfig;
