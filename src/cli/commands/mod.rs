//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT move branches directly.
//!
//! # Async Commands
//!
//! `commit` and `get` talk to the store, so they build a tokio runtime and
//! `block_on` the engine call from the sync dispatch.

mod commit;
mod completion;
mod get;

pub use commit::commit;
pub use completion::completion;
pub use get::get;

use anyhow::Result;

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::core::types::BranchName;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Commit {
            message,
            branch,
            add,
            add_exec,
            force,
            deadline_secs,
        } => commit::commit(
            config,
            &message,
            branch.as_deref(),
            &add,
            &add_exec,
            force,
            deadline_secs,
        ),
        Command::Get {
            path,
            branch,
            output,
        } => get::get(config, &path, branch.as_deref(), output.as_deref()),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// The named branch, or the configured default.
fn resolve_branch(config: &Config, branch: Option<&str>) -> Result<BranchName> {
    match branch {
        Some(name) => Ok(BranchName::new(name)?),
        None => Ok(config.default_branch()?),
    }
}
