//! cli::commands::get
//!
//! Print a file from the head of a branch.
//!
//! Content is written as raw bytes, so binary files survive redirection.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::resolve_branch;
use crate::core::config::Config;
use crate::engine::CommitEngine;
use crate::store::github::GitHubStore;

/// Run the get command.
pub fn get(config: &Config, path: &str, branch: Option<&str>, output: Option<&Path>) -> Result<()> {
    let branch = resolve_branch(config, branch)?;
    let store = GitHubStore::from_config(config)?;
    let engine = CommitEngine::new(Arc::new(store));

    let rt = tokio::runtime::Runtime::new()?;
    let content = rt
        .block_on(engine.get_file(&branch, path))
        .with_context(|| format!("failed to read '{}' from '{}'", path, branch))?;

    match output {
        Some(file) => fs::write(file, content.as_bytes())
            .with_context(|| format!("failed to write '{}'", file.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
