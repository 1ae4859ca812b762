//! cli::commands::commit
//!
//! Commit local files to a branch as one atomic commit.
//!
//! # Example
//!
//! ```bash
//! ghcommit commit -m "Add post" --add posts/1.md=out/1.md --add index.md=out/index.md
//! ```
//!
//! On success the new commit id is printed on stdout. An empty change set
//! is reported and exits successfully; a conflict exits with an error and
//! leaves the branch untouched.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use super::resolve_branch;
use crate::cli::args::FileMapping;
use crate::core::config::Config;
use crate::core::types::{CommitRequest, FileChange};
use crate::engine::CommitEngine;
use crate::store::github::GitHubStore;
use crate::store::StoreError;

/// Run the commit command.
pub fn commit(
    config: &Config,
    message: &str,
    branch: Option<&str>,
    add: &[FileMapping],
    add_exec: &[FileMapping],
    force: bool,
    deadline_secs: Option<u64>,
) -> Result<()> {
    let branch = resolve_branch(config, branch)?;
    let changes = read_changes(add, add_exec)?;

    let mut request = CommitRequest::new(branch.clone(), message)
        .changes(changes)
        .force(force);
    if let Some(secs) = deadline_secs {
        request = request.deadline(deadline_after(secs)?);
    }

    let store = GitHubStore::from_config(config)?;
    let engine = CommitEngine::new(Arc::new(store));

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(engine.commit(&request)) {
        Ok(sha) => {
            println!("{}", sha);
            Ok(())
        }
        Err(err) if err.is_no_op() => {
            eprintln!("Nothing to commit.");
            Ok(())
        }
        Err(err @ StoreError::Conflict { .. }) => bail!(
            "{}\nBranch '{}' moved while committing. Re-run to commit against the new head.",
            err,
            branch
        ),
        Err(err) => Err(err).with_context(|| format!("failed to commit to '{}'", branch)),
    }
}

/// The instant `secs` seconds from now.
fn deadline_after(secs: u64) -> Result<Instant> {
    match Instant::now().checked_add(Duration::from_secs(secs)) {
        Some(at) => Ok(at),
        None => bail!("--deadline-secs {} is too large", secs),
    }
}

/// Read every mapped local file into a change.
fn read_changes(add: &[FileMapping], add_exec: &[FileMapping]) -> Result<Vec<FileChange>> {
    let regular = add.iter().map(|m| (m, false));
    let executable = add_exec.iter().map(|m| (m, true));

    regular
        .chain(executable)
        .map(|(mapping, exec)| {
            let content = fs::read_to_string(&mapping.local).with_context(|| {
                format!(
                    "failed to read '{}' (only UTF-8 text files can be committed)",
                    mapping.local.display()
                )
            })?;
            Ok(FileChange {
                path: mapping.repo_path.clone(),
                content,
                executable: exec,
            })
        })
        .collect()
}
