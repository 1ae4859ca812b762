//! engine::tree
//!
//! Builds the new tree for a commit in a single store request.
//!
//! # Invariants
//!
//! - A change set is validated completely before any network call
//! - All changes are layered onto the base tree by one `create_tree` call,
//!   so no intermediate tree is ever observable
//! - Directories are never created explicitly; they are implied by paths

use std::collections::BTreeSet;

use tracing::debug;

use super::Deadline;
use crate::core::types::{validate_repo_path, FileChange, FileMode, NewTreeEntry, Oid};
use crate::store::{StoreError, VersionStore};

/// Turns file changes into a tree layered onto a base tree.
pub struct TreeBuilder<'a> {
    store: &'a dyn VersionStore,
    deadline: Deadline,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a dyn VersionStore) -> Self {
        Self {
            store,
            deadline: Deadline::none(),
        }
    }

    /// Abort before the store call once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Validate `changes` and map them to tree entries.
    ///
    /// # Errors
    ///
    /// - `NothingToCommit` if `changes` is empty
    /// - `Validation` if a path is malformed, repeated, or used as both a
    ///   file and a directory
    pub fn prepare(changes: &[FileChange]) -> Result<Vec<NewTreeEntry>, StoreError> {
        if changes.is_empty() {
            return Err(StoreError::NothingToCommit);
        }

        let mut seen = BTreeSet::new();
        for change in changes {
            validate_repo_path(&change.path)?;
            if !seen.insert(change.path.as_str()) {
                return Err(StoreError::Validation(format!(
                    "duplicate path in change set: '{}'",
                    change.path
                )));
            }
        }
        for path in &seen {
            if let Some(dir) = ancestors(path).find(|dir| seen.contains(dir)) {
                return Err(StoreError::Validation(format!(
                    "'{}' is both a file and a directory in the change set",
                    dir
                )));
            }
        }

        Ok(changes
            .iter()
            .map(|change| NewTreeEntry {
                path: change.path.clone(),
                mode: FileMode::for_file(change.executable),
                content: change.content.clone(),
            })
            .collect())
    }

    /// Validate `changes` and create the layered tree.
    pub async fn build(&self, base_tree: &Oid, changes: &[FileChange]) -> Result<Oid, StoreError> {
        let entries = Self::prepare(changes)?;
        self.submit(base_tree, &entries).await
    }

    /// Create a tree from already-prepared entries.
    pub async fn submit(
        &self,
        base_tree: &Oid,
        entries: &[NewTreeEntry],
    ) -> Result<Oid, StoreError> {
        self.deadline.check("create_tree")?;
        let tree = self.store.create_tree(base_tree, entries).await?;
        debug!(
            base = %base_tree.short(7),
            tree = %tree.sha.short(7),
            entries = entries.len(),
            "created tree"
        );
        Ok(tree.sha)
    }
}

/// Proper directory prefixes of a path, innermost last.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}
