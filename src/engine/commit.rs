//! engine::commit
//!
//! Writes single-parent commit objects.

use tracing::debug;

use super::Deadline;
use crate::core::types::Oid;
use crate::store::{StoreError, VersionStore};

/// Creates commit objects with exactly one parent.
///
/// The engine never writes merge commits, so history stays linear.
pub struct CommitWriter<'a> {
    store: &'a dyn VersionStore,
    deadline: Deadline,
}

impl<'a> CommitWriter<'a> {
    pub fn new(store: &'a dyn VersionStore) -> Self {
        Self {
            store,
            deadline: Deadline::none(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Create a commit of `tree` on top of `parent`.
    ///
    /// Failures are returned as the store reported them; nothing is retried.
    pub async fn write(&self, tree: &Oid, parent: &Oid, message: &str) -> Result<Oid, StoreError> {
        self.deadline.check("create_commit")?;
        let commit = self
            .store
            .create_commit(tree, std::slice::from_ref(parent), message)
            .await?;

        if commit.parents.as_slice() != std::slice::from_ref(parent) {
            return Err(StoreError::Corrupt(format!(
                "commit {} was created with parents {:?}, expected [{}]",
                commit.sha, commit.parents, parent
            )));
        }

        debug!(
            commit = %commit.sha.short(7),
            parent = %parent.short(7),
            tree = %tree.short(7),
            "created commit"
        );
        Ok(commit.sha)
    }
}
