//! engine::gate
//!
//! Read-modify-write protection for a branch pointer.
//!
//! # Architecture
//!
//! `RefGate::read` captures the branch head and its tree as a
//! [`RefSnapshot`]. `RefGate::advance` later moves the branch from that
//! snapshot to a new commit. The store's fast-forward check rejects the
//! update if another actor moved the branch in between; the gate reports
//! that as `StoreError::Conflict` and does not retry.
//!
//! # Invariants
//!
//! - `advance` never forces unless the caller asked for it
//! - A conflict leaves the branch at whatever the other actor wrote
//! - A successful `advance` leaves the branch exactly at the new commit

use tracing::{debug, info, warn};

use super::Deadline;
use crate::core::types::{BranchName, Oid, Ref};
use crate::store::{StoreError, VersionStore};

/// A branch head as observed at the start of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSnapshot {
    pub branch: BranchName,
    /// Commit the branch pointed at when read.
    pub commit: Oid,
    /// Root tree of that commit.
    pub tree: Oid,
}

/// Guards reads and advances of branch refs.
pub struct RefGate<'a> {
    store: &'a dyn VersionStore,
    deadline: Deadline,
}

impl<'a> RefGate<'a> {
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

    /// Resolve `branch` to its head commit and that commit's tree.
    ///
    /// Two round trips: ref, then commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch or its commit does not exist
    /// - `Corrupt` if the store returns a different commit than requested
    pub async fn read(&self, branch: &BranchName) -> Result<RefSnapshot, StoreError> {
        self.deadline.check("get_ref")?;
        let head = self.store.get_ref(branch).await?;

        self.deadline.check("get_commit")?;
        let commit = self.store.get_commit(&head.commit).await?;
        if commit.sha != head.commit {
            return Err(StoreError::Corrupt(format!(
                "requested commit {} but store returned {}",
                head.commit, commit.sha
            )));
        }

        debug!(
            branch = %branch,
            commit = %commit.sha.short(7),
            tree = %commit.tree.short(7),
            "read branch head"
        );
        Ok(RefSnapshot {
            branch: branch.clone(),
            commit: commit.sha,
            tree: commit.tree,
        })
    }

    /// Move `branch` from `expected` to `new`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the branch no longer descends to `new` from
    ///   `expected` and `force` is false
    pub async fn advance(
        &self,
        branch: &BranchName,
        expected: &Oid,
        new: &Oid,
        force: bool,
    ) -> Result<Ref, StoreError> {
        self.deadline.check("update_ref")?;
        let updated = match self.store.update_ref(branch, new, force).await {
            Ok(updated) => updated,
            Err(err) => {
                if err.is_conflict() {
                    warn!(
                        branch = %branch,
                        expected = %expected.short(7),
                        rejected = %new.short(7),
                        "branch moved since it was read"
                    );
                }
                return Err(err);
            }
        };

        if updated.commit != *new {
            return Err(StoreError::Corrupt(format!(
                "branch '{}' reported at {} after update to {}",
                branch, updated.commit, new
            )));
        }

        if force {
            warn!(branch = %branch, commit = %new.short(7), "force-updated branch");
        } else {
            info!(
                branch = %branch,
                from = %expected.short(7),
                to = %new.short(7),
                "advanced branch"
            );
        }
        Ok(updated)
    }
}
