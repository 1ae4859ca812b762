//! engine
//!
//! The multi-file atomic commit protocol.
//!
//! # Architecture
//!
//! The store offers no multi-file commit primitive, so the engine composes
//! one from object operations:
//!
//! ```text
//! RefGate::read -> TreeBuilder::submit -> CommitWriter::write -> RefGate::advance
//! ```
//!
//! [`CommitEngine::commit`] is the only mutating entry point. It holds a
//! per-instance lock across the whole sequence, so two callers sharing an
//! engine never interleave their read and write steps. Other engines and
//! other processes are not covered by the lock; their races surface as
//! `StoreError::Conflict` from the store's fast-forward check.
//!
//! # Invariants
//!
//! - A change set is validated before the lock is taken or any call is made
//! - Every commit written has exactly one parent: the head observed by `read`
//! - A failed commit never moves the branch; created objects are left orphaned
//! - Conflicts are returned, never retried
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ghcommit::core::types::{BranchName, CommitRequest, FileChange};
//! use ghcommit::engine::CommitEngine;
//! use ghcommit::store::mock::MockStore;
//!
//! # tokio_test::block_on(async {
//! let store = MockStore::new();
//! let main = BranchName::new("main").unwrap();
//! let c0 = store.seed_branch(&main, &[("README", "a")]);
//!
//! let engine = CommitEngine::new(Arc::new(store));
//! let request = CommitRequest::new(main.clone(), "update")
//!     .change(FileChange::new("README", "b"));
//! let c1 = engine.commit(&request).await.unwrap();
//! assert_ne!(c1, c0);
//!
//! let readme = engine.get_file(&main, "README").await.unwrap();
//! assert_eq!(readme.as_text(), Some("b"));
//! # });
//! ```

pub mod commit;
pub mod gate;
pub mod reader;
pub mod tree;

pub use commit::CommitWriter;
pub use gate::{RefGate, RefSnapshot};
pub use reader::{decode_blob, FileReader};
pub use tree::TreeBuilder;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::core::types::{BranchName, CommitRequest, FileContent, Oid};
use crate::store::{StoreError, VersionStore};

/// An optional instant after which no further round trip is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Fail with `Cancelled` if the deadline has passed.
    pub fn check(&self, next_call: &str) -> Result<(), StoreError> {
        match self.0 {
            Some(at) if Instant::now() >= at => Err(StoreError::Cancelled(format!(
                "deadline passed before {}",
                next_call
            ))),
            _ => Ok(()),
        }
    }
}

impl From<Option<Instant>> for Deadline {
    fn from(instant: Option<Instant>) -> Self {
        Self(instant)
    }
}

/// Commits sets of file changes to branches of one store.
pub struct CommitEngine {
    store: Arc<dyn VersionStore>,
    /// Held for the whole read-build-write-advance sequence.
    mutation_lock: Mutex<()>,
}

impl CommitEngine {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            mutation_lock: Mutex::new(()),
        }
    }

    /// The store this engine drives.
    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    /// Commit `request.changes` to `request.branch` as one new commit.
    ///
    /// Returns the id of the commit the branch now points at.
    ///
    /// # Errors
    ///
    /// - `NothingToCommit` if the change set is empty (no call is made)
    /// - `Validation` if a path is malformed or repeated (no call is made)
    /// - `NotFound` if the branch does not exist
    /// - `Conflict` if the branch moved since it was read and `force` is off
    /// - `Cancelled` if the request deadline passes between round trips
    /// - any other store error, unchanged
    #[instrument(
        skip(self, request),
        fields(store = self.store.name(), branch = %request.branch, changes = request.changes.len())
    )]
    pub async fn commit(&self, request: &CommitRequest) -> Result<Oid, StoreError> {
        let entries = TreeBuilder::prepare(&request.changes)?;
        let deadline = Deadline::from(request.deadline);
        let store = self.store.as_ref();

        let _guard = self.mutation_lock.lock().await;

        let gate = RefGate::new(store).with_deadline(deadline);
        let head = gate.read(&request.branch).await?;

        let tree = TreeBuilder::new(store)
            .with_deadline(deadline)
            .submit(&head.tree, &entries)
            .await?;

        let commit = CommitWriter::new(store)
            .with_deadline(deadline)
            .write(&tree, &head.commit, &request.message)
            .await?;

        gate.advance(&request.branch, &head.commit, &commit, request.force)
            .await?;

        info!(commit = %commit.short(7), "committed {} file(s)", entries.len());
        Ok(commit)
    }

    /// Read a file at the current head of `branch`.
    ///
    /// Takes no lock.
    pub async fn get_file(&self, branch: &BranchName, path: &str) -> Result<FileContent, StoreError> {
        self.reader().get(branch, path).await
    }

    /// A reader over this engine's store.
    pub fn reader(&self) -> FileReader<'_> {
        FileReader::new(self.store.as_ref())
    }
}

impl std::fmt::Debug for CommitEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitEngine")
            .field("store", &self.store.name())
            .finish()
    }
}
