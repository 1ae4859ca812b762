//! store::traits
//!
//! The version-store trait and its error taxonomy.
//!
//! # Design
//!
//! The `VersionStore` trait is async because every operation is one network
//! round trip. Implementations perform no retries: each method either
//! returns the store's answer or a typed [`StoreError`], and retry policy
//! belongs to the caller.
//!
//! # Example
//!
//! ```ignore
//! use ghcommit::store::{StoreError, VersionStore};
//! use ghcommit::core::types::BranchName;
//!
//! async fn head(store: &dyn VersionStore) -> Result<(), StoreError> {
//!     let branch = BranchName::new("main")?;
//!     let r = store.get_ref(&branch).await?;
//!     let commit = store.get_commit(&r.commit).await?;
//!     println!("{} -> tree {}", r.commit, commit.tree);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{
    Blob, BranchName, Commit, NewTreeEntry, Oid, RecursiveTree, Ref, Tree, TypeError,
};

/// Errors from version-store operations.
///
/// The variants fall into the classes callers act on:
/// - transient (`Transport`, `RateLimited`, 5xx `Api`): safe to retry with backoff
/// - conflict (`Conflict`): re-read the branch and retry the whole commit
/// - fatal (everything else): not retried
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Connectivity failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// A mutating call was attempted without credentials.
    #[error("authentication required")]
    AuthRequired,

    /// Credentials were rejected or lack permission.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A ref, commit, tree, blob or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (caller bug).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The change set was empty; there is nothing to commit.
    #[error("nothing to commit: change set is empty")]
    NothingToCommit,

    /// The branch moved between reading it and advancing it.
    #[error("conflict on branch '{branch}': {detail}")]
    Conflict {
        /// Branch whose update was rejected
        branch: String,
        /// What the store reported
        detail: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success response.
    #[error("store error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },

    /// The store returned data that violates its own invariants.
    #[error("corrupt store data: {0}")]
    Corrupt(String),

    /// The caller's deadline passed before the next round trip.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl StoreError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::RateLimited => true,
            StoreError::Api { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Whether the branch moved underneath the mutation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Whether the input itself was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::Validation(_) | StoreError::NothingToCommit
        )
    }

    /// Whether the failure only signals that there was nothing to do.
    pub fn is_no_op(&self) -> bool {
        matches!(self, StoreError::NothingToCommit)
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// A content-addressable version store reachable through porcelain-style
/// object operations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; reads may run concurrently with
/// each other and with an in-flight mutation.
///
/// # Errors
///
/// Every method may fail with `Transport`, `AuthRequired`/`AuthFailed`, or
/// `Api`. Method-specific failures are listed on each method.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Get the store name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Resolve a branch to the commit it points at.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch does not exist
    async fn get_ref(&self, branch: &BranchName) -> Result<Ref, StoreError>;

    /// Fetch a commit object.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id is unknown
    async fn get_commit(&self, sha: &Oid) -> Result<Commit, StoreError>;

    /// Create a tree by layering `entries` onto `base_tree` in one request.
    ///
    /// Paths not mentioned in `entries` are left unchanged.
    ///
    /// # Errors
    ///
    /// - `Validation` if an entry is malformed or the base tree is unknown
    async fn create_tree(
        &self,
        base_tree: &Oid,
        entries: &[NewTreeEntry],
    ) -> Result<Tree, StoreError>;

    /// Create a commit object pointing at `tree` with the given parents.
    async fn create_commit(
        &self,
        tree: &Oid,
        parents: &[Oid],
        message: &str,
    ) -> Result<Commit, StoreError>;

    /// Point `branch` at `sha`.
    ///
    /// Without `force` the update must be a fast-forward.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the branch moved and `force` is false
    async fn update_ref(
        &self,
        branch: &BranchName,
        sha: &Oid,
        force: bool,
    ) -> Result<Ref, StoreError>;

    /// List a tree and all nested subtrees with full paths.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tree is unknown
    async fn get_tree_recursive(&self, sha: &Oid) -> Result<RecursiveTree, StoreError>;

    /// Fetch a blob in its transfer encoding.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the blob is unknown
    async fn get_blob(&self, sha: &Oid) -> Result<Blob, StoreError>;
}
