//! store::mock
//!
//! In-memory version store for deterministic testing.
//!
//! # Design
//!
//! The mock store keeps blobs, trees, commits and refs in memory and assigns
//! content-addressed ids (SHA-256 over a typed header and payload), so equal
//! content always yields equal ids. It follows the same rules as the GitHub
//! Git Data API where the engine depends on them:
//!
//! - `create_tree` overlays entries onto the base tree; unmentioned paths are kept
//! - `update_ref` only fast-forwards unless `force` is set
//! - `get_tree_recursive` lists implied directories as `tree` entries
//! - `get_blob` returns base64 content wrapped at 60 columns
//!
//! Failures can be injected per operation with [`FailOn`], every call is
//! recorded as a [`MockOperation`], and [`MockStore::advance_before_next_update`]
//! simulates another actor moving a branch between a read and a ref update.
//!
//! # Example
//!
//! ```
//! use ghcommit::store::mock::MockStore;
//! use ghcommit::store::VersionStore;
//! use ghcommit::core::types::BranchName;
//!
//! # tokio_test::block_on(async {
//! let store = MockStore::new();
//! let main = BranchName::new("main").unwrap();
//! let c0 = store.seed_branch(&main, &[("README", "a")]);
//!
//! let head = store.get_ref(&main).await.unwrap();
//! assert_eq!(head.commit, c0);
//! # });
//! ```

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use super::traits::{StoreError, VersionStore};
use crate::core::types::{
    validate_repo_path, Blob, BlobEncoding, BranchName, Commit, EntryKind, FileMode, NewTreeEntry,
    Oid, RecursiveTree, Ref, Tree, TreeEntry,
};

/// Width of the base64 lines returned by `get_blob`.
const BASE64_LINE_WIDTH: usize = 60;

/// A tree flattened to `path -> (mode, blob id)`.
type FlatTree = BTreeMap<String, (FileMode, Oid)>;

/// Mock version store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, FlatTree>,
    commits: HashMap<Oid, Commit>,
    refs: HashMap<BranchName, Oid>,
    /// Stands in for commit timestamps so identical commits get distinct ids.
    clock: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
    pending_advance: Option<PendingAdvance>,
    listing_limit: Option<usize>,
}

#[derive(Debug, Clone)]
struct PendingAdvance {
    branch: BranchName,
    files: Vec<(String, String)>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRef(StoreError),
    GetCommit(StoreError),
    CreateTree(StoreError),
    CreateCommit(StoreError),
    UpdateRef(StoreError),
    GetTreeRecursive(StoreError),
    GetBlob(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRef {
        branch: String,
    },
    GetCommit {
        sha: Oid,
    },
    CreateTree {
        base_tree: Oid,
        paths: Vec<String>,
    },
    CreateCommit {
        tree: Oid,
        parents: Vec<Oid>,
        message: String,
    },
    UpdateRef {
        branch: String,
        sha: Oid,
        force: bool,
    },
    GetTreeRecursive {
        sha: Oid,
    },
    GetBlob {
        sha: Oid,
    },
}

impl MockOperation {
    /// Whether the operation creates objects or moves a ref.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            MockOperation::CreateTree { .. }
                | MockOperation::CreateCommit { .. }
                | MockOperation::UpdateRef { .. }
        )
    }
}

impl MockStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockStoreInner::default())),
        }
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use ghcommit::store::mock::{FailOn, MockStore};
    /// use ghcommit::store::StoreError;
    ///
    /// let store = MockStore::new().fail_on(FailOn::CreateTree(StoreError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Create or advance `branch` with a commit layering `files` onto its
    /// current tree. A new branch gets a root commit.
    ///
    /// Not recorded as an operation.
    pub fn seed_branch(&self, branch: &BranchName, files: &[(&str, &str)]) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let files: Vec<(String, String)> = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        inner.commit_files(branch, &files, "seed")
    }

    /// Make another actor commit `files` to `branch` right before the next
    /// `update_ref` call is processed.
    pub fn advance_before_next_update(&self, branch: &BranchName, files: &[(&str, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending_advance = Some(PendingAdvance {
            branch: branch.clone(),
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        });
    }

    /// Truncate recursive listings after `limit` entries.
    pub fn set_listing_limit(&self, limit: Option<usize>) {
        let mut inner = self.inner.lock().unwrap();
        inner.listing_limit = limit;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// The commit a branch currently points at.
    pub fn ref_commit(&self, branch: &BranchName) -> Option<Oid> {
        let inner = self.inner.lock().unwrap();
        inner.refs.get(branch).cloned()
    }

    /// Get a commit by id (for test verification).
    pub fn commit_sync(&self, sha: &Oid) -> Option<Commit> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).cloned()
    }

    /// Number of commit objects in the store, referenced or not.
    pub fn commit_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.commits.len()
    }

    /// All files in a commit's tree as `path -> bytes`.
    pub fn files_at(&self, commit: &Oid) -> BTreeMap<String, Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let Some(tree) = inner
            .commits
            .get(commit)
            .and_then(|c| inner.trees.get(&c.tree))
        else {
            return BTreeMap::new();
        };
        tree.iter()
            .filter_map(|(path, (_, blob))| {
                inner
                    .blobs
                    .get(blob)
                    .map(|bytes| (path.clone(), bytes.clone()))
            })
            .collect()
    }

    /// The mode of a file in a commit's tree.
    pub fn mode_at(&self, commit: &Oid, path: &str) -> Option<FileMode> {
        let inner = self.inner.lock().unwrap();
        let tree = inner.trees.get(&inner.commits.get(commit)?.tree)?;
        tree.get(path).map(|(mode, _)| *mode)
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Return the injected error if `op` is configured to fail.
    fn check_fail(&self, op: &str) -> Result<(), StoreError> {
        let inner = self.inner.lock().unwrap();
        let injected = match (&inner.fail_on, op) {
            (Some(FailOn::GetRef(e)), "get_ref")
            | (Some(FailOn::GetCommit(e)), "get_commit")
            | (Some(FailOn::CreateTree(e)), "create_tree")
            | (Some(FailOn::CreateCommit(e)), "create_commit")
            | (Some(FailOn::UpdateRef(e)), "update_ref")
            | (Some(FailOn::GetTreeRecursive(e)), "get_tree_recursive")
            | (Some(FailOn::GetBlob(e)), "get_blob") => Some(e.clone()),
            _ => None,
        };
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStoreInner {
    fn put_blob(&mut self, bytes: &[u8]) -> Oid {
        let sha = object_id("blob", bytes);
        self.blobs
            .entry(sha.clone())
            .or_insert_with(|| bytes.to_vec());
        sha
    }

    /// Store a tree and every subtree it implies.
    fn put_tree(&mut self, tree: FlatTree) -> Oid {
        for dir in directories(&tree) {
            let sub = subtree(&tree, &dir);
            self.trees.entry(tree_id(&sub)).or_insert(sub);
        }
        let sha = tree_id(&tree);
        self.trees.insert(sha.clone(), tree);
        sha
    }

    fn put_commit(&mut self, tree: Oid, parents: Vec<Oid>, message: &str) -> Commit {
        self.clock += 1;
        let mut payload = format!("tree {}\n", tree);
        for parent in &parents {
            payload.push_str(&format!("parent {}\n", parent));
        }
        payload.push_str(&format!("sequence {}\n\n{}", self.clock, message));

        let commit = Commit {
            sha: object_id("commit", payload.as_bytes()),
            tree,
            parents,
            message: message.to_string(),
        };
        self.commits.insert(commit.sha.clone(), commit.clone());
        commit
    }

    /// Layer `(path, mode, content)` entries onto a copy of `base`.
    fn overlay<'a>(
        &mut self,
        base: &FlatTree,
        entries: impl IntoIterator<Item = (&'a str, FileMode, &'a str)>,
    ) -> FlatTree {
        let mut tree = base.clone();
        for (path, mode, content) in entries {
            // A file replaces any directory at its path and vice versa.
            let dir_prefix = format!("{}/", path);
            tree.retain(|existing, _| {
                !existing.starts_with(&dir_prefix) && !path.starts_with(&format!("{}/", existing))
            });
            let blob = self.put_blob(content.as_bytes());
            tree.insert(path.to_string(), (mode, blob));
        }
        tree
    }

    /// Commit files on top of a branch (or as a root commit) and move the ref.
    fn commit_files(
        &mut self,
        branch: &BranchName,
        files: &[(String, String)],
        message: &str,
    ) -> Oid {
        let parent = self.refs.get(branch).cloned();
        let base = parent
            .as_ref()
            .and_then(|p| self.commits.get(p))
            .and_then(|c| self.trees.get(&c.tree))
            .cloned()
            .unwrap_or_default();

        let tree = self.overlay(
            &base,
            files
                .iter()
                .map(|(p, c)| (p.as_str(), FileMode::Normal, c.as_str())),
        );
        let tree = self.put_tree(tree);
        let commit = self.put_commit(tree, parent.into_iter().collect(), message);
        self.refs.insert(branch.clone(), commit.sha.clone());
        commit.sha
    }

    fn apply_pending_advance(&mut self) {
        if let Some(pending) = self.pending_advance.take() {
            self.commit_files(&pending.branch, &pending.files, "concurrent update");
        }
    }

    /// Whether `ancestor` is reachable from `descendant` by parent links.
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> bool {
        let mut stack = vec![descendant.clone()];
        let mut seen = BTreeSet::new();
        while let Some(sha) = stack.pop() {
            if &sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    /// Full recursive listing, directories included, ordered by path.
    fn listing(&self, tree: &FlatTree) -> Vec<TreeEntry> {
        let mut entries: BTreeMap<String, TreeEntry> = BTreeMap::new();
        for dir in directories(tree) {
            let sha = tree_id(&subtree(tree, &dir));
            entries.insert(
                dir.clone(),
                TreeEntry {
                    path: dir,
                    mode: FileMode::Directory,
                    kind: EntryKind::Tree,
                    sha,
                },
            );
        }
        for (path, (mode, sha)) in tree {
            entries.insert(
                path.clone(),
                TreeEntry {
                    path: path.clone(),
                    mode: *mode,
                    kind: EntryKind::Blob,
                    sha: sha.clone(),
                },
            );
        }
        entries.into_values().collect()
    }
}

/// Content-addressed id over a typed header and payload.
fn object_id(kind: &str, payload: &[u8]) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(format!("{} {}\0", kind, payload.len()).as_bytes());
    hasher.update(payload);
    let digest: [u8; 32] = hasher.finalize().into();
    Oid::from(digest)
}

fn tree_id(tree: &FlatTree) -> Oid {
    let mut payload = String::new();
    for (path, (mode, sha)) in tree {
        payload.push_str(&format!("{} {}\0{}\n", mode, path, sha));
    }
    object_id("tree", payload.as_bytes())
}

/// Every directory implied by the paths of a flat tree.
fn directories(tree: &FlatTree) -> BTreeSet<String> {
    tree.keys()
        .flat_map(|path| {
            path.match_indices('/')
                .map(move |(i, _)| path[..i].to_string())
        })
        .collect()
}

/// The entries under `dir`, with paths relative to it.
fn subtree(tree: &FlatTree, dir: &str) -> FlatTree {
    let prefix = format!("{}/", dir);
    tree.iter()
        .filter_map(|(path, entry)| {
            path.strip_prefix(&prefix)
                .map(|rest| (rest.to_string(), entry.clone()))
        })
        .collect()
}

fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = BASE64_STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH + 1);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % BASE64_LINE_WIDTH == 0 {
            wrapped.push('\n');
        }
        wrapped.push(c);
    }
    wrapped.push('\n');
    wrapped
}

#[async_trait]
impl VersionStore for MockStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_ref(&self, branch: &BranchName) -> Result<Ref, StoreError> {
        self.record(MockOperation::GetRef {
            branch: branch.to_string(),
        });
        self.check_fail("get_ref")?;

        let inner = self.inner.lock().unwrap();
        let commit = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ref {}", branch.ref_path())))?;
        Ok(Ref {
            branch: branch.clone(),
            commit,
        })
    }

    async fn get_commit(&self, sha: &Oid) -> Result<Commit, StoreError> {
        self.record(MockOperation::GetCommit { sha: sha.clone() });
        self.check_fail("get_commit")?;

        let inner = self.inner.lock().unwrap();
        inner
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("commit {}", sha)))
    }

    async fn create_tree(
        &self,
        base_tree: &Oid,
        entries: &[NewTreeEntry],
    ) -> Result<Tree, StoreError> {
        self.record(MockOperation::CreateTree {
            base_tree: base_tree.clone(),
            paths: entries.iter().map(|e| e.path.clone()).collect(),
        });
        self.check_fail("create_tree")?;

        for entry in entries {
            validate_repo_path(&entry.path).map_err(|e| {
                StoreError::Validation(format!("tree.path contains a malformed path component: {}", e))
            })?;
        }

        let mut inner = self.inner.lock().unwrap();
        let base = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| StoreError::Validation(format!("base_tree {} is not a valid tree oid", base_tree)))?;

        let tree = inner.overlay(
            &base,
            entries
                .iter()
                .map(|e| (e.path.as_str(), e.mode, e.content.as_str())),
        );
        let top_level = inner
            .listing(&tree)
            .into_iter()
            .filter(|e| !e.path.contains('/'))
            .collect();
        let sha = inner.put_tree(tree);

        Ok(Tree {
            sha,
            entries: top_level,
        })
    }

    async fn create_commit(
        &self,
        tree: &Oid,
        parents: &[Oid],
        message: &str,
    ) -> Result<Commit, StoreError> {
        self.record(MockOperation::CreateCommit {
            tree: tree.clone(),
            parents: parents.to_vec(),
            message: message.to_string(),
        });
        self.check_fail("create_commit")?;

        let mut inner = self.inner.lock().unwrap();
        if !inner.trees.contains_key(tree) {
            return Err(StoreError::Validation(format!("tree {} does not exist", tree)));
        }
        if let Some(missing) = parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(StoreError::Validation(format!(
                "parent {} does not exist or is not a commit object",
                missing
            )));
        }
        Ok(inner.put_commit(tree.clone(), parents.to_vec(), message))
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        sha: &Oid,
        force: bool,
    ) -> Result<Ref, StoreError> {
        self.record(MockOperation::UpdateRef {
            branch: branch.to_string(),
            sha: sha.clone(),
            force,
        });

        let mut inner = self.inner.lock().unwrap();
        inner.apply_pending_advance();
        drop(inner);
        self.check_fail("update_ref")?;

        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| StoreError::Validation("Reference does not exist".into()))?;
        if !inner.commits.contains_key(sha) {
            return Err(StoreError::Validation("Object does not exist".into()));
        }
        if !force && current != *sha && !inner.is_ancestor(&current, sha) {
            return Err(StoreError::Conflict {
                branch: branch.to_string(),
                detail: "Update is not a fast forward".into(),
            });
        }

        inner.refs.insert(branch.clone(), sha.clone());
        Ok(Ref {
            branch: branch.clone(),
            commit: sha.clone(),
        })
    }

    async fn get_tree_recursive(&self, sha: &Oid) -> Result<RecursiveTree, StoreError> {
        self.record(MockOperation::GetTreeRecursive { sha: sha.clone() });
        self.check_fail("get_tree_recursive")?;

        let inner = self.inner.lock().unwrap();
        let tree = inner
            .trees
            .get(sha)
            .ok_or_else(|| StoreError::NotFound(format!("tree {}", sha)))?;

        let mut entries = inner.listing(tree);
        let truncated = match inner.listing_limit {
            Some(limit) if entries.len() > limit => {
                entries.truncate(limit);
                true
            }
            _ => false,
        };

        Ok(RecursiveTree {
            sha: sha.clone(),
            entries,
            truncated,
        })
    }

    async fn get_blob(&self, sha: &Oid) -> Result<Blob, StoreError> {
        self.record(MockOperation::GetBlob { sha: sha.clone() });
        self.check_fail("get_blob")?;

        let inner = self.inner.lock().unwrap();
        let bytes = inner
            .blobs
            .get(sha)
            .ok_or_else(|| StoreError::NotFound(format!("blob {}", sha)))?;

        Ok(Blob {
            sha: sha.clone(),
            encoding: BlobEncoding::Base64,
            content: wrap_base64(bytes),
        })
    }
}
