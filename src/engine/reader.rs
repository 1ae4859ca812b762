//! engine::reader
//!
//! Resolves a path on a branch to file content.
//!
//! Every call re-resolves the branch head; nothing is cached. Reads take no
//! lock and may run alongside an in-flight commit.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use tracing::{debug, warn};

use super::{Deadline, RefGate};
use crate::core::types::{
    validate_repo_path, Blob, BlobEncoding, BranchName, EntryKind, FileContent,
};
use crate::store::{StoreError, VersionStore};

/// Reads files out of the tree a branch points at.
pub struct FileReader<'a> {
    store: &'a dyn VersionStore,
    deadline: Deadline,
}

impl<'a> FileReader<'a> {
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

    /// Fetch the content of `path` at the head of `branch`.
    ///
    /// # Errors
    ///
    /// - `Validation` if `path` is malformed
    /// - `NotFound` if the branch or path does not exist, or the path is a
    ///   directory
    /// - `Corrupt` if the listing holds the path more than once or the blob
    ///   cannot be decoded
    pub async fn get(&self, branch: &BranchName, path: &str) -> Result<FileContent, StoreError> {
        validate_repo_path(path)?;

        let head = RefGate::new(self.store)
            .with_deadline(self.deadline)
            .read(branch)
            .await?;

        self.deadline.check("get_tree_recursive")?;
        let listing = self.store.get_tree_recursive(&head.tree).await?;

        let mut matches = listing.entries.iter().filter(|e| e.path == path);
        let entry = match (matches.next(), matches.next()) {
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => {
                return Err(StoreError::Corrupt(format!(
                    "tree {} lists '{}' more than once",
                    listing.sha, path
                )))
            }
            (None, _) if listing.truncated => {
                warn!(tree = %listing.sha.short(7), "recursive tree listing was truncated");
                return Err(StoreError::NotFound(format!(
                    "'{}' not in truncated listing of tree {}",
                    path, listing.sha
                )));
            }
            (None, _) => {
                return Err(StoreError::NotFound(format!(
                    "'{}' on branch '{}'",
                    path, branch
                )))
            }
        };

        if entry.kind != EntryKind::Blob {
            return Err(StoreError::NotFound(format!(
                "'{}' is a {}, not a file",
                path, entry.kind
            )));
        }

        self.deadline.check("get_blob")?;
        let blob = self.store.get_blob(&entry.sha).await?;
        debug!(
            path = path,
            blob = %blob.sha.short(7),
            encoding = ?blob.encoding,
            "fetched blob"
        );
        decode_blob(&blob)
    }
}

/// Decode a blob per its announced encoding.
///
/// UTF-8 blobs are returned as text unchanged. Base64 blobs may be wrapped
/// across lines and decode to raw bytes.
pub fn decode_blob(blob: &Blob) -> Result<FileContent, StoreError> {
    match blob.encoding {
        BlobEncoding::Utf8 => Ok(FileContent::Text(blob.content.clone())),
        BlobEncoding::Base64 => {
            let compact: String = blob
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            BASE64_STANDARD
                .decode(compact)
                .map(FileContent::Binary)
                .map_err(|e| StoreError::Corrupt(format!("blob {}: invalid base64: {}", blob.sha, e)))
        }
    }
}
