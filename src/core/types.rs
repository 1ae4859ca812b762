//! core::types
//!
//! Strong types for the version-store data model.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch name (the mutable pointer's name)
//! - [`Oid`] - Content-addressed object identifier assigned by the store
//! - [`FileMode`] / [`EntryKind`] - Tree entry mode and object type
//! - [`Ref`], [`Commit`], [`Tree`], [`RecursiveTree`], [`Blob`] - Store objects
//! - [`FileChange`], [`CommitRequest`] - Caller input for a mutation
//! - [`FileContent`] - Decoded blob content
//!
//! # Validation
//!
//! Names, ids and repository paths are validated at construction time, so a
//! malformed value is rejected before it can reach the network.
//!
//! ```
//! use ghcommit::core::types::{BranchName, Oid};
//!
//! let branch = BranchName::new("main").unwrap();
//! assert_eq!(branch.ref_path(), "heads/main");
//!
//! let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! assert!(BranchName::new("bad..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid repository path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// A validated branch name.
///
/// Branch names follow Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let invalid = |reason: &str| Err(TypeError::InvalidBranchName(reason.to_string()));

        if name.is_empty() {
            return invalid("branch name cannot be empty");
        }
        if name == "@" {
            return invalid("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') {
            return invalid("branch name cannot start with '.'");
        }
        if name.starts_with('-') {
            return invalid("branch name cannot start with '-'");
        }
        if name.ends_with(".lock") {
            return invalid("branch name cannot end with '.lock'");
        }
        if name.ends_with('/') {
            return invalid("branch name cannot end with '/'");
        }
        for sequence in ["..", "@{", "//"] {
            if name.contains(sequence) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{sequence}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return invalid("branch name cannot contain control characters");
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return invalid("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return invalid("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ref path relative to `refs/`, as the Git Data API addresses it.
    pub fn ref_path(&self) -> String {
        format!("heads/{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object identifier (SHA-1 or SHA-256 hex), normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the id (at most `len` characters).
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<[u8; 20]> for Oid {
    fn from(digest: [u8; 20]) -> Self {
        Self(hex::encode(digest))
    }
}

impl From<[u8; 32]> for Oid {
    fn from(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a repository-relative path for a tree entry.
///
/// Paths are `/`-separated, relative, and free of empty, `.` and `..`
/// segments. Directories are implied by the segments and never created
/// explicitly.
pub fn validate_repo_path(path: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| {
        Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    };

    if path.is_empty() {
        return invalid("path cannot be empty");
    }
    if path.starts_with('/') {
        return invalid("path must be relative");
    }
    if path.ends_with('/') {
        return invalid("path cannot end with '/'");
    }
    if path.chars().any(|c| c == '\0' || c.is_ascii_control()) {
        return invalid("path cannot contain control characters");
    }
    for segment in path.split('/') {
        match segment {
            "" => return invalid("path cannot contain empty segments"),
            "." | ".." => return invalid("path cannot contain '.' or '..' segments"),
            _ => {}
        }
    }
    Ok(())
}

/// Mode of a tree entry, in the store's octal string convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (`100644`)
    Normal,
    /// Executable file (`100755`)
    Executable,
    /// Symbolic link (`120000`)
    Symlink,
    /// Subdirectory (`040000`)
    Directory,
    /// Submodule commit link (`160000`)
    Submodule,
}

impl FileMode {
    /// Map the caller's executable flag to a file mode.
    pub fn for_file(executable: bool) -> Self {
        if executable {
            FileMode::Executable
        } else {
            FileMode::Normal
        }
    }

    /// The octal string the store uses for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Normal => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Directory => "040000",
            FileMode::Submodule => "160000",
        }
    }

    /// Parse the store's octal mode string.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "100644" => Some(FileMode::Normal),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "040000" | "40000" => Some(FileMode::Directory),
            "160000" => Some(FileMode::Submodule),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Blob => write!(f, "blob"),
            EntryKind::Tree => write!(f, "tree"),
            EntryKind::Commit => write!(f, "commit"),
        }
    }
}

/// A named, mutable pointer to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub branch: BranchName,
    pub commit: Oid,
}

/// An immutable commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: Oid,
    pub tree: Oid,
    /// Zero parents for a root commit, otherwise exactly one.
    pub parents: Vec<Oid>,
    pub message: String,
}

/// An entry of an existing tree, addressed by its full repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: FileMode,
    pub kind: EntryKind,
    pub sha: Oid,
}

/// An entry to layer onto a base tree, carrying inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: FileMode,
    pub content: String,
}

/// An immutable tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub sha: Oid,
    pub entries: Vec<TreeEntry>,
}

/// A tree flattened across all nested subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveTree {
    pub sha: Oid,
    pub entries: Vec<TreeEntry>,
    /// The store stopped listing before reaching every entry.
    pub truncated: bool,
}

/// Transfer encoding announced for a blob's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// An immutable file-content object, still in its transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub sha: Oid,
    pub encoding: BlobEncoding,
    pub content: String,
}

/// Decoded file content.
///
/// UTF-8 blobs decode to `Text`; base64 blobs decode to raw `Binary` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// View the content as bytes regardless of how it was decoded.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    /// View the content as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Binary(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    /// Consume the content into bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Text(text) => text.into_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }
}

/// One file to add or replace in a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub content: String,
    pub executable: bool,
}

impl FileChange {
    /// A regular (non-executable) file.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            executable: false,
        }
    }

    /// An executable file.
    pub fn executable(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            executable: true,
            ..Self::new(path, content)
        }
    }
}

/// A request to commit a set of file changes to a branch.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub changes: Vec<FileChange>,
    pub message: String,
    pub branch: BranchName,
    /// Rewrite the branch unconditionally (recovery only; may lose history).
    pub force: bool,
    /// Abort at the next network round trip once this instant has passed.
    pub deadline: Option<Instant>,
}

impl CommitRequest {
    /// Create a fast-forward-only request with no changes yet.
    pub fn new(branch: BranchName, message: impl Into<String>) -> Self {
        Self {
            changes: Vec::new(),
            message: message.into(),
            branch,
            force: false,
            deadline: None,
        }
    }

    /// Add one file change.
    pub fn change(mut self, change: FileChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Add several file changes.
    pub fn changes(mut self, changes: impl IntoIterator<Item = FileChange>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Request a force update of the branch.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set a deadline for the whole mutation.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
