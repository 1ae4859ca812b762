//! ghcommit - atomic multi-file commits over the GitHub Git Data API
//!
//! GitHub's REST API has no call that commits several files at once. ghcommit
//! builds one from the object primitives: read the branch head, create a tree
//! layered onto the head's tree, create a commit on top of the head, and
//! fast-forward the branch to it.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The commit protocol and the file read path
//! - [`store`] - The version-store trait, GitHub client and mock
//! - [`core`] - Domain types and configuration
//!
//! # Correctness Invariants
//!
//! 1. Every commit written has exactly one parent, the head observed at the start
//! 2. A branch is only moved by a fast-forward, unless force is requested
//! 3. A failed commit never moves the branch
//! 4. Mutations through one engine never interleave

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
