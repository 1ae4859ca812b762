//! core
//!
//! Core domain types and configuration for ghcommit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, FileMode, store objects, requests
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here performs I/O except config loading

pub mod config;
pub mod types;
