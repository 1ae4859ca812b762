//! store
//!
//! Abstraction for the remote version store (GitHub Git Data API).
//!
//! # Architecture
//!
//! The `VersionStore` trait is the typed request/response layer over the
//! store's object primitives. The commit engine talks only to the trait, so
//! the same protocol code runs against GitHub and against the in-memory mock.
//!
//! - Each trait method is exactly one round trip
//! - No method retries; errors carry enough class information for callers
//! - Clients hold connection settings only, never repository state
//!
//! # Modules
//!
//! - `traits`: Core `VersionStore` trait and the `StoreError` taxonomy
//! - [`github`]: GitHub implementation over the REST Git Data endpoints
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use ghcommit::core::config::Config;
//! use ghcommit::store::github::GitHubStore;
//! use ghcommit::store::VersionStore;
//!
//! let config = Config::load(None)?;
//! let store = GitHubStore::from_config(&config)?;
//!
//! let head = store.get_ref(&config.default_branch()?).await?;
//! println!("{} is at {}", head.branch, head.commit);
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
