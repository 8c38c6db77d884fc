//! herodb - a hierarchical, git-object-backed key/value store exposed as a
//! multi-tenant HTTP service.
//!
//! # Core concepts
//!
//! - **Blob**: a JSON leaf value, content-addressed by SHA-256
//! - **Tree**: a sorted set of named entries (CBOR + zstd), each either a
//!   blob or a nested tree
//! - **Commit**: a snapshot of a tree with author/message/parents (CBOR + zstd)
//! - **Ref**: a named pointer to a commit (one flat namespace per store,
//!   `refs/heads/<branch>`)
//!
//! each store is an independent object graph; the HTTP layer multiplexes
//! many stores over one process via [`registry::Registry`].

pub mod backend;
pub mod config;
pub mod error;
pub mod gc;
pub mod hash;
pub mod head_cache;
pub mod http;
pub mod path;
pub mod query_cache;
pub mod registry;
pub mod serializer;
pub mod store;
pub mod traversal;
pub mod types;

pub use error::{Error, Result};
pub use hash::Hash;
