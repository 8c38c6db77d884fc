//! the abstract capability `Store` depends on: content-addressed object
//! storage plus a flat ref namespace. `Store` never talks to the filesystem
//! directly — everything goes through this trait, so a future backend (e.g.
//! an in-memory one for tests, or a networked one) only needs to implement
//! it once.

mod local;

pub use local::LocalBackend;

use crate::error::Result;
use crate::hash::Hash;
use crate::types::{Commit, DiffEntry, Tree};

/// a blob, tree or commit object as read back from a backend
#[derive(Clone, Debug)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn into_blob(self) -> Option<Vec<u8>> {
        match self {
            Object::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_tree(self) -> Option<Tree> {
        match self {
            Object::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_commit(self) -> Option<Commit> {
        match self {
            Object::Commit(c) => Some(c),
            _ => None,
        }
    }
}

pub trait ObjectBackend: Send + Sync {
    fn read_blob(&self, hash: &Hash) -> Result<Vec<u8>>;
    fn write_blob(&self, bytes: &[u8]) -> Result<Hash>;

    fn read_tree(&self, hash: &Hash) -> Result<Tree>;
    fn write_tree(&self, tree: &Tree) -> Result<Hash>;

    fn read_commit(&self, hash: &Hash) -> Result<Commit>;
    fn write_commit(&self, commit: &Commit) -> Result<Hash>;

    fn read_ref(&self, name: &str) -> Result<Option<Hash>>;
    fn write_ref(&self, name: &str, hash: &Hash) -> Result<()>;
    fn delete_ref(&self, name: &str) -> Result<()>;
    fn list_refs(&self) -> Result<Vec<String>>;

    /// diff two trees (by hash; `None` means the empty tree), returning
    /// changes with paths relative to the diff root
    fn diff_trees(&self, from: Option<&Hash>, to: Option<&Hash>) -> Result<Vec<DiffEntry>>;

    /// reclaim storage for objects unreachable from any ref
    fn compact(&self) -> Result<crate::gc::GcStats>;
}
