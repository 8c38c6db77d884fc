//! the hierarchical key/value store built on top of an [`ObjectBackend`].
//!
//! every mutation is one commit: `put` and `delete` each read the current
//! branch head, build a new tree, and write a new commit with the old head
//! as its parent. A write to a branch with no head yet forks implicitly from
//! master (spec.md §3). Reads walk the tree reachable from a commit and
//! never take the write lock.

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde_json::Value;

use crate::backend::ObjectBackend;
use crate::error::{Error, Result};
use crate::gc::GcStats;
use crate::hash::Hash;
use crate::head_cache::HeadCache;
use crate::path;
use crate::traversal::{self, FilterBy, WalkOptions};
use crate::types::{Commit, DiffEntry, NodeKind, Tree};

pub const DEFAULT_BRANCH: &str = "master";
const INITIAL_COMMIT_MESSAGE: &str = "Initial version";

/// options governing a single `put`
#[derive(Clone, Debug)]
pub struct PutOptions {
    pub branch: String,
    /// if `value` is a JSON object, recursively split it into one blob per
    /// leaf rather than storing it as a single blob at `key`
    pub flatten_keys: bool,
    /// accepted on the wire for client compatibility; has no effect on
    /// behavior. A shape collision (tree written over a blob path, or vice
    /// versa) is always replaced, never an error (spec.md §7 ConflictingShape).
    pub overwrite: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            flatten_keys: true,
            overwrite: false,
        }
    }
}

/// options governing a listing (`keys`/`entries`/`trees`)
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub branch: Option<String>,
    pub commit: Option<Hash>,
    pub pattern: Option<String>,
    pub min_level: Option<usize>,
    pub max_level: Option<usize>,
    pub depth_first: bool,
    pub filter_by: FilterBy,
}

pub struct Store {
    backend: Arc<dyn ObjectBackend>,
    write_lock: ReentrantMutex<()>,
    head_cache: HeadCache,
}

impl Store {
    /// open a store, creating its initial empty commit on `master` if the
    /// backend has no refs at all yet. `id` is this store's registry id,
    /// used to namespace its head-cache entries (spec.md §4.3).
    pub fn open(backend: Arc<dyn ObjectBackend>, id: impl Into<String>) -> Result<Self> {
        let store = Self {
            backend,
            write_lock: ReentrantMutex::new(()),
            head_cache: HeadCache::new(id),
        };
        if store.backend.list_refs()?.is_empty() {
            let _guard = store.write_lock.lock();
            store.init_locked()?;
        }
        Ok(store)
    }

    fn init_locked(&self) -> Result<()> {
        let empty_tree_hash = self.backend.write_tree(&Tree::empty())?;
        let commit = Commit::new(empty_tree_hash, vec![], "herodb", INITIAL_COMMIT_MESSAGE);
        let commit_hash = self.backend.write_commit(&commit)?;
        self.backend.write_ref(DEFAULT_BRANCH, &commit_hash)?;
        Ok(())
    }

    /// resolve a commit hash: explicit hash wins, else the named branch's head
    fn resolve_commit(&self, branch: Option<&str>, commit: Option<&Hash>) -> Result<Hash> {
        if let Some(hash) = commit {
            return Ok(*hash);
        }
        let branch = branch.unwrap_or(DEFAULT_BRANCH);
        self.backend
            .read_ref(branch)?
            .ok_or_else(|| Error::BranchNotFound(branch.to_string()))
    }

    fn root_tree_of(&self, commit_hash: &Hash) -> Result<Tree> {
        let commit = self.backend.read_commit(commit_hash)?;
        self.backend.read_tree(&commit.tree)
    }

    /// look up a single node by path within `root`, without reading the leaf
    /// blob. `cacheable` gates the head cache: true only for reads of
    /// master's current tip, never for snapshot-pinned or other-branch reads
    /// (spec.md §3, §5).
    fn lookup(&self, root: &Tree, key: &str, cacheable: bool) -> Result<Option<NodeKind>> {
        if key.is_empty() {
            // root itself; represented as a tree whose hash we don't have
            // without re-writing it, so callers needing the root specially
            // handle `key.is_empty()` before calling this.
            unreachable!("callers must special-case the root path");
        }
        if cacheable {
            if let Some(cached) = self.head_cache.get(key) {
                return Ok(Some(cached));
            }
        }
        let mut current = root.clone();
        let segments = path::segments(key);
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let Some(entry) = current.get(segment) else {
                return Ok(None);
            };
            prefix = path::child(&prefix, segment);
            if cacheable {
                self.head_cache.populate(&prefix, entry.kind);
            }
            if i == segments.len() - 1 {
                return Ok(Some(entry.kind));
            }
            match entry.kind {
                NodeKind::Tree(hash) => current = self.backend.read_tree(&hash)?,
                NodeKind::Blob(_) => return Ok(None),
            }
        }
        Ok(None)
    }

    /// evict `key`, everything cached beneath it, and every ancestor of
    /// `key` up to the root; called before publishing any commit that
    /// changes `key` (spec.md §4.1.2, §4.1.3, §4.3).
    fn evict_cached(&self, key: &str) {
        self.head_cache.invalidate_subtree(key);
        for ancestor in path::ancestors(key) {
            self.head_cache.invalidate(&ancestor);
        }
    }

    /// true when a read (no explicit commit, branch resolves to master) may
    /// consult/populate the head cache
    fn cacheable_read(branch: Option<&str>, commit: Option<&Hash>) -> bool {
        commit.is_none() && branch.unwrap_or(DEFAULT_BRANCH) == DEFAULT_BRANCH
    }

    /// read a value at `key` as of `branch`/`commit`. A blob deserializes to
    /// its JSON value; a tree recursively expands to a nested JSON object.
    /// `max_depth` (used by the `shallow` and `object_depth` HTTP params)
    /// truncates deeper trees to an empty object instead of fully expanding.
    pub fn get(
        &self,
        key: &str,
        branch: Option<&str>,
        commit: Option<&Hash>,
        max_depth: Option<usize>,
    ) -> Result<Value> {
        let commit_hash = self.resolve_commit(branch, commit)?;
        let root = self.root_tree_of(&commit_hash)?;
        let cacheable = Self::cacheable_read(branch, commit);

        let node = if key.is_empty() {
            NodeKind::Tree(self.backend.read_commit(&commit_hash)?.tree)
        } else {
            self.lookup(&root, key, cacheable)?
                .ok_or_else(|| Error::KeyNotFound(key.to_string()))?
        };
        self.expand(node, max_depth)
    }

    fn expand(&self, node: NodeKind, max_depth: Option<usize>) -> Result<Value> {
        match node {
            NodeKind::Blob(hash) => {
                let bytes = self.backend.read_blob(&hash)?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            NodeKind::Tree(hash) => {
                if max_depth == Some(0) {
                    return Ok(Value::Object(serde_json::Map::new()));
                }
                let tree = self.backend.read_tree(&hash)?;
                let mut object = serde_json::Map::new();
                for entry in tree.entries() {
                    let child_depth = max_depth.map(|d| d - 1);
                    object.insert(entry.name.clone(), self.expand(entry.kind, child_depth)?);
                }
                Ok(Value::Object(object))
            }
        }
    }

    /// write `value` at `key` on `branch`, committing the change
    pub fn put(&self, key: &str, value: Value, opts: &PutOptions) -> Result<Hash> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let _guard = self.write_lock.lock();
        self.put_locked(key, value, opts)
    }

    fn put_locked(&self, key: &str, value: Value, opts: &PutOptions) -> Result<Hash> {
        let branch_head = self.backend.read_ref(&opts.branch)?;
        let master_head = self
            .backend
            .read_ref(DEFAULT_BRANCH)?
            .ok_or_else(|| Error::BranchNotFound(DEFAULT_BRANCH.to_string()))?;

        // a branch with no ref yet forks implicitly from master: the new
        // commit's sole parent is master's tip (spec.md §3, §4.1.2).
        let (base_head, parents) = match branch_head {
            Some(head) => (head, vec![head]),
            None => (master_head, vec![master_head]),
        };
        let mut root = self.root_tree_of(&base_head)?;

        let leaves = flatten(key, value, opts.flatten_keys);
        for (leaf_key, leaf_value) in &leaves {
            let bytes = serde_json::to_vec(leaf_value)?;
            let blob_hash = self.backend.write_blob(&bytes)?;
            root = self.insert_leaf(root, leaf_key, blob_hash)?;
        }

        let root_hash = self.backend.write_tree(&root)?;
        let commit = Commit::new(root_hash, parents, "herodb", format!("Put {key}"));
        let commit_hash = self.backend.write_commit(&commit)?;
        self.backend.write_ref(&opts.branch, &commit_hash)?;
        for (leaf_key, _) in &leaves {
            self.evict_cached(leaf_key);
        }
        Ok(commit_hash)
    }

    /// insert a blob at `key` within `root`, building or replacing
    /// intermediate trees as needed. A node of the other shape found along
    /// the path (a leaf where a tree is needed, or vice versa) is always
    /// replaced, never an error (spec.md §3, §7 ConflictingShape).
    fn insert_leaf(&self, root: Tree, key: &str, blob_hash: Hash) -> Result<Tree> {
        let segments = path::segments(key);
        self.insert_at(&root, &segments, blob_hash)
    }

    fn insert_at(&self, tree: &Tree, segments: &[&str], blob_hash: Hash) -> Result<Tree> {
        let (name, rest) = segments.split_first().expect("non-empty key");
        if rest.is_empty() {
            return tree.with_entry(*name, NodeKind::Blob(blob_hash));
        }

        let child_tree = match tree.get(name) {
            Some(entry) => match entry.kind {
                NodeKind::Tree(hash) => self.backend.read_tree(&hash)?,
                NodeKind::Blob(_) => Tree::empty(),
            },
            None => Tree::empty(),
        };

        let updated_child = self.insert_at(&child_tree, rest, blob_hash)?;
        let child_hash = self.backend.write_tree(&updated_child)?;
        tree.with_entry(*name, NodeKind::Tree(child_hash))
    }

    /// remove `key` on `branch`, committing the change and pruning any
    /// ancestor trees left empty by the removal
    pub fn delete(&self, key: &str, branch: &str) -> Result<Hash> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let _guard = self.write_lock.lock();
        self.delete_locked(key, branch)
    }

    fn delete_locked(&self, key: &str, branch: &str) -> Result<Hash> {
        let branch_head = self.backend.read_ref(branch)?;

        let found_on_branch = match branch_head {
            Some(head) => {
                let root = self.root_tree_of(&head)?;
                self.lookup(&root, key, false)?.is_some()
            }
            None => false,
        };

        // present on the branch itself: delete there directly
        let (root, parents) = if found_on_branch {
            let head = branch_head.expect("found_on_branch implies a branch head");
            (self.root_tree_of(&head)?, vec![head])
        } else {
            // absent on branch (or the branch doesn't exist yet): fall back
            // to deleting from master, recording master's tip as a merge
            // parent (spec.md §4.1.3, §8 scenario 5)
            let master_head = self
                .backend
                .read_ref(DEFAULT_BRANCH)?
                .ok_or_else(|| Error::BranchNotFound(DEFAULT_BRANCH.to_string()))?;
            let master_root = self.root_tree_of(&master_head)?;
            if self.lookup(&master_root, key, false)?.is_none() {
                return Err(Error::KeyNotFound(key.to_string()));
            }
            let parents = match branch_head {
                Some(existing) if existing != master_head => vec![existing, master_head],
                _ => vec![master_head],
            };
            (master_root, parents)
        };

        let new_root = self.remove_at(&root, &path::segments(key))?;
        let root_hash = self.backend.write_tree(&new_root)?;
        let commit = Commit::new(root_hash, parents, "herodb", format!("Delete {key}"));
        let commit_hash = self.backend.write_commit(&commit)?;
        self.backend.write_ref(branch, &commit_hash)?;
        self.evict_cached(key);
        Ok(commit_hash)
    }

    fn remove_at(&self, tree: &Tree, segments: &[&str]) -> Result<Tree> {
        let (name, rest) = segments.split_first().expect("non-empty key");
        if rest.is_empty() {
            return Ok(tree.without_entry(name));
        }

        let Some(entry) = tree.get(name) else {
            return Ok(tree.clone());
        };
        let NodeKind::Tree(hash) = entry.kind else {
            return Ok(tree.clone());
        };

        let child_tree = self.backend.read_tree(&hash)?;
        let updated_child = self.remove_at(&child_tree, rest)?;
        if updated_child.is_empty() {
            Ok(tree.without_entry(name))
        } else {
            let child_hash = self.backend.write_tree(&updated_child)?;
            tree.with_entry(*name, NodeKind::Tree(child_hash))
        }
    }

    /// list the paths under `path`, per `opts`
    pub async fn keys(&self, path: &str, opts: &ListOptions) -> Result<Vec<String>> {
        let entries = self.walk(path, opts.filter_by, opts).await?;
        Ok(entries.into_iter().map(|e| e.path).collect())
    }

    /// list the (path, value) pairs of every leaf under `path`, per `opts`
    pub async fn entries(&self, path: &str, opts: &ListOptions) -> Result<Vec<(String, Value)>> {
        let entries = self.walk(path, FilterBy::LeavesOnly, opts).await?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push((entry.path, self.expand(entry.kind, None)?));
        }
        Ok(out)
    }

    /// expand `path` into a nested JSON object of everything beneath it
    pub fn trees(
        &self,
        path: &str,
        branch: Option<&str>,
        commit: Option<&Hash>,
        object_depth: Option<usize>,
    ) -> Result<Value> {
        self.get(path, branch, commit, object_depth)
    }

    async fn walk(
        &self,
        path: &str,
        filter_by: FilterBy,
        opts: &ListOptions,
    ) -> Result<Vec<traversal::WalkEntry>> {
        let commit_hash = self.resolve_commit(opts.branch.as_deref(), opts.commit.as_ref())?;
        let root = self.root_tree_of(&commit_hash)?;
        let cacheable = Self::cacheable_read(opts.branch.as_deref(), opts.commit.as_ref());

        let start = if path.is_empty() {
            NodeKind::Tree(self.backend.read_commit(&commit_hash)?.tree)
        } else {
            self.lookup(&root, path, cacheable)?
                .ok_or_else(|| Error::KeyNotFound(path.to_string()))?
        };

        let NodeKind::Tree(start_hash) = start else {
            return Err(Error::InvalidKey(format!("{path} is not a tree")));
        };

        let pattern = opts
            .pattern
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;

        let walk_opts = WalkOptions {
            pattern,
            min_level: opts.min_level,
            max_level: opts.max_level,
            depth_first: opts.depth_first,
            filter_by,
        };

        let cache = cacheable.then_some(&self.head_cache);
        traversal::walk(self.backend.as_ref(), start_hash, path, &walk_opts, cache).await
    }

    /// create a new branch pointing at the current head of `source`. A
    /// branch that already exists is left untouched (spec.md §4.1 table).
    pub fn create_branch(&self, name: &str, source: &str) -> Result<Hash> {
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.backend.read_ref(name)? {
            return Ok(existing);
        }
        let head = self
            .backend
            .read_ref(source)?
            .ok_or_else(|| Error::BranchNotFound(source.to_string()))?;
        self.backend.write_ref(name, &head)?;
        Ok(head)
    }

    pub fn branch_head(&self, branch: &str) -> Result<Hash> {
        self.resolve_commit(Some(branch), None)
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        self.backend.list_refs()
    }

    /// two-way, source-wins merge: every path that differs between `source`
    /// and `target` is taken from `source`; everything else is kept from
    /// `target`. This is not a three-way merge and never conflicts.
    pub fn merge(&self, source: &str, target: &str) -> Result<Hash> {
        let _guard = self.write_lock.lock();

        if target == DEFAULT_BRANCH {
            self.head_cache.clear();
        }
        if source == target {
            return Err(Error::InvalidArgument(format!(
                "cannot merge branch {source} into itself"
            )));
        }

        let source_head = self
            .backend
            .read_ref(source)?
            .ok_or_else(|| Error::BranchNotFound(source.to_string()))?;
        let target_head = self
            .backend
            .read_ref(target)?
            .ok_or_else(|| Error::BranchNotFound(target.to_string()))?;

        let source_commit = self.backend.read_commit(&source_head)?;
        let target_commit = self.backend.read_commit(&target_head)?;

        let changes = self
            .backend
            .diff_trees(Some(&target_commit.tree), Some(&source_commit.tree))?;

        let mut root = self.backend.read_tree(&target_commit.tree)?;
        let source_root = self.backend.read_tree(&source_commit.tree)?;
        for change in changes {
            match change.kind {
                crate::types::ChangeKind::Deleted => {
                    root = self.remove_at(&root, &path::segments(&change.path))?;
                }
                _ => {
                    if let Some(node) = self.lookup(&source_root, &change.path, false)? {
                        if let NodeKind::Blob(hash) = node {
                            root = self.insert_at(&root, &path::segments(&change.path), hash)?;
                        }
                    }
                }
            }
        }

        let root_hash = self.backend.write_tree(&root)?;
        let commit = Commit::new(
            root_hash,
            vec![target_head, source_head],
            "herodb",
            format!("Merge {source} to {target}"),
        );
        let commit_hash = self.backend.write_commit(&commit)?;
        self.backend.write_ref(target, &commit_hash)?;
        Ok(commit_hash)
    }

    pub fn diff(&self, from: &Hash, to: &Hash) -> Result<Vec<DiffEntry>> {
        let from_tree = self.backend.read_commit(from)?.tree;
        let to_tree = self.backend.read_commit(to)?.tree;
        self.backend.diff_trees(Some(&from_tree), Some(&to_tree))
    }

    pub fn gc(&self) -> Result<GcStats> {
        let _guard = self.write_lock.lock();
        self.backend.compact()
    }
}

/// turn a put's input value into a list of (full_key, leaf_value) pairs. If
/// `flatten` is false, or the value is not a JSON object, the whole value
/// is stored as a single leaf at `key`.
fn flatten(key: &str, value: Value, flatten: bool) -> Vec<(String, Value)> {
    if !flatten {
        return vec![(key.to_string(), value)];
    }
    match value {
        Value::Object(map) if !map.is_empty() => {
            let mut out = Vec::new();
            for (name, child) in map {
                out.extend(flatten(&path::child(key, &name), child, true));
            }
            out
        }
        other => vec![(key.to_string(), other)],
    }
}
