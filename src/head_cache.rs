//! per-store, per-path accelerator: caches the last-observed object (tree or
//! blob) at a path as of the store's master branch tip, so repeated master
//! reads of the same subtree can skip the per-segment tree walk. Keyed by
//! `"<store-id>/<path>"` per spec.md §4.3. Never consulted for non-master or
//! snapshot-pinned reads, and evicted for a path before any commit that
//! changes it is published.

use dashmap::DashMap;

use crate::types::NodeKind;

pub struct HeadCache {
    store_id: String,
    entries: DashMap<String, NodeKind>,
}

impl HeadCache {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            entries: DashMap::new(),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}/{}", self.store_id, path)
    }

    pub fn get(&self, path: &str) -> Option<NodeKind> {
        self.entries.get(&self.key(path)).map(|e| *e)
    }

    /// record `node` at `path`, but only if nothing is cached there yet —
    /// traversal/lookup populate opportunistically and must not clobber a
    /// fresher entry written by a concurrent eviction-then-repopulate.
    pub fn populate(&self, path: &str, node: NodeKind) {
        self.entries.entry(self.key(path)).or_insert(node);
    }

    pub fn invalidate(&self, path: &str) {
        self.entries.remove(&self.key(path));
    }

    /// evict `path` and every entry cached under it (a written path can
    /// restructure everything beneath it, stranding any cached descendants)
    pub fn invalidate_subtree(&self, path: &str) {
        let exact = self.key(path);
        let prefix = if path.is_empty() { exact.clone() } else { format!("{exact}/") };
        self.entries.retain(|k, _| *k != exact && !k.starts_with(&prefix));
    }

    /// evict every entry belonging to this store; used when a merge targets master
    pub fn clear(&self) {
        let prefix = format!("{}/", self.store_id);
        self.entries.retain(|k, _| !k.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;

    #[test]
    fn test_get_populate_invalidate() {
        let cache = HeadCache::new("store1");
        assert_eq!(cache.get("a/b"), None);
        cache.populate("a/b", NodeKind::Blob(Hash::ZERO));
        assert_eq!(cache.get("a/b"), Some(NodeKind::Blob(Hash::ZERO)));
        cache.invalidate("a/b");
        assert_eq!(cache.get("a/b"), None);
    }

    #[test]
    fn test_populate_does_not_overwrite_existing_entry() {
        let cache = HeadCache::new("store1");
        cache.populate("a", NodeKind::Blob(Hash::ZERO));
        cache.populate("a", NodeKind::Tree(Hash::ZERO));
        assert_eq!(cache.get("a"), Some(NodeKind::Blob(Hash::ZERO)));
    }

    #[test]
    fn test_invalidate_subtree_drops_path_and_descendants() {
        let cache = HeadCache::new("store1");
        cache.populate("a", NodeKind::Tree(Hash::ZERO));
        cache.populate("a/b", NodeKind::Blob(Hash::ZERO));
        cache.populate("a/bc", NodeKind::Blob(Hash::ZERO));
        cache.populate("x", NodeKind::Blob(Hash::ZERO));

        cache.invalidate_subtree("a");

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("a/b"), None);
        assert_eq!(cache.get("a/bc"), None);
        // a sibling whose name happens to share "a" as a prefix, not a
        // descendant, must survive
        assert_eq!(cache.get("x"), Some(NodeKind::Blob(Hash::ZERO)));
    }

    #[test]
    fn test_clear_only_evicts_this_stores_entries() {
        let a = HeadCache::new("store-a");
        let b = HeadCache::new("store-b");
        a.populate("x", NodeKind::Blob(Hash::ZERO));
        // two independent caches don't share storage, but the key format
        // still guards against collisions if one ever did
        assert_eq!(b.get("x"), None);
        a.clear();
        assert_eq!(a.get("x"), None);
    }
}
