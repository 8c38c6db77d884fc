//! filtered tree walk used by `Store::keys`/`entries`/`trees`: depth- or
//! breadth-first, bounded by level, filtered by a regex pattern and/or a
//! leaf/branch selector. Mirrors `store.py`'s `_entries` generator.

use regex::Regex;

use crate::backend::ObjectBackend;
use crate::error::Result;
use crate::hash::Hash;
use crate::head_cache::HeadCache;
use crate::path;
use crate::types::NodeKind;

/// which entries a walk should yield
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterBy {
    #[default]
    All,
    LeavesOnly,
    TreesOnly,
}

#[derive(Clone, Debug)]
pub struct WalkOptions {
    pub pattern: Option<Regex>,
    /// exclusive lower bound: entries at this level or shallower are skipped
    pub min_level: Option<usize>,
    pub max_level: Option<usize>,
    pub depth_first: bool,
    pub filter_by: FilterBy,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            pattern: None,
            min_level: None,
            max_level: None,
            depth_first: true,
            filter_by: FilterBy::All,
        }
    }
}

/// a single result from a walk: full path plus the node found there
pub struct WalkEntry {
    pub path: String,
    pub kind: NodeKind,
}

/// walk the tree rooted at `root` (which lives at `base_path`), yielding
/// entries per `opts`. Cooperatively yields to the async runtime between
/// directory expansions so a large walk doesn't starve other tasks sharing
/// the same worker thread.
///
/// `cache`, when given, is opportunistically populated with every object
/// seen — callers pass it only for master reads that aren't pinned to an
/// explicit commit (spec.md §4.1.4).
pub async fn walk(
    backend: &dyn ObjectBackend,
    root: Hash,
    base_path: &str,
    opts: &WalkOptions,
    cache: Option<&HeadCache>,
) -> Result<Vec<WalkEntry>> {
    let mut out = Vec::new();
    let mut frontier = vec![(base_path.to_string(), root)];

    while let Some((path, hash)) = if opts.depth_first {
        frontier.pop()
    } else {
        (!frontier.is_empty()).then(|| frontier.remove(0))
    } {
        let tree = backend.read_tree(&hash)?;
        let mut children: Vec<(String, NodeKind)> = tree
            .entries()
            .iter()
            .map(|e| (path::child(&path, &e.name), e.kind))
            .collect();
        if opts.depth_first {
            // push in reverse so pop() visits them in forward (sorted) order
            children.reverse();
        }

        for (child_path, kind) in children {
            let level = path::level(&child_path);
            let within_min = opts.min_level.map_or(true, |min| level > min);
            let within_max = opts.max_level.map_or(true, |max| level <= max);
            let matches_pattern = opts
                .pattern
                .as_ref()
                .map_or(true, |re| re.is_match(&child_path));

            let matches_filter = match opts.filter_by {
                FilterBy::All => true,
                FilterBy::LeavesOnly => kind.is_blob(),
                FilterBy::TreesOnly => kind.is_tree(),
            };

            if let Some(cache) = cache {
                cache.populate(&child_path, kind);
            }

            if within_min && within_max && matches_pattern && matches_filter {
                out.push(WalkEntry {
                    path: child_path.clone(),
                    kind,
                });
            }

            if let NodeKind::Tree(next_hash) = kind {
                let worth_descending = opts.max_level.map_or(true, |max| level < max);
                if worth_descending {
                    frontier.push((child_path, next_hash));
                }
            }
        }

        tokio::task::yield_now().await;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::types::{Tree, TreeEntry};
    use tempfile::tempdir;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::init(dir.path().join("s.git")).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_walk_yields_all_leaves() {
        let (_dir, b) = backend();
        let blob = b.write_blob(b"1").unwrap();
        let inner = Tree::new(vec![TreeEntry::new("b", NodeKind::Blob(blob))]).unwrap();
        let inner_hash = b.write_tree(&inner).unwrap();
        let root = Tree::new(vec![
            TreeEntry::new("a", NodeKind::Blob(blob)),
            TreeEntry::new("dir", NodeKind::Tree(inner_hash)),
        ])
        .unwrap();
        let root_hash = b.write_tree(&root).unwrap();

        let results = walk(&b, root_hash, "", &WalkOptions::default(), None).await.unwrap();
        let mut paths: Vec<String> = results.iter().map(|e| e.path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["a".to_string(), "dir".to_string(), "dir/b".to_string()]);
    }

    #[tokio::test]
    async fn test_walk_leaves_only() {
        let (_dir, b) = backend();
        let blob = b.write_blob(b"1").unwrap();
        let inner = Tree::new(vec![TreeEntry::new("b", NodeKind::Blob(blob))]).unwrap();
        let inner_hash = b.write_tree(&inner).unwrap();
        let root = Tree::new(vec![TreeEntry::new("dir", NodeKind::Tree(inner_hash))]).unwrap();
        let root_hash = b.write_tree(&root).unwrap();

        let opts = WalkOptions {
            filter_by: FilterBy::LeavesOnly,
            ..Default::default()
        };
        let results = walk(&b, root_hash, "", &opts, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "dir/b");
    }

    #[tokio::test]
    async fn test_walk_min_level_exclusive() {
        let (_dir, b) = backend();
        let blob = b.write_blob(b"1").unwrap();
        let inner = Tree::new(vec![TreeEntry::new("b", NodeKind::Blob(blob))]).unwrap();
        let inner_hash = b.write_tree(&inner).unwrap();
        let root = Tree::new(vec![TreeEntry::new("dir", NodeKind::Tree(inner_hash))]).unwrap();
        let root_hash = b.write_tree(&root).unwrap();

        let opts = WalkOptions {
            min_level: Some(1),
            ..Default::default()
        };
        let results = walk(&b, root_hash, "", &opts, None).await.unwrap();
        let paths: Vec<String> = results.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec!["dir/b".to_string()]);
    }

    #[tokio::test]
    async fn test_walk_pattern_filter() {
        let (_dir, b) = backend();
        let blob = b.write_blob(b"1").unwrap();
        let root = Tree::new(vec![
            TreeEntry::new("keep", NodeKind::Blob(blob)),
            TreeEntry::new("skip", NodeKind::Blob(blob)),
        ])
        .unwrap();
        let root_hash = b.write_tree(&root).unwrap();

        let opts = WalkOptions {
            pattern: Some(Regex::new("^keep$").unwrap()),
            ..Default::default()
        };
        let results = walk(&b, root_hash, "", &opts, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "keep");
    }
}
