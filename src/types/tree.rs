use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;

/// a tree entry is either a leaf blob or a nested tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Blob(Hash),
    Tree(Hash),
}

impl NodeKind {
    pub fn hash(&self) -> Hash {
        match self {
            NodeKind::Blob(h) | NodeKind::Tree(h) => *h,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, NodeKind::Tree(_))
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, NodeKind::Blob(_))
    }
}

/// a named entry within a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub kind: NodeKind,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// a directory-like node: a sorted, deduplicated set of named entries
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// build a tree from entries, validating names and sorting for deterministic hashing
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            if entry.name.is_empty() || entry.name.contains('/') || entry.name.contains('\0') {
                return Err(Error::InvalidKey(entry.name.clone()));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::InvalidArgument(format!(
                    "duplicate tree entry name: {}",
                    window[0].name
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        // small fan-out per directory in practice; linear scan is fine and
        // keeps entries sorted-by-name without a second index to keep in sync
        self.entries.iter().find(|e| e.name == name)
    }

    /// return a copy of this tree with `name` inserted or replaced
    pub fn with_entry(&self, name: impl Into<String>, kind: NodeKind) -> Result<Self> {
        let name = name.into();
        let mut entries: Vec<TreeEntry> = self
            .entries
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        entries.push(TreeEntry::new(name, kind));
        Tree::new(entries)
    }

    /// return a copy of this tree with `name` removed (no-op if absent)
    pub fn without_entry(&self, name: &str) -> Self {
        Self {
            entries: self.entries.iter().filter(|e| e.name != name).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_sorted_and_deduped() {
        let tree = Tree::new(vec![
            TreeEntry::new("b", NodeKind::Blob(Hash::ZERO)),
            TreeEntry::new("a", NodeKind::Blob(Hash::ZERO)),
        ])
        .unwrap();
        assert_eq!(tree.entries()[0].name, "a");
        assert_eq!(tree.entries()[1].name, "b");
    }

    #[test]
    fn test_tree_rejects_duplicates() {
        let result = Tree::new(vec![
            TreeEntry::new("a", NodeKind::Blob(Hash::ZERO)),
            TreeEntry::new("a", NodeKind::Tree(Hash::ZERO)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tree_rejects_invalid_names() {
        assert!(Tree::new(vec![TreeEntry::new("a/b", NodeKind::Blob(Hash::ZERO))]).is_err());
        assert!(Tree::new(vec![TreeEntry::new("", NodeKind::Blob(Hash::ZERO))]).is_err());
    }

    #[test]
    fn test_with_and_without_entry() {
        let tree = Tree::empty();
        let tree = tree.with_entry("a", NodeKind::Blob(Hash::ZERO)).unwrap();
        assert!(tree.get("a").is_some());

        let replaced = tree.with_entry("a", NodeKind::Tree(Hash::ZERO)).unwrap();
        assert!(replaced.get("a").unwrap().kind.is_tree());

        let removed = replaced.without_entry("a");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_cbor_roundtrip() {
        let tree = Tree::new(vec![
            TreeEntry::new("file", NodeKind::Blob(Hash::ZERO)),
            TreeEntry::new("dir", NodeKind::Tree(Hash::ZERO)),
        ])
        .unwrap();

        let mut bytes = Vec::new();
        ciborium::into_writer(&tree, &mut bytes).unwrap();
        let parsed: Tree = ciborium::from_reader(&bytes[..]).unwrap();
        assert_eq!(tree, parsed);
    }
}
