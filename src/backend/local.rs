use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::backend::ObjectBackend;
use crate::error::{Error, IoResultExt, Result};
use crate::gc::GcStats;
use crate::hash::Hash;
use crate::types::{ChangeKind, Commit, DiffEntry, Tree};

/// filesystem-backed object store, laid out like a bare git repository:
///
/// ```text
/// <root>/
///   objects/blobs/<xx>/<62 hex chars>
///   objects/trees/<xx>/<62 hex chars>
///   objects/commits/<xx>/<62 hex chars>
///   refs/heads/<branch>
///   tmp/
/// ```
///
/// writes are atomic: content lands in `tmp/` under a random name, then is
/// renamed into place; the parent directory is fsynced afterward so a crash
/// never observes a half-written object.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// open an existing store directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join("objects").is_dir() {
            return Err(Error::StoreNotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// initialize a new, empty store directory
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.join("objects").is_dir() {
            return Err(Error::StoreExists(root.display().to_string()));
        }
        fs::create_dir_all(root.join("objects/blobs")).with_path(&root)?;
        fs::create_dir_all(root.join("objects/trees")).with_path(&root)?;
        fs::create_dir_all(root.join("objects/commits")).with_path(&root)?;
        fs::create_dir_all(root.join("refs/heads")).with_path(&root)?;
        fs::create_dir_all(root.join("tmp")).with_path(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blobs_path(&self) -> PathBuf {
        self.root.join("objects/blobs")
    }

    fn trees_path(&self) -> PathBuf {
        self.root.join("objects/trees")
    }

    fn commits_path(&self) -> PathBuf {
        self.root.join("objects/commits")
    }

    fn refs_path(&self) -> PathBuf {
        self.root.join("refs/heads")
    }

    fn tmp_path(&self) -> PathBuf {
        self.root.join("tmp")
    }

    fn object_path(dir: &Path, hash: &Hash) -> PathBuf {
        let (prefix, rest) = hash.to_path_components();
        dir.join(prefix).join(rest)
    }

    /// write raw bytes to `dir/<fan-out of hash>`, skipping if already present
    fn write_object(&self, dir: &Path, hash: &Hash, bytes: &[u8]) -> Result<()> {
        let path = Self::object_path(dir, hash);
        if path.exists() {
            return Ok(());
        }
        let parent = path.parent().expect("object path always has a parent");
        fs::create_dir_all(parent).with_path(parent)?;

        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(bytes).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        fs::rename(&tmp_path, &path).with_path(&path)?;

        let dir_file = File::open(parent).with_path(parent)?;
        dir_file.sync_all().with_path(parent)?;
        Ok(())
    }

    fn read_object(dir: &Path, hash: &Hash) -> Result<Vec<u8>> {
        let path = Self::object_path(dir, hash);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ObjectNotFound(*hash)
            } else {
                Error::Io { path, source: e }
            }
        })
    }

    fn validate_ref_name(name: &str) -> Result<()> {
        if name.is_empty() || name.starts_with('/') || name.ends_with('/') || name.contains("//")
        {
            return Err(Error::InvalidBranch(name.to_string()));
        }
        if name.split('/').any(|c| c == "." || c == "..") || name.contains('\0') {
            return Err(Error::InvalidBranch(name.to_string()));
        }
        Ok(())
    }
}

impl ObjectBackend for LocalBackend {
    fn read_blob(&self, hash: &Hash) -> Result<Vec<u8>> {
        Self::read_object(&self.blobs_path(), hash)
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = Hash::of(bytes);
        self.write_object(&self.blobs_path(), &hash, bytes)?;
        Ok(hash)
    }

    fn read_tree(&self, hash: &Hash) -> Result<Tree> {
        let compressed = Self::read_object(&self.trees_path(), hash)?;
        decode_compressed(&compressed, hash)
    }

    fn write_tree(&self, tree: &Tree) -> Result<Hash> {
        let (compressed, hash) = encode_compressed(tree)?;
        self.write_object(&self.trees_path(), &hash, &compressed)?;
        Ok(hash)
    }

    fn read_commit(&self, hash: &Hash) -> Result<Commit> {
        let compressed = Self::read_object(&self.commits_path(), hash)?;
        decode_compressed(&compressed, hash)
    }

    fn write_commit(&self, commit: &Commit) -> Result<Hash> {
        let (compressed, hash) = encode_compressed(commit)?;
        self.write_object(&self.commits_path(), &hash, &compressed)?;
        Ok(hash)
    }

    fn read_ref(&self, name: &str) -> Result<Option<Hash>> {
        Self::validate_ref_name(name)?;
        let path = self.refs_path().join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(Hash::from_hex(content.trim())?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io { path, source: e }),
        }
    }

    fn write_ref(&self, name: &str, hash: &Hash) -> Result<()> {
        Self::validate_ref_name(name)?;
        let path = self.refs_path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            writeln!(tmp_file, "{}", hash.to_hex()).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        fs::rename(&tmp_path, &path).with_path(&path)?;

        if let Some(parent) = path.parent() {
            let dir = File::open(parent).with_path(parent)?;
            dir.sync_all().with_path(parent)?;
        }
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        Self::validate_ref_name(name)?;
        let path = self.refs_path().join(name);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BranchNotFound(name.to_string())
            } else {
                Error::Io { path, source: e }
            }
        })
    }

    fn list_refs(&self) -> Result<Vec<String>> {
        let base = self.refs_path();
        let mut refs = Vec::new();
        if base.is_dir() {
            collect_refs(&base, &base, &mut refs)?;
        }
        refs.sort();
        Ok(refs)
    }

    fn diff_trees(&self, from: Option<&Hash>, to: Option<&Hash>) -> Result<Vec<DiffEntry>> {
        let mut changes = Vec::new();
        self.diff_trees_at(from, to, "", &mut changes)?;
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }

    fn compact(&self) -> Result<GcStats> {
        let mut reachable_blobs = HashSet::new();
        let mut reachable_trees = HashSet::new();
        let mut reachable_commits = HashSet::new();

        for name in self.list_refs()? {
            if let Some(head) = self.read_ref(&name)? {
                self.mark_commit(&head, &mut reachable_blobs, &mut reachable_trees, &mut reachable_commits)?;
            }
        }

        let mut stats = GcStats::default();
        sweep(&self.blobs_path(), &reachable_blobs, &mut stats.blobs_removed, &mut stats.bytes_freed)?;
        sweep(&self.trees_path(), &reachable_trees, &mut stats.trees_removed, &mut stats.bytes_freed)?;
        sweep(&self.commits_path(), &reachable_commits, &mut stats.commits_removed, &mut stats.bytes_freed)?;
        Ok(stats)
    }
}

impl LocalBackend {
    fn mark_commit(
        &self,
        hash: &Hash,
        blobs: &mut HashSet<Hash>,
        trees: &mut HashSet<Hash>,
        commits: &mut HashSet<Hash>,
    ) -> Result<()> {
        if !commits.insert(*hash) {
            return Ok(());
        }
        let commit = self.read_commit(hash)?;
        self.mark_tree(&commit.tree, blobs, trees)?;
        for parent in &commit.parents {
            self.mark_commit(parent, blobs, trees, commits)?;
        }
        Ok(())
    }

    fn mark_tree(&self, hash: &Hash, blobs: &mut HashSet<Hash>, trees: &mut HashSet<Hash>) -> Result<()> {
        if !trees.insert(*hash) {
            return Ok(());
        }
        let tree = self.read_tree(hash)?;
        for entry in tree.entries() {
            match entry.kind {
                crate::types::NodeKind::Blob(h) => {
                    blobs.insert(h);
                }
                crate::types::NodeKind::Tree(h) => {
                    self.mark_tree(&h, blobs, trees)?;
                }
            }
        }
        Ok(())
    }

    fn diff_trees_at(
        &self,
        from: Option<&Hash>,
        to: Option<&Hash>,
        prefix: &str,
        out: &mut Vec<DiffEntry>,
    ) -> Result<()> {
        if from == to {
            return Ok(());
        }

        let t1 = from.map(|h| self.read_tree(h)).transpose()?.unwrap_or_default();
        let t2 = to.map(|h| self.read_tree(h)).transpose()?.unwrap_or_default();

        let mut names: Vec<&str> = t1
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .chain(t2.entries().iter().map(|e| e.name.as_str()))
            .collect();
        names.sort();
        names.dedup();

        for name in names {
            let path = crate::path::child(prefix, name);
            let e1 = t1.get(name);
            let e2 = t2.get(name);

            match (e1, e2) {
                (None, Some(entry)) => {
                    out.push(DiffEntry { path: path.clone(), kind: ChangeKind::Added });
                    if let crate::types::NodeKind::Tree(h) = entry.kind {
                        self.diff_trees_at(None, Some(&h), &path, out)?;
                    }
                }
                (Some(entry), None) => {
                    out.push(DiffEntry { path: path.clone(), kind: ChangeKind::Deleted });
                    if let crate::types::NodeKind::Tree(h) = entry.kind {
                        self.diff_trees_at(Some(&h), None, &path, out)?;
                    }
                }
                (Some(a), Some(b)) => match (a.kind, b.kind) {
                    (crate::types::NodeKind::Tree(h1), crate::types::NodeKind::Tree(h2)) => {
                        if h1 != h2 {
                            self.diff_trees_at(Some(&h1), Some(&h2), &path, out)?;
                        }
                    }
                    (crate::types::NodeKind::Blob(h1), crate::types::NodeKind::Blob(h2)) => {
                        if h1 != h2 {
                            out.push(DiffEntry { path, kind: ChangeKind::Modified });
                        }
                    }
                    _ => {
                        // blob <-> tree shape change: treat as delete+add
                        out.push(DiffEntry { path, kind: ChangeKind::Modified });
                    }
                },
                (None, None) => unreachable!(),
            }
        }
        Ok(())
    }
}

fn encode_compressed<T: serde::Serialize>(value: &T) -> Result<(Vec<u8>, Hash)> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(value, &mut cbor_bytes)?;
    let compressed = zstd::encode_all(&cbor_bytes[..], 3).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;
    let hash = Hash::of(&compressed);
    Ok((compressed, hash))
}

fn decode_compressed<T: serde::de::DeserializeOwned>(compressed: &[u8], expected: &Hash) -> Result<T> {
    let actual = Hash::of(compressed);
    if actual != *expected {
        return Err(Error::CorruptObject(*expected));
    }
    let cbor_bytes = zstd::decode_all(compressed).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;
    Ok(ciborium::from_reader(&cbor_bytes[..])?)
}

fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();
        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            refs.push(rel.to_string_lossy().to_string());
        }
    }
    Ok(())
}

fn sweep(dir: &Path, reachable: &HashSet<Hash>, removed: &mut usize, bytes_freed: &mut u64) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(dir).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| Error::Io {
            path: dir.to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("walkdir error")),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let parent_name = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).unwrap_or("");
        let hex = format!("{}{}", parent_name, file_name);
        if let Ok(hash) = Hash::from_hex(&hex) {
            if !reachable.contains(&hash) {
                let meta = fs::metadata(path).with_path(path)?;
                *bytes_freed += meta.len();
                *removed += 1;
                fs::remove_file(path).with_path(path)?;
            }
        }
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io {
            path: dir.to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("walkdir error")),
        })?;
        if entry.file_type().is_dir() {
            let _ = fs::remove_dir(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeKind, TreeEntry};
    use tempfile::tempdir;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::init(dir.path().join("store.git")).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_blob_roundtrip_and_dedup() {
        let (_dir, b) = backend();
        let h1 = b.write_blob(b"hello").unwrap();
        let h2 = b.write_blob(b"hello").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(b.read_blob(&h1).unwrap(), b"hello");
    }

    #[test]
    fn test_read_missing_blob() {
        let (_dir, b) = backend();
        let result = b.read_blob(&Hash::ZERO);
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_tree_roundtrip() {
        let (_dir, b) = backend();
        let tree = Tree::new(vec![TreeEntry::new("a", NodeKind::Blob(Hash::ZERO))]).unwrap();
        let hash = b.write_tree(&tree).unwrap();
        assert_eq!(b.read_tree(&hash).unwrap(), tree);
    }

    #[test]
    fn test_corrupt_tree_detected() {
        let (dir, b) = backend();
        let tree = Tree::new(vec![TreeEntry::new("a", NodeKind::Blob(Hash::ZERO))]).unwrap();
        let hash = b.write_tree(&tree).unwrap();

        let (prefix, rest) = hash.to_path_components();
        let path = dir.path().join("store.git/objects/trees").join(prefix).join(rest);
        fs::write(&path, b"garbage").unwrap();

        let result = b.read_tree(&hash);
        assert!(matches!(result, Err(Error::CorruptObject(_))));
    }

    #[test]
    fn test_ref_roundtrip() {
        let (_dir, b) = backend();
        assert_eq!(b.read_ref("master").unwrap(), None);
        b.write_ref("master", &Hash::ZERO).unwrap();
        assert_eq!(b.read_ref("master").unwrap(), Some(Hash::ZERO));
    }

    #[test]
    fn test_list_refs() {
        let (_dir, b) = backend();
        b.write_ref("master", &Hash::ZERO).unwrap();
        b.write_ref("feature/x", &Hash::ZERO).unwrap();
        let refs = b.list_refs().unwrap();
        assert_eq!(refs, vec!["feature/x".to_string(), "master".to_string()]);
    }

    #[test]
    fn test_invalid_ref_names_rejected() {
        let (_dir, b) = backend();
        assert!(b.write_ref("", &Hash::ZERO).is_err());
        assert!(b.write_ref("/abs", &Hash::ZERO).is_err());
        assert!(b.write_ref("a/../b", &Hash::ZERO).is_err());
    }

    #[test]
    fn test_diff_trees_added_modified_deleted() {
        let (_dir, b) = backend();
        let h_a = b.write_blob(b"a").unwrap();
        let h_b = b.write_blob(b"b").unwrap();
        let h_c = b.write_blob(b"c").unwrap();

        let t1 = Tree::new(vec![
            TreeEntry::new("keep", NodeKind::Blob(h_a)),
            TreeEntry::new("gone", NodeKind::Blob(h_b)),
        ])
        .unwrap();
        let t2 = Tree::new(vec![
            TreeEntry::new("keep", NodeKind::Blob(h_c)),
            TreeEntry::new("new", NodeKind::Blob(h_b)),
        ])
        .unwrap();

        let h1 = b.write_tree(&t1).unwrap();
        let h2 = b.write_tree(&t2).unwrap();

        let diff = b.diff_trees(Some(&h1), Some(&h2)).unwrap();
        assert_eq!(diff.len(), 3);
        assert!(diff.iter().any(|d| d.path == "keep" && d.kind == ChangeKind::Modified));
        assert!(diff.iter().any(|d| d.path == "gone" && d.kind == ChangeKind::Deleted));
        assert!(diff.iter().any(|d| d.path == "new" && d.kind == ChangeKind::Added));
    }

    #[test]
    fn test_compact_removes_unreachable() {
        let (_dir, b) = backend();
        let h = b.write_blob(b"orphan").unwrap();
        let tree = Tree::new(vec![TreeEntry::new("x", NodeKind::Blob(h))]).unwrap();
        let tree_hash = b.write_tree(&tree).unwrap();
        let commit = Commit::new(tree_hash, vec![], "author", "msg");
        let commit_hash = b.write_commit(&commit).unwrap();
        b.write_ref("master", &commit_hash).unwrap();

        // orphan a second blob/tree/commit unreachable from any ref
        let orphan_blob = b.write_blob(b"unreachable").unwrap();
        let orphan_tree = Tree::new(vec![TreeEntry::new("y", NodeKind::Blob(orphan_blob))]).unwrap();
        b.write_tree(&orphan_tree).unwrap();

        let stats = b.compact().unwrap();
        assert!(stats.blobs_removed >= 1);
        assert!(stats.trees_removed >= 1);
        assert!(b.read_blob(&h).is_ok());
    }
}
