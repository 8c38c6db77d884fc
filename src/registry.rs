//! process-wide table of open stores, keyed by store id. Stores are opened
//! lazily on first access and kept open for the life of the process,
//! mirroring the original server's module-level `stores` dict.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::LocalBackend;
use crate::error::{Error, Result};
use crate::store::Store;

pub struct Registry {
    stores_root: PathBuf,
    open: DashMap<String, Arc<Store>>,
}

impl Registry {
    pub fn new(stores_root: impl Into<PathBuf>) -> Self {
        Self {
            stores_root: stores_root.into(),
            open: DashMap::new(),
        }
    }

    fn store_dir(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains('/') || id.contains("..") {
            return Err(Error::InvalidArgument(format!("invalid store id: {id}")));
        }
        Ok(self.stores_root.join(format!("{id}.git")))
    }

    /// get (opening and/or creating on disk as needed) the store for `id`
    pub fn get_or_create(&self, id: &str) -> Result<Arc<Store>> {
        if let Some(store) = self.open.get(id) {
            return Ok(store.clone());
        }

        let dir = self.store_dir(id)?;
        let backend = if dir.join("objects").is_dir() {
            LocalBackend::open(&dir)?
        } else {
            LocalBackend::init(&dir)?
        };
        let store = Arc::new(Store::open(Arc::new(backend), id)?);
        self.open.insert(id.to_string(), store.clone());
        Ok(store)
    }

    /// get a store only if it's already open; used by the background gc
    /// sweep, which shouldn't open stores nobody has touched yet
    pub fn get(&self, id: &str) -> Option<Arc<Store>> {
        self.open.get(id).map(|s| s.clone())
    }

    pub fn store_ids(&self) -> Vec<String> {
        self.open.iter().map(|e| e.key().clone()).collect()
    }

    /// every store id that exists on disk, whether or not it's open
    pub fn list_on_disk(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.stores_root.is_dir() {
            return Ok(ids);
        }
        for entry in std::fs::read_dir(&self.stores_root).map_err(|e| Error::Io {
            path: self.stores_root.clone(),
            source: e,
        })? {
            let entry = entry.map_err(|e| Error::Io {
                path: self.stores_root.clone(),
                source: e,
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".git") {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn stores_root(&self) -> &Path {
        &self.stores_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_or_create_opens_lazily_and_caches() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path());
        assert!(registry.get("alpha").is_none());

        let store1 = registry.get_or_create("alpha").unwrap();
        let store2 = registry.get_or_create("alpha").unwrap();
        assert!(Arc::ptr_eq(&store1, &store2));
    }

    #[test]
    fn test_invalid_store_id_rejected() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path());
        assert!(registry.get_or_create("../escape").is_err());
        assert!(registry.get_or_create("").is_err());
    }

    #[test]
    fn test_list_on_disk() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.get_or_create("alpha").unwrap();
        registry.get_or_create("beta").unwrap();
        assert_eq!(registry.list_on_disk().unwrap(), vec!["alpha".to_string(), "beta".to_string()]);
    }
}
