//! garbage collection: reclaim blobs/trees/commits unreachable from any ref,
//! plus the background sweep loop that runs it periodically across every
//! open store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::registry::Registry;

/// counts of objects removed by a single `compact()` pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct GcStats {
    pub blobs_removed: usize,
    pub trees_removed: usize,
    pub commits_removed: usize,
    pub bytes_freed: u64,
}

impl GcStats {
    pub fn total_removed(&self) -> usize {
        self.blobs_removed + self.trees_removed + self.commits_removed
    }
}

/// run `compact()` on every open store, once. Errors for individual stores
/// are logged and do not stop the sweep over the rest.
pub fn sweep_once(registry: &Registry) -> Vec<(String, GcStats)> {
    let mut results = Vec::new();
    for id in registry.store_ids() {
        let Some(store) = registry.get(&id) else {
            continue;
        };
        match store.gc() {
            Ok(stats) => {
                info!(store = %id, removed = stats.total_removed(), bytes_freed = stats.bytes_freed, "gc complete");
                results.push((id, stats));
            }
            Err(e) => {
                error!(store = %id, error = %e, "gc failed");
            }
        }
    }
    results
}

/// spawn the background gc thread: sleeps `interval`, then sweeps every open
/// store, forever. Mirrors the daemon thread in the original server's
/// `run_gc` loop. A zero interval disables the thread entirely (caller should
/// not spawn it).
pub fn spawn_background_gc(registry: Arc<Registry>, interval: Duration) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        sweep_once(&registry);
    })
}
