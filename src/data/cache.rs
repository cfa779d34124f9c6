use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use once_cell::sync::Lazy;

use super::loader::load_file;
use super::model::EsgTable;

// ---------------------------------------------------------------------------
// Process-wide table cache
// ---------------------------------------------------------------------------

/// Loads the dataset once and hands out the same `Arc<EsgTable>` afterwards.
///
/// The lock is held for the duration of a load, so concurrent first callers
/// are serialised: exactly one of them parses the file and the others receive
/// its result. A failed load leaves the cache empty and the next call retries.
/// There is no eviction; [`TableCache::invalidate`] is the only way to drop
/// the table.
pub struct TableCache {
    slot: Mutex<Option<CachedTable>>,
    loader: fn(&Path) -> Result<EsgTable>,
}

struct CachedTable {
    path: PathBuf,
    table: Arc<EsgTable>,
}

static GLOBAL: Lazy<TableCache> = Lazy::new(TableCache::new);

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TableCache {
    pub fn new() -> Self {
        Self::with_loader(load_file)
    }

    /// Cache backed by a custom loader function.
    pub fn with_loader(loader: fn(&Path) -> Result<EsgTable>) -> Self {
        Self {
            slot: Mutex::new(None),
            loader,
        }
    }

    /// The cache shared by the whole process.
    pub fn global() -> &'static TableCache {
        &GLOBAL
    }

    /// Return the cached table for `path`, loading it on first use.
    ///
    /// Asking for a different path than the one cached replaces the entry.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<EsgTable>> {
        let mut slot = self.lock();
        if let Some(cached) = slot.as_ref() {
            if cached.path.as_path() == path {
                return Ok(Arc::clone(&cached.table));
            }
        }

        let table = Arc::new((self.loader)(path)?);
        log::info!("Loaded {} ESG records from {}", table.len(), path.display());
        *slot = Some(CachedTable {
            path: path.to_path_buf(),
            table: Arc::clone(&table),
        });
        Ok(table)
    }

    /// Drop the cached table; the next `get_or_load` re-reads the file.
    pub fn invalidate(&self) {
        if self.lock().take().is_some() {
            log::debug!("ESG table cache invalidated");
        }
    }

    /// A poisoned lock only means a loader panicked mid-way; the slot itself
    /// is still either empty or fully written.
    fn lock(&self) -> MutexGuard<'_, Option<CachedTable>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::data::model::tests::record;

    static LOADS: AtomicUsize = AtomicUsize::new(0);
    static RELOADS: AtomicUsize = AtomicUsize::new(0);
    static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_loader(_path: &Path) -> Result<EsgTable> {
        LOADS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]))
    }

    fn reload_counting_loader(_path: &Path) -> Result<EsgTable> {
        RELOADS.fetch_add(1, Ordering::SeqCst);
        Ok(EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]))
    }

    /// Fails on the first call and succeeds afterwards.
    fn flaky_loader(path: &Path) -> Result<EsgTable> {
        if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("cannot read {}", path.display());
        }
        Ok(EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]))
    }

    fn quick_loader(_path: &Path) -> Result<EsgTable> {
        Ok(EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]))
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let cache = Arc::new(TableCache::with_loader(counting_loader));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_load(Path::new("shared.csv")).unwrap()
                })
            })
            .collect();
        let tables: Vec<Arc<EsgTable>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(LOADS.load(Ordering::SeqCst), 1);
        assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let cache = TableCache::with_loader(reload_counting_loader);
        let path = Path::new("esg.csv");

        let first = cache.get_or_load(path).unwrap();
        let again = cache.get_or_load(path).unwrap();
        assert_eq!(RELOADS.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &again));

        cache.invalidate();
        let reloaded = cache.get_or_load(path).unwrap();
        assert_eq!(RELOADS.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &reloaded));
    }

    #[test]
    fn failed_load_caches_nothing() {
        let cache = TableCache::with_loader(flaky_loader);
        assert!(cache.get_or_load(Path::new("esg.csv")).is_err());
        assert!(cache.lock().is_none());

        assert!(cache.get_or_load(Path::new("esg.csv")).is_ok());
        assert_eq!(FLAKY_CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_path_returns_same_table() {
        let cache = TableCache::with_loader(quick_loader);
        let a = cache.get_or_load(Path::new("x.csv")).unwrap();
        let b = cache.get_or_load(Path::new("x.csv")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = cache.get_or_load(Path::new("y.csv")).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
