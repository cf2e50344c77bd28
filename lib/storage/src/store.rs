use crate::snapshot::{load_catalog, CatalogSnapshotInfo};
use anyhow::Result;
use pawprint_core::Catalog;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Holds the live catalog and replaces it as a whole.
///
/// Requests take an `Arc` with [`snapshot`](Self::snapshot) and keep
/// ranking against it even if a swap happens meanwhile. The lock is held
/// only long enough to clone or replace the `Arc`.
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
    info: RwLock<Option<CatalogSnapshotInfo>>,
    version: AtomicU64,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            info: RwLock::new(None),
            version: AtomicU64::new(1),
        }
    }

    /// Load the initial catalog from a file
    pub fn open<P: AsRef<Path>>(path: P, expected_checksum: Option<&str>) -> Result<Self> {
        let (catalog, info) = load_catalog(path, expected_checksum)?;
        let store = Self::new(catalog);
        *store.info.write() = Some(info);
        Ok(store)
    }

    /// The catalog currently in service
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Incremented on every swap, starting at 1
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Description of the file the live catalog came from, if any
    pub fn info(&self) -> Option<CatalogSnapshotInfo> {
        self.info.read().clone()
    }

    /// Put `catalog` into service and return the new version
    pub fn swap(&self, catalog: Catalog) -> u64 {
        self.install(catalog, None)
    }

    /// Load a catalog file and put it into service. On any error the live
    /// catalog stays as it was.
    pub fn reload<P: AsRef<Path>>(&self, path: P, expected_checksum: Option<&str>) -> Result<u64> {
        let path = path.as_ref();
        match load_catalog(path, expected_checksum) {
            Ok((catalog, info)) => Ok(self.install(catalog, Some(info))),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "catalog reload failed, keeping current catalog");
                Err(e)
            }
        }
    }

    fn install(&self, catalog: Catalog, info: Option<CatalogSnapshotInfo>) -> u64 {
        let rows = catalog.len();
        let next = Arc::new(catalog);
        let version = {
            let mut current = self.current.write();
            *current = next;
            *self.info.write() = info;
            self.version.fetch_add(1, Ordering::AcqRel) + 1
        };
        info!(version, rows, "catalog swapped");
        version
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new(Catalog::empty())
    }
}
