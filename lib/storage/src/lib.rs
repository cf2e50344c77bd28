pub mod snapshot;
pub mod store;

pub use snapshot::{
    checksum, load_catalog, read_arrays, save_arrays, CatalogSnapshotInfo, SnapshotFormat,
};
pub use store::CatalogStore;
