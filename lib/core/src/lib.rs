//! # pawprint Core
//!
//! Core data structures for pawprint:
//!
//! - [`Vector`] - Dense embedding vector
//! - [`Lab`] - CIE L*a*b* color triple
//! - [`CatalogArrays`] - The persisted, index-aligned catalog columns
//! - [`Catalog`] - Read-only catalog with exact cosine k-NN search
//!
//! ## Example
//!
//! ```rust
//! use pawprint_core::{Catalog, CatalogArrays, Lab};
//!
//! let mut arrays = CatalogArrays::new();
//! arrays.push(1, vec![1.0, 0.0, 0.0], Lab::new(60.0, 10.0, 30.0), "jindo");
//! arrays.push(2, vec![0.0, 1.0, 0.0], Lab::new(20.0, 0.0, 0.0), "mix");
//!
//! let catalog = Catalog::load(arrays).unwrap();
//! let hits = catalog.search(&[0.9, 0.1, 0.0], 10).unwrap();
//! assert_eq!(catalog.get(hits[0].row).unwrap().id, 1);
//! ```

pub mod catalog;
pub mod error;
pub mod lab;
pub mod vector;

/// Inner-product and norm kernels used by the catalog scan
pub mod simd;

pub use catalog::{Catalog, CatalogArrays, CatalogEntry, Neighbor};
pub use error::{Error, Result};
pub use lab::Lab;
pub use vector::Vector;
