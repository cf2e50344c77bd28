//! # pawprint
//!
//! Multi-signal retrieval of catalog dog photos for a query photo.
//!
//! A query is described by an image embedding, its dominant coat color and
//! an optional breed label. pawprint pulls the nearest catalog entries by
//! embedding, scores their color (CIEDE2000) and breed agreement, applies
//! penalty rules and returns a ranked list.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! pawprint --catalog catalog.json.gz --query query.json --limit 20
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use pawprint::prelude::*;
//!
//! let store = CatalogStore::open("catalog.json.gz", None).unwrap();
//! let ranker = FusionRanker::new(store.snapshot());
//!
//! let query = QueryFeatures::new(
//!     vec![0.1, 0.2, 0.3 /* ... */],
//!     Rgb::new(196, 148, 92).to_lab(),
//!     Some("jindo".to_string()),
//! );
//! let results = ranker.rank(&query, &SearchOptions::default()).unwrap();
//! ```
//!
//! ## Crate Structure
//!
//! - `pawprint-core` - Catalog arrays, exact cosine k-NN, vectors, Lab colors
//! - `pawprint-similarity` - Color distance, breed aliases, fusion ranking
//! - `pawprint-storage` - Catalog files and hot-swappable catalog handle

// Re-export core types
pub use pawprint_core::{Catalog, CatalogArrays, CatalogEntry, Error, Lab, Neighbor, Result, Vector};

// Re-export ranking
pub use pawprint_similarity::{
    breed, color, Breed, BreedKey, ColorName, ConfigError, DropReason, DroppedCandidate,
    FeatureExtractor, FusionRanker, NoopTrace, QueryFeatures, RankTrace, RankedCandidate, Rgb,
    RuleMode, ScoreBreakdown, SearchOptions, SearchRules, SearchWeights, TraceLog,
};

// Re-export storage
pub use pawprint_storage::{CatalogSnapshotInfo, CatalogStore, SnapshotFormat};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, CatalogArrays, CatalogStore, ColorName, Error, FeatureExtractor, FusionRanker,
        Lab, QueryFeatures, RankedCandidate, Result, Rgb, RuleMode, SearchOptions, SearchRules,
        SearchWeights, TraceLog, Vector,
    };
}
