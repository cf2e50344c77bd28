//! # Pawprint Similarity
//!
//! Fusion re-ranking of catalog candidates for a dog photo query.
//!
//! A query carries three signals: an image embedding, the dominant coat
//! color in CIE Lab, and an optional breed label. The catalog supplies the
//! nearest neighbors by embedding; this crate scores each of them for color
//! closeness (CIEDE2000 through a Gaussian kernel) and breed agreement,
//! applies penalty rules, and returns a ranked list.
//!
//! ## Example
//!
//! ```rust
//! use pawprint_core::{Catalog, CatalogArrays, Lab};
//! use pawprint_similarity::{FusionRanker, QueryFeatures, SearchOptions};
//! use std::sync::Arc;
//!
//! let mut arrays = CatalogArrays::new();
//! arrays.push(1, vec![1.0, 0.0], Lab::new(65.0, 15.0, 35.0), "jindo");
//! arrays.push(2, vec![0.0, 1.0], Lab::new(20.0, 0.0, 0.0), "mix");
//! let catalog = Arc::new(Catalog::load(arrays).unwrap());
//!
//! let ranker = FusionRanker::new(catalog);
//! let query = QueryFeatures::new(
//!     vec![1.0, 0.0],
//!     Lab::new(64.0, 14.0, 33.0),
//!     Some("Jindo-dog".to_string()),
//! );
//! let results = ranker.rank(&query, &SearchOptions::default()).unwrap();
//! assert_eq!(results[0].id, 1);
//! assert_eq!(results[0].rank, 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  Extractor  │────>│   Query     │
//! │  (models)   │     │  Features   │
//! └─────────────┘     └─────────────┘
//!                            │
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Catalog   │────>│   Fusion    │<────│  Color /    │
//! │  (top-k)    │     │   Ranker    │     │  Breed      │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                     ┌─────────────┐
//!                     │   Ranked    │
//!                     │  (+ trace)  │
//!                     └─────────────┘
//! ```

pub mod breed;
pub mod color;
pub mod config;
pub mod query;
pub mod rerank;
pub mod trace;

// Re-export main types for convenience
pub use breed::{Breed, BreedKey};
pub use color::{delta_e_2000, is_measurable, similarity_from_delta_e, to_lab, ColorName, Rgb};
pub use config::{
    ConfigError, RuleMode, SearchOptions, SearchRules, SearchWeights, BREED_MISMATCH_PENALTY,
    COLOR_MISMATCH_PENALTY, DEFAULT_CANDIDATES, DEFAULT_LIMIT,
};
pub use query::{FeatureExtractor, QueryFeatures};
pub use rerank::{FusionRanker, RankedCandidate};
pub use trace::{DropReason, DroppedCandidate, NoopTrace, RankTrace, ScoreBreakdown, TraceLog};
