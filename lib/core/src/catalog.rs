//! The read-only reference catalog and its exact cosine k-NN search.
//!
//! A [`Catalog`] is built once from four index-aligned arrays and never
//! mutated afterwards, so a single instance can be shared across threads
//! behind an `Arc` without locking. Refreshing the catalog means building a
//! new one and swapping the pointer.

use crate::lab::Lab;
use crate::simd::dot;
use crate::vector::{normalize_in_place, UNIT_NORM_TOLERANCE};
use crate::{Error, Result};
use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use tracing::{info, warn};

/// The persisted form of a catalog: parallel arrays where row `i` of every
/// column describes the same reference image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogArrays {
    pub ids: Vec<u64>,
    pub embeddings: Vec<Vec<f32>>,
    pub labs: Vec<Lab>,
    pub breeds: Vec<String>,
}

impl CatalogArrays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, taken from the id column
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append one aligned row
    pub fn push(&mut self, id: u64, embedding: Vec<f32>, lab: Lab, breed: impl Into<String>) {
        self.ids.push(id);
        self.embeddings.push(embedding);
        self.labs.push(lab);
        self.breeds.push(breed.into());
    }
}

/// A borrowed view of one catalog row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry<'a> {
    pub row: usize,
    pub id: u64,
    pub embedding: &'a [f32],
    pub lab: Lab,
    pub breed: &'a str,
}

/// One k-NN hit: the catalog row and its cosine similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub similarity: f32,
}

/// Best similarity first; equal similarities fall back to row order
#[inline]
fn by_rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    (Reverse(OrderedFloat(a.similarity)), a.row).cmp(&(Reverse(OrderedFloat(b.similarity)), b.row))
}

/// Immutable catalog index
#[derive(Debug, Clone)]
pub struct Catalog {
    dim: usize,
    ids: Vec<u64>,
    /// Row-major, `dim` floats per row, every row L2-normalized
    embeddings: Vec<f32>,
    labs: Vec<Lab>,
    breeds: Vec<String>,
    rows_by_id: AHashMap<u64, usize>,
}

impl Catalog {
    /// Validate and index a set of persisted arrays.
    ///
    /// Fails with [`Error::Startup`] when the columns disagree in length,
    /// embeddings disagree in dimension or hold non-finite values, or an id
    /// repeats. Embeddings that are not unit length are re-normalized.
    /// Lab values are not checked here; the ranker skips malformed rows.
    pub fn load(arrays: CatalogArrays) -> Result<Self> {
        let CatalogArrays {
            ids,
            embeddings,
            labs,
            breeds,
        } = arrays;

        let n = ids.len();
        if embeddings.len() != n || labs.len() != n || breeds.len() != n {
            return Err(Error::Startup(format!(
                "catalog arrays are misaligned: ids={}, embeddings={}, labs={}, breeds={}",
                n,
                embeddings.len(),
                labs.len(),
                breeds.len()
            )));
        }

        let dim = embeddings.first().map(Vec::len).unwrap_or(0);
        if n > 0 && dim == 0 {
            return Err(Error::Startup("catalog embeddings are empty".to_string()));
        }

        let mut flat = Vec::with_capacity(n * dim);
        let mut renormalized = 0usize;
        let mut zero_rows = 0usize;
        for (row, embedding) in embeddings.into_iter().enumerate() {
            if embedding.len() != dim {
                return Err(Error::Startup(format!(
                    "embedding at row {} has dimension {} (expected {})",
                    row,
                    embedding.len(),
                    dim
                )));
            }
            if !embedding.iter().all(|x| x.is_finite()) {
                return Err(Error::Startup(format!(
                    "embedding at row {} contains non-finite values",
                    row
                )));
            }

            let start = flat.len();
            flat.extend_from_slice(&embedding);
            let norm = normalize_in_place(&mut flat[start..]);
            if norm == 0.0 {
                zero_rows += 1;
            } else if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
                renormalized += 1;
            }
        }

        let mut rows_by_id = AHashMap::with_capacity(n);
        for (row, &id) in ids.iter().enumerate() {
            if let Some(first) = rows_by_id.insert(id, row) {
                return Err(Error::Startup(format!(
                    "duplicate catalog id {} at rows {} and {}",
                    id, first, row
                )));
            }
        }

        if renormalized > 0 {
            warn!(renormalized, "catalog embeddings were not unit length and have been normalized");
        }
        if zero_rows > 0 {
            warn!(zero_rows, "catalog contains zero embeddings; they score 0 against every query");
        }
        info!(entries = n, dim, "catalog loaded");

        Ok(Self {
            dim,
            ids,
            embeddings: flat,
            labs,
            breeds,
            rows_by_id,
        })
    }

    /// A catalog with no rows. Every search against it returns nothing.
    pub fn empty() -> Self {
        Self {
            dim: 0,
            ids: Vec::new(),
            embeddings: Vec::new(),
            labs: Vec::new(),
            breeds: Vec::new(),
            rows_by_id: AHashMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embedding dimensionality (0 for an empty catalog)
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, row: usize) -> Option<CatalogEntry<'_>> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dim;
        Some(CatalogEntry {
            row,
            id: self.ids[row],
            embedding: &self.embeddings[start..start + self.dim],
            lab: self.labs[row],
            breed: &self.breeds[row],
        })
    }

    /// Row index holding the given id
    pub fn row_of(&self, id: u64) -> Option<usize> {
        self.rows_by_id.get(&id).copied()
    }

    /// Exact k-nearest-neighbor search by cosine similarity.
    ///
    /// Returns at most `k` hits ordered by similarity, best first, with ties
    /// in row order. The query should already be L2-normalized; it is
    /// normalized again here so an unscaled query still ranks correctly.
    /// `k == 0` or an empty catalog yields an empty list.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::InvalidDimension {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if !query.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidQuery(
                "query embedding contains non-finite values".to_string(),
            ));
        }

        let mut query = query.to_vec();
        normalize_in_place(&mut query);

        // Rows are unit length, so the inner product is the cosine.
        let mut hits: Vec<Neighbor> = self
            .embeddings
            .par_chunks_exact(self.dim)
            .enumerate()
            .map(|(row, embedding)| Neighbor {
                row,
                similarity: dot(&query, embedding),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_rank);
        Ok(hits)
    }

    /// Copy the catalog back into its persisted array form
    pub fn to_arrays(&self) -> CatalogArrays {
        CatalogArrays {
            ids: self.ids.clone(),
            embeddings: self
                .embeddings
                .chunks_exact(self.dim.max(1))
                .map(<[f32]>::to_vec)
                .collect(),
            labs: self.labs.clone(),
            breeds: self.breeds.clone(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::empty()
    }
}
