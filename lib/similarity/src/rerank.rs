//! Fusion ranker
//!
//! Pulls the top-k catalog neighbors by embedding similarity, scores each
//! candidate's color closeness and breed agreement against the query,
//! applies the rules, and orders the survivors by fused score.

use crate::breed::{key_similarity, BreedKey};
use crate::color::{delta_e_2000, gaussian_similarity};
use crate::config::{
    RuleMode, SearchOptions, BREED_MISMATCH_PENALTY, COLOR_MISMATCH_PENALTY,
};
use crate::query::QueryFeatures;
use crate::trace::{DropReason, DroppedCandidate, NoopTrace, RankTrace, ScoreBreakdown};
use pawprint_core::{Catalog, Neighbor, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many ranked entries are logged at debug level
const LOG_HEAD: usize = 10;

/// One ranked catalog entry, flat for serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    /// 1-based position in the final order
    pub rank: usize,
    pub id: u64,
    /// Cosine similarity of the embeddings
    pub image_similarity: f64,
    /// CIEDE2000 difference between query and candidate colors
    pub color_delta_e: f64,
    pub color_similarity: f64,
    /// 1.0 on canonical breed agreement, else 0.0
    pub breed_similarity: f64,
    pub final_score: f64,
    pub query_breed: Option<String>,
    pub candidate_breed: String,
}

/// A scored candidate before ordering
struct Scored<'a> {
    id: u64,
    image_similarity: f64,
    delta_e: f64,
    color_similarity: f64,
    breed_similarity: f64,
    breakdown: ScoreBreakdown,
    final_score: f64,
    candidate_breed: &'a str,
}

enum Outcome<'a> {
    Kept(Scored<'a>),
    Dropped(DroppedCandidate),
    /// Row index the catalog does not hold
    Skipped(usize),
}

/// Re-ranks catalog neighbors of a query.
///
/// Holds a shared, immutable catalog snapshot; cloning the ranker or
/// running it from many threads at once needs no coordination.
#[derive(Debug, Clone)]
pub struct FusionRanker {
    catalog: Arc<Catalog>,
}

impl FusionRanker {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Rank the catalog against `query`.
    ///
    /// Retrieves `options.candidates` neighbors, fuses
    /// `imageWeight * imageSimilarity + colorWeight * colorSimilarity` with
    /// any rule penalties, stable-sorts by the fused score (ties keep
    /// retrieval order), assigns ranks from 1, and returns at most
    /// `options.limit` entries. An empty catalog or zero candidates gives
    /// an empty list.
    ///
    /// # Errors
    /// `InvalidConfig` for invalid weights or rules, `InvalidQuery` or
    /// `InvalidDimension` for malformed query features.
    pub fn rank(
        &self,
        query: &QueryFeatures,
        options: &SearchOptions,
    ) -> Result<Vec<RankedCandidate>> {
        self.rank_traced(query, options, &mut NoopTrace)
    }

    /// [`rank`](Self::rank), reporting each step to `trace`
    pub fn rank_traced<T: RankTrace + ?Sized>(
        &self,
        query: &QueryFeatures,
        options: &SearchOptions,
        trace: &mut T,
    ) -> Result<Vec<RankedCandidate>> {
        options.validate()?;
        query.validate()?;

        let hits = self
            .catalog
            .search(query.embedding.as_slice(), options.candidates)?;
        trace.on_retrieved(hits.len());
        if hits.is_empty() {
            trace.on_ranked(&[]);
            return Ok(Vec::new());
        }

        let query_key = query.breed_key();
        if query_key.is_none() && options.rules.require_breed_match {
            warn!("query has no breed label; requireBreedMatch fails every candidate");
        }
        if options.weights.breed_weight != 0.0 {
            debug!(
                breed_weight = options.weights.breed_weight,
                "breed weight is not part of the fused score; breed acts through the mismatch rule"
            );
        }

        // Per-candidate work is independent; collect keeps retrieval order.
        let outcomes: Vec<Outcome<'_>> = hits
            .par_iter()
            .map(|hit| self.score(hit, query, query_key.as_ref(), options))
            .collect();

        let mut kept = Vec::with_capacity(outcomes.len());
        let mut dropped = 0usize;
        for outcome in outcomes {
            match outcome {
                Outcome::Kept(scored) => {
                    trace.on_scored(scored.id, &scored.breakdown);
                    kept.push(scored);
                }
                Outcome::Dropped(candidate) => {
                    trace.on_dropped(&candidate);
                    dropped += 1;
                }
                Outcome::Skipped(row) => {
                    debug!(row, "search hit has no catalog row, skipped");
                }
            }
        }
        if dropped > 0 {
            warn!(dropped, retrieved = hits.len(), "candidates dropped during ranking");
        }

        // Stable: equal scores stay in retrieval order.
        kept.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        let ranked: Vec<RankedCandidate> = kept
            .into_iter()
            .take(options.limit)
            .enumerate()
            .map(|(i, scored)| RankedCandidate {
                rank: i + 1,
                id: scored.id,
                image_similarity: scored.image_similarity,
                color_delta_e: scored.delta_e,
                color_similarity: scored.color_similarity,
                breed_similarity: scored.breed_similarity,
                final_score: scored.final_score,
                query_breed: query.breed.clone(),
                candidate_breed: scored.candidate_breed.to_string(),
            })
            .collect();

        if tracing::enabled!(tracing::Level::DEBUG) {
            let head = ranked
                .iter()
                .take(LOG_HEAD)
                .map(|c| {
                    format!(
                        "#{} id={} F={:.3} (img={:.3}, c={:.3}, b={:.1}, dE={:.1}, cb={})",
                        c.rank,
                        c.id,
                        c.final_score,
                        c.image_similarity,
                        c.color_similarity,
                        c.breed_similarity,
                        c.color_delta_e,
                        c.candidate_breed
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            debug!(retrieved = hits.len(), returned = ranked.len(), "ranked: {}", head);
        }

        trace.on_ranked(&ranked);
        Ok(ranked)
    }

    fn score<'a>(
        &'a self,
        hit: &Neighbor,
        query: &QueryFeatures,
        query_key: Option<&BreedKey>,
        options: &SearchOptions,
    ) -> Outcome<'a> {
        let Some(entry) = self.catalog.get(hit.row) else {
            return Outcome::Skipped(hit.row);
        };

        // Out-of-range triples overflow the ΔE terms and come back non-finite.
        let delta_e = delta_e_2000(&query.lab_color, &entry.lab);
        if !entry.lab.is_finite() || !delta_e.is_finite() {
            return Outcome::Dropped(DroppedCandidate {
                row: entry.row,
                id: entry.id,
                reason: DropReason::MalformedColor,
            });
        }

        let weights = &options.weights;
        let rules = &options.rules;

        let image_similarity = f64::from(hit.similarity);
        let color_similarity = gaussian_similarity(delta_e, weights.sigma);
        let breed_similarity = key_similarity(query_key, entry.breed);

        let breed_fails = rules.breed_fails(breed_similarity);
        let color_fails = rules.color_fails(color_similarity, delta_e);

        if rules.mode == RuleMode::Exclude && (breed_fails || color_fails) {
            return Outcome::Dropped(DroppedCandidate {
                row: entry.row,
                id: entry.id,
                reason: DropReason::RuleViolation {
                    breed_mismatch: breed_fails,
                    color_mismatch: color_fails,
                },
            });
        }

        let breakdown = ScoreBreakdown {
            image_term: weights.image_weight * image_similarity,
            color_term: weights.color_weight * color_similarity,
            breed_penalty: if breed_fails { BREED_MISMATCH_PENALTY } else { 0.0 },
            color_penalty: if color_fails { COLOR_MISMATCH_PENALTY } else { 0.0 },
        };

        Outcome::Kept(Scored {
            id: entry.id,
            image_similarity,
            delta_e,
            color_similarity,
            breed_similarity,
            final_score: breakdown.total(),
            breakdown,
            candidate_breed: entry.breed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchRules, SearchWeights};
    use crate::trace::TraceLog;
    use pawprint_core::{CatalogArrays, Error, Lab};

    const TAN: Lab = Lab::new(65.0, 15.0, 35.0);
    const BLACK: Lab = Lab::new(15.0, 0.5, 1.0);

    fn catalog(rows: &[(u64, [f32; 2], Lab, &str)]) -> Arc<Catalog> {
        let mut arrays = CatalogArrays::new();
        for (id, embedding, lab, breed) in rows {
            arrays.push(*id, embedding.to_vec(), *lab, *breed);
        }
        Arc::new(Catalog::load(arrays).unwrap())
    }

    fn query(breed: Option<&str>) -> QueryFeatures {
        QueryFeatures::new(vec![1.0, 0.0], TAN, breed.map(str::to_string))
    }

    fn assert_ranked(results: &[RankedCandidate]) {
        for (i, candidate) in results.iter().enumerate() {
            assert_eq!(candidate.rank, i + 1);
        }
        for pair in results.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn test_breed_penalty_scenario() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "jindo"),
            (2, [1.0, 0.0], TAN, "jindo"),
            (3, [1.0, 0.0], TAN, "mix"),
        ]));
        let options = SearchOptions::default();
        let mut trace = TraceLog::new();

        let results = ranker
            .rank_traced(&query(Some("Jindo-dog")), &options, &mut trace)
            .unwrap();

        assert_ranked(&results);
        let ids: Vec<u64> = results.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(trace.breakdown(1).unwrap().breed_penalty, 0.0);
        assert_eq!(trace.breakdown(2).unwrap().breed_penalty, 0.0);
        assert_eq!(trace.breakdown(3).unwrap().breed_penalty, BREED_MISMATCH_PENALTY);
        assert!((results[1].final_score - results[2].final_score + BREED_MISMATCH_PENALTY).abs() < 1e-9);
        assert_eq!(results[0].breed_similarity, 1.0);
        assert_eq!(results[2].breed_similarity, 0.0);
        assert_eq!(results[2].query_breed.as_deref(), Some("Jindo-dog"));
        assert_eq!(results[2].candidate_breed, "mix");
    }

    #[test]
    fn test_breed_outranks_embedding_when_penalized() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "mix"),
            (2, [0.9, 0.1], TAN, "pomeranian"),
        ]));
        let results = ranker
            .rank(&query(Some("pome")), &SearchOptions::default())
            .unwrap();
        assert_eq!(results[0].id, 2);
        assert!(results[0].image_similarity < results[1].image_similarity);
    }

    #[test]
    fn test_permissive_rules_reduce_to_weighted_sum() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], BLACK, "mix"),
            (2, [0.6, 0.8], TAN, "jindo"),
            (3, [0.0, 1.0], Lab::new(70.0, -20.0, 5.0), "poodle"),
        ]));
        let weights = SearchWeights::new(0.6, 0.4, 0.2, 10.0);
        let options = SearchOptions::default()
            .with_weights(weights)
            .with_rules(SearchRules::permissive());
        let mut trace = TraceLog::new();

        let results = ranker
            .rank_traced(&query(Some("mix")), &options, &mut trace)
            .unwrap();

        assert_eq!(results.len(), 3);
        for c in &results {
            let expected =
                weights.image_weight * c.image_similarity + weights.color_weight * c.color_similarity;
            assert_eq!(c.final_score, expected);
            let breakdown = trace.breakdown(c.id).unwrap();
            assert_eq!(breakdown.breed_penalty, 0.0);
            assert_eq!(breakdown.color_penalty, 0.0);
        }
    }

    #[test]
    fn test_color_penalty_threshold_is_strict() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "mix"),
            (2, [1.0, 0.0], Lab::new(60.0, 10.0, 30.0), "mix"),
        ]));
        let delta_e = delta_e_2000(&TAN, &Lab::new(60.0, 10.0, 30.0));
        let sigma = 10.0;
        let boundary = gaussian_similarity(delta_e, sigma);

        let mut rules = SearchRules::permissive();
        rules.min_color_similarity = boundary;
        let options = SearchOptions::default().with_rules(rules);
        let mut trace = TraceLog::new();
        ranker
            .rank_traced(&query(None), &options, &mut trace)
            .unwrap();
        assert_eq!(trace.breakdown(2).unwrap().color_penalty, 0.0);

        rules.min_color_similarity = (boundary + 1e-9).min(1.0);
        let options = SearchOptions::default().with_rules(rules);
        let mut trace = TraceLog::new();
        ranker
            .rank_traced(&query(None), &options, &mut trace)
            .unwrap();
        assert_eq!(trace.breakdown(2).unwrap().color_penalty, COLOR_MISMATCH_PENALTY);
        assert_eq!(trace.breakdown(1).unwrap().color_penalty, 0.0);
    }

    #[test]
    fn test_max_delta_e_rule() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "mix"),
            (2, [1.0, 0.0], BLACK, "mix"),
        ]));
        let mut rules = SearchRules::permissive();
        rules.max_delta_e = 20.0;
        let options = SearchOptions::default().with_rules(rules);
        let mut trace = TraceLog::new();

        let results = ranker
            .rank_traced(&query(None), &options, &mut trace)
            .unwrap();
        assert_eq!(results[0].id, 1);
        assert!(results[1].color_delta_e > 20.0);
        assert_eq!(trace.breakdown(2).unwrap().color_penalty, COLOR_MISMATCH_PENALTY);
    }

    #[test]
    fn test_absent_query_breed_penalizes_everyone() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "jindo"),
            (2, [0.8, 0.6], TAN, "mix"),
        ]));
        let mut trace = TraceLog::new();
        let results = ranker
            .rank_traced(&query(None), &SearchOptions::default(), &mut trace)
            .unwrap();

        assert_eq!(results.len(), 2);
        for c in &results {
            assert_eq!(c.breed_similarity, 0.0);
            assert_eq!(trace.breakdown(c.id).unwrap().breed_penalty, BREED_MISMATCH_PENALTY);
        }
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn test_exclude_mode_drops_failures() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], TAN, "jindo"),
            (2, [1.0, 0.0], TAN, "mix"),
            (3, [1.0, 0.0], BLACK, "jindo"),
        ]));
        let mut rules = SearchRules::default();
        rules.mode = RuleMode::Exclude;
        let options = SearchOptions::default().with_rules(rules);
        let mut trace = TraceLog::new();

        let results = ranker
            .rank_traced(&query(Some("jindo")), &options, &mut trace)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert_eq!(trace.dropped.len(), 2);
        assert!(trace.dropped.iter().any(|d| d.id == 2
            && d.reason
                == DropReason::RuleViolation {
                    breed_mismatch: true,
                    color_mismatch: false
                }));
        assert!(trace.dropped.iter().any(|d| d.id == 3
            && d.reason
                == DropReason::RuleViolation {
                    breed_mismatch: false,
                    color_mismatch: true
                }));
    }

    #[test]
    fn test_malformed_candidate_color_is_skipped() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], Lab::new(f64::NAN, 0.0, 0.0), "mix"),
            (2, [0.9, 0.1], TAN, "mix"),
        ]));
        let mut trace = TraceLog::new();
        let results = ranker
            .rank_traced(&query(Some("mix")), &SearchOptions::default(), &mut trace)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
        assert_eq!(trace.retrieved, 2);
        assert_eq!(
            trace.dropped,
            vec![DroppedCandidate {
                row: 0,
                id: 1,
                reason: DropReason::MalformedColor
            }]
        );
    }

    #[test]
    fn test_out_of_range_candidate_color_is_skipped() {
        let ranker = FusionRanker::new(catalog(&[
            (1, [1.0, 0.0], Lab::new(50.0, 1e50, 0.0), "mix"),
            (2, [1.0, 0.0], Lab::new(50.0, 10.0, 10.0), "mix"),
        ]));
        let query = QueryFeatures::new(vec![1.0, 0.0], Lab::new(50.0, 10.0, 10.0), Some("mix".to_string()));
        let mut trace = TraceLog::new();

        let results = ranker
            .rank_traced(&query, &SearchOptions::default(), &mut trace)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
        assert_eq!(results[0].color_delta_e, 0.0);
        assert_eq!(
            trace.dropped,
            vec![DroppedCandidate {
                row: 0,
                id: 1,
                reason: DropReason::MalformedColor
            }]
        );
    }

    #[test]
    fn test_limit_and_candidates() {
        let rows: Vec<(u64, [f32; 2], Lab, &str)> = (0..20u64)
            .map(|i| (i, [1.0, i as f32 * 0.05], TAN, "mix"))
            .collect();
        let ranker = FusionRanker::new(catalog(&rows));

        let options = SearchOptions::default().with_candidates(10).with_limit(3);
        let results = ranker.rank(&query(Some("mix")), &options).unwrap();
        assert_eq!(results.len(), 3);
        assert_ranked(&results);
        assert_eq!(results[0].id, 0);

        let options = SearchOptions::default().with_candidates(10).with_limit(100);
        assert_eq!(ranker.rank(&query(Some("mix")), &options).unwrap().len(), 10);
    }

    #[test]
    fn test_ties_keep_retrieval_order() {
        let ranker = FusionRanker::new(catalog(&[
            (5, [1.0, 0.0], TAN, "mix"),
            (3, [1.0, 0.0], TAN, "mix"),
            (9, [1.0, 0.0], TAN, "mix"),
        ]));
        let results = ranker
            .rank(&query(Some("mix")), &SearchOptions::default())
            .unwrap();
        let ids: Vec<u64> = results.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn test_empty_inputs() {
        let ranker = FusionRanker::new(Arc::new(Catalog::empty()));
        assert!(ranker
            .rank(&query(None), &SearchOptions::default())
            .unwrap()
            .is_empty());

        let ranker = FusionRanker::new(catalog(&[(1, [1.0, 0.0], TAN, "mix")]));
        let options = SearchOptions::default().with_candidates(0);
        assert!(ranker.rank(&query(None), &options).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_requests() {
        let ranker = FusionRanker::new(catalog(&[(1, [1.0, 0.0], TAN, "mix")]));

        let options = SearchOptions::default().with_weights(SearchWeights::new(0.5, 0.5, 0.0, 0.0));
        assert!(matches!(
            ranker.rank(&query(None), &options),
            Err(Error::InvalidConfig(_))
        ));

        let wrong_dim = QueryFeatures::new(vec![1.0, 0.0, 0.0], TAN, None);
        assert!(matches!(
            ranker.rank(&wrong_dim, &SearchOptions::default()),
            Err(Error::InvalidDimension { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_rank_is_idempotent() {
        let rows: Vec<(u64, [f32; 2], Lab, &str)> = (0..50u64)
            .map(|i| {
                let angle = i as f32 * 0.03;
                let lab = Lab::new(20.0 + i as f64, (i % 7) as f64 * 3.0, (i % 5) as f64 * 8.0);
                let breed = if i % 3 == 0 { "jindo" } else { "mix" };
                (i, [angle.cos(), angle.sin()], lab, breed)
            })
            .collect();
        let ranker = FusionRanker::new(catalog(&rows));
        let options = SearchOptions::default().with_candidates(40).with_limit(25);

        let first = ranker.rank(&query(Some("진도")), &options).unwrap();
        let second = ranker.rank(&query(Some("진도")), &options).unwrap();
        assert_eq!(first, second);
        assert_ranked(&first);
    }
}
