//! Ranking trace
//!
//! The ranker reports what it did through a [`RankTrace`] passed in by the
//! caller. Hooks are append-only; the ranker never reads the trace back,
//! so a collector is only meaningful once `rank_traced` has returned.

use crate::rerank::RankedCandidate;
use serde::Serialize;
use tracing::debug;

/// How many entries [`TraceLog::summary`] prints
const SUMMARY_HEAD: usize = 10;

/// Additive parts of a fused score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// `imageWeight * imageSimilarity`
    pub image_term: f64,
    /// `colorWeight * colorSimilarity`
    pub color_term: f64,
    /// 0.0 or the breed-mismatch penalty
    pub breed_penalty: f64,
    /// 0.0 or the color-mismatch penalty
    pub color_penalty: f64,
}

impl ScoreBreakdown {
    #[inline]
    pub fn total(&self) -> f64 {
        self.image_term + self.color_term + self.breed_penalty + self.color_penalty
    }
}

/// Why a retrieved candidate is missing from the ranked output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The catalog row holds a non-finite Lab triple
    MalformedColor,
    /// A rule failed while rules were in exclude mode
    RuleViolation {
        breed_mismatch: bool,
        color_mismatch: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedCandidate {
    pub row: usize,
    pub id: u64,
    pub reason: DropReason,
}

/// Observer of a single ranking run. Every hook defaults to a no-op.
pub trait RankTrace {
    /// Number of neighbors returned by the catalog search
    fn on_retrieved(&mut self, _hits: usize) {}

    /// A candidate survived scoring
    fn on_scored(&mut self, _id: u64, _breakdown: &ScoreBreakdown) {}

    /// A candidate was skipped
    fn on_dropped(&mut self, _dropped: &DroppedCandidate) {}

    /// Final ranked output, after truncation
    fn on_ranked(&mut self, _ranked: &[RankedCandidate]) {}
}

/// Trace that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrace;

impl RankTrace for NoopTrace {}

/// Trace that keeps everything it is told
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceLog {
    pub retrieved: usize,
    pub scored: Vec<(u64, ScoreBreakdown)>,
    pub dropped: Vec<DroppedCandidate>,
    /// `(rank, id, finalScore)` of the returned results
    pub ranked: Vec<(usize, u64, f64)>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Breakdown recorded for a candidate id
    pub fn breakdown(&self, id: u64) -> Option<&ScoreBreakdown> {
        self.scored
            .iter()
            .find(|(scored_id, _)| *scored_id == id)
            .map(|(_, breakdown)| breakdown)
    }

    /// Log the trace at debug level
    pub fn summary(&self) {
        debug!(
            retrieved = self.retrieved,
            scored = self.scored.len(),
            dropped = self.dropped.len(),
            returned = self.ranked.len(),
            "rank trace"
        );
        if !self.ranked.is_empty() {
            let head = self
                .ranked
                .iter()
                .take(SUMMARY_HEAD)
                .map(|(rank, id, score)| format!("#{} id={} score={:.3}", rank, id, score))
                .collect::<Vec<_>>()
                .join(", ");
            debug!("top results: {}", head);
        }
        for dropped in self.dropped.iter().take(SUMMARY_HEAD) {
            debug!(row = dropped.row, id = dropped.id, reason = ?dropped.reason, "dropped candidate");
        }
    }
}

impl RankTrace for TraceLog {
    fn on_retrieved(&mut self, hits: usize) {
        self.retrieved = hits;
    }

    fn on_scored(&mut self, id: u64, breakdown: &ScoreBreakdown) {
        self.scored.push((id, *breakdown));
    }

    fn on_dropped(&mut self, dropped: &DroppedCandidate) {
        self.dropped.push(dropped.clone());
    }

    fn on_ranked(&mut self, ranked: &[RankedCandidate]) {
        self.ranked = ranked
            .iter()
            .map(|c| (c.rank, c.id, c.final_score))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_total() {
        let breakdown = ScoreBreakdown {
            image_term: 0.45,
            color_term: 0.3,
            breed_penalty: -0.3,
            color_penalty: 0.0,
        };
        assert!((breakdown.total() - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_trace_log_records() {
        let mut log = TraceLog::new();
        log.on_retrieved(3);
        log.on_scored(7, &ScoreBreakdown::default());
        log.on_dropped(&DroppedCandidate {
            row: 2,
            id: 9,
            reason: DropReason::MalformedColor,
        });

        assert_eq!(log.retrieved, 3);
        assert!(log.breakdown(7).is_some());
        assert!(log.breakdown(9).is_none());
        assert_eq!(log.dropped[0].reason, DropReason::MalformedColor);
        log.summary();
    }

    #[test]
    fn test_drop_reason_serializes() {
        let reason = DropReason::RuleViolation {
            breed_mismatch: true,
            color_mismatch: false,
        };
        let json = serde_json::to_value(reason).unwrap();
        assert_eq!(json["rule_violation"]["breed_mismatch"], true);
    }
}
