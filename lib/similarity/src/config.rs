//! Request-scoped search configuration
//!
//! [`SearchWeights`] control how signals are fused, [`SearchRules`] control
//! which candidates are penalized (or excluded), and [`SearchOptions`]
//! bundles both with the retrieval depth and result count.

use serde::{Deserialize, Deserializer, Serialize};

/// Added to the fused score when a breed match is required but missing
pub const BREED_MISMATCH_PENALTY: f64 = -0.3;

/// Added to the fused score when the color rule fails
pub const COLOR_MISMATCH_PENALTY: f64 = -0.2;

pub const DEFAULT_CANDIDATES: usize = 1000;
pub const DEFAULT_LIMIT: usize = 50;

/// Fusion weights.
///
/// `breed_weight` is carried for configuration compatibility but does not
/// enter the fused score; breed only acts through the mismatch penalty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchWeights {
    #[serde(alias = "image")]
    pub image_weight: f64,
    #[serde(alias = "color")]
    pub color_weight: f64,
    #[serde(alias = "breed")]
    pub breed_weight: f64,
    /// ΔE scale of the color similarity kernel
    pub sigma: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            image_weight: 0.5,
            color_weight: 0.5,
            breed_weight: 0.0,
            sigma: 10.0,
        }
    }
}

impl SearchWeights {
    pub fn new(image_weight: f64, color_weight: f64, breed_weight: f64, sigma: f64) -> Self {
        Self {
            image_weight,
            color_weight,
            breed_weight,
            sigma,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("imageWeight", self.image_weight),
            ("colorWeight", self.color_weight),
            ("breedWeight", self.breed_weight),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteWeight(field));
            }
            if value < 0.0 {
                return Err(ConfigError::NegativeWeight { field, value });
            }
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(ConfigError::InvalidSigma(self.sigma));
        }
        Ok(())
    }
}

/// What happens to a candidate that fails a rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    /// Keep the candidate and add the fixed penalty to its score
    #[default]
    Penalize,
    /// Drop the candidate from the result list
    Exclude,
}

/// Hard-filter rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRules {
    pub require_breed_match: bool,
    /// Candidates strictly below this color similarity fail the color rule
    #[serde(alias = "minColorSim")]
    pub min_color_similarity: f64,
    /// Candidates strictly above this ΔE fail the color rule.
    /// `null` in JSON means no limit.
    #[serde(deserialize_with = "delta_e_limit")]
    pub max_delta_e: f64,
    pub mode: RuleMode,
}

impl Default for SearchRules {
    fn default() -> Self {
        Self {
            require_breed_match: true,
            min_color_similarity: 0.4,
            max_delta_e: 40.0,
            mode: RuleMode::Penalize,
        }
    }
}

impl SearchRules {
    /// Rules that never fire
    pub fn permissive() -> Self {
        Self {
            require_breed_match: false,
            min_color_similarity: 0.0,
            max_delta_e: f64::INFINITY,
            mode: RuleMode::Penalize,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_color_similarity) {
            return Err(ConfigError::ColorThresholdOutOfRange(self.min_color_similarity));
        }
        if self.max_delta_e.is_nan() || self.max_delta_e < 0.0 {
            return Err(ConfigError::InvalidDeltaELimit(self.max_delta_e));
        }
        Ok(())
    }

    /// True when the breed rule fails for this candidate
    #[inline]
    pub fn breed_fails(&self, breed_similarity: f64) -> bool {
        self.require_breed_match && breed_similarity < 1.0
    }

    /// True when the color rule fails for this candidate
    #[inline]
    pub fn color_fails(&self, color_similarity: f64, delta_e: f64) -> bool {
        color_similarity < self.min_color_similarity || delta_e > self.max_delta_e
    }
}

fn delta_e_limit<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

/// Everything a single ranking request needs besides the query itself
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    /// How many nearest neighbors to pull from the catalog before re-ranking
    #[serde(alias = "k")]
    pub candidates: usize,
    /// How many ranked results to return
    pub limit: usize,
    pub weights: SearchWeights,
    pub rules: SearchRules,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES,
            limit: DEFAULT_LIMIT,
            weights: SearchWeights::default(),
            rules: SearchRules::default(),
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.rules.validate()
    }

    #[must_use]
    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_weights(mut self, weights: SearchWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: SearchRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Weight '{field}' is negative ({value})")]
    NegativeWeight { field: &'static str, value: f64 },

    #[error("Weight '{0}' is not finite")]
    NonFiniteWeight(&'static str),

    #[error("Sigma must be finite and greater than zero, got {0}")]
    InvalidSigma(f64),

    #[error("minColorSimilarity must be within [0, 1], got {0}")]
    ColorThresholdOutOfRange(f64),

    #[error("maxDeltaE must be non-negative, got {0}")]
    InvalidDeltaELimit(f64),
}

impl From<ConfigError> for pawprint_core::Error {
    fn from(e: ConfigError) -> Self {
        pawprint_core::Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SearchOptions::default().validate().is_ok());
        assert!(SearchRules::permissive().validate().is_ok());
    }

    #[test]
    fn test_weight_validation() {
        let negative = SearchWeights::new(-0.1, 0.5, 0.0, 10.0);
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::NegativeWeight { field: "imageWeight", .. })
        ));

        let nan = SearchWeights::new(0.5, f64::NAN, 0.0, 10.0);
        assert_eq!(nan.validate(), Err(ConfigError::NonFiniteWeight("colorWeight")));

        for sigma in [0.0, -1.0, f64::INFINITY] {
            let weights = SearchWeights::new(0.5, 0.5, 0.0, sigma);
            assert!(matches!(weights.validate(), Err(ConfigError::InvalidSigma(_))));
        }
    }

    #[test]
    fn test_rule_validation() {
        let mut rules = SearchRules::default();
        rules.min_color_similarity = 1.5;
        assert!(rules.validate().is_err());

        let mut rules = SearchRules::default();
        rules.max_delta_e = -1.0;
        assert!(rules.validate().is_err());

        rules.max_delta_e = f64::INFINITY;
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_rule_thresholds_are_strict() {
        let rules = SearchRules::default();
        assert!(!rules.color_fails(0.4, 10.0));
        assert!(rules.color_fails(0.399, 10.0));
        assert!(!rules.color_fails(0.9, 40.0));
        assert!(rules.color_fails(0.9, 40.01));
        assert!(rules.breed_fails(0.0));
        assert!(!rules.breed_fails(1.0));
    }

    #[test]
    fn test_partial_json_config() {
        let options: SearchOptions = serde_json::from_value(json!({
            "k": 200,
            "weights": { "image": 0.85, "colorWeight": 0.15 },
            "rules": { "requireBreedMatch": false, "maxDeltaE": null, "mode": "exclude" }
        }))
        .unwrap();

        assert_eq!(options.candidates, 200);
        assert_eq!(options.limit, DEFAULT_LIMIT);
        assert_eq!(options.weights.image_weight, 0.85);
        assert_eq!(options.weights.sigma, 10.0);
        assert!(!options.rules.require_breed_match);
        assert_eq!(options.rules.max_delta_e, f64::INFINITY);
        assert_eq!(options.rules.min_color_similarity, 0.4);
        assert_eq!(options.rules.mode, RuleMode::Exclude);
    }

    #[test]
    fn test_config_error_converts() {
        let err: pawprint_core::Error = ConfigError::InvalidSigma(0.0).into();
        assert!(matches!(err, pawprint_core::Error::InvalidConfig(_)));
    }
}
