//! Query-side features and the extraction contract
//!
//! Embedding, segmentation and breed detection models live outside this
//! crate. They are reached through [`FeatureExtractor`], which the caller
//! owns and hands in; the ranker itself never holds a model.

use crate::breed::BreedKey;
use crate::color::{is_measurable, ColorName, Rgb};
use pawprint_core::{Error, Lab, Result, Vector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The three signals describing one query photo
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryFeatures {
    /// Image embedding; expected L2-normalized, same dimension as the catalog
    pub embedding: Vector,
    /// Dominant coat color
    #[serde(alias = "lab")]
    pub lab_color: Lab,
    /// Detected breed label; `None` disables the breed signal
    #[serde(default)]
    pub breed: Option<String>,
}

impl QueryFeatures {
    pub fn new(embedding: impl Into<Vector>, lab_color: Lab, breed: Option<String>) -> Self {
        Self {
            embedding: embedding.into(),
            lab_color,
            breed,
        }
    }

    /// Reject features no candidate could be scored against
    pub fn validate(&self) -> Result<()> {
        if self.embedding.is_empty() {
            return Err(Error::InvalidQuery("query embedding is empty".to_string()));
        }
        if !self.embedding.is_finite() {
            return Err(Error::InvalidQuery(
                "query embedding contains non-finite values".to_string(),
            ));
        }
        if !is_measurable(&self.lab_color) {
            return Err(Error::InvalidQuery(format!(
                "query Lab color is not finite or out of range: {:?}",
                self.lab_color.to_array()
            )));
        }
        Ok(())
    }

    /// Canonical breed key, `None` when the query carries no breed
    pub fn breed_key(&self) -> Option<BreedKey> {
        BreedKey::from_query(self.breed.as_deref())
    }

    /// Run the extractor over raw image bytes and assemble query features.
    /// The embedding is normalized here so the catalog sees unit vectors.
    pub fn extract(extractor: &dyn FeatureExtractor, image: &[u8]) -> Result<Self> {
        let embedding = extractor.embed(image)?.normalized();
        let rgb = extractor.dominant_color(image)?;
        let breed = extractor.classify_breed(image)?;

        let channels: [u8; 3] = rgb.into();
        let color_name = ColorName::classify(rgb);
        debug!(
            dim = embedding.dim(),
            rgb = ?channels,
            color = %color_name,
            breed = breed.as_deref().unwrap_or("-"),
            "extracted query features"
        );

        let features = Self::new(embedding, rgb.to_lab(), breed);
        features.validate()?;
        Ok(features)
    }
}

/// Narrow contract of the external vision models
pub trait FeatureExtractor: Send + Sync {
    /// Visual embedding of the image
    fn embed(&self, image: &[u8]) -> Result<Vector>;

    /// Dominant color of the dog region
    fn dominant_color(&self, image: &[u8]) -> Result<Rgb>;

    /// Detected breed label, if any
    fn classify_breed(&self, image: &[u8]) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Breed;
    use serde_json::json;

    struct FixedExtractor;

    impl FeatureExtractor for FixedExtractor {
        fn embed(&self, image: &[u8]) -> Result<Vector> {
            Ok(Vector::new(vec![image.len() as f32, 0.0, 0.0, 0.0]))
        }

        fn dominant_color(&self, _image: &[u8]) -> Result<Rgb> {
            Ok(Rgb::new(255, 0, 0))
        }

        fn classify_breed(&self, _image: &[u8]) -> Result<Option<String>> {
            Ok(Some("Jindo-dog".to_string()))
        }
    }

    #[test]
    fn test_extract_normalizes_and_converts() {
        let features = QueryFeatures::extract(&FixedExtractor, &[1, 2, 3]).unwrap();
        assert!(features.embedding.is_normalized());
        assert!((features.lab_color.l - 53.24).abs() < 0.01);
        assert_eq!(features.breed_key(), Some(BreedKey::Known(Breed::Jindo)));
    }

    #[test]
    fn test_extract_rejects_empty_embedding() {
        struct Empty;
        impl FeatureExtractor for Empty {
            fn embed(&self, _image: &[u8]) -> Result<Vector> {
                Ok(Vector::new(Vec::new()))
            }
            fn dominant_color(&self, _image: &[u8]) -> Result<Rgb> {
                Ok(Rgb::new(0, 0, 0))
            }
            fn classify_breed(&self, _image: &[u8]) -> Result<Option<String>> {
                Ok(None)
            }
        }
        assert!(matches!(
            QueryFeatures::extract(&Empty, &[]),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_validate() {
        let ok = QueryFeatures::new(vec![1.0, 0.0], Lab::new(50.0, 0.0, 0.0), None);
        assert!(ok.validate().is_ok());
        assert!(ok.breed_key().is_none());

        let bad = QueryFeatures::new(vec![1.0, 0.0], Lab::new(f64::NAN, 0.0, 0.0), None);
        assert!(bad.validate().is_err());

        let extreme = QueryFeatures::new(vec![1.0, 0.0], Lab::new(50.0, 1e50, 0.0), None);
        assert!(matches!(extreme.validate(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_deserialize() {
        let features: QueryFeatures = serde_json::from_value(json!({
            "embedding": [0.6, 0.8],
            "lab": [55.0, 12.0, 30.0]
        }))
        .unwrap();
        assert_eq!(features.embedding.dim(), 2);
        assert_eq!(features.lab_color, Lab::new(55.0, 12.0, 30.0));
        assert!(features.breed.is_none());
    }
}
