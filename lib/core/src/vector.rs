use serde::{Deserialize, Serialize};

/// Below this norm a vector is treated as zero and left unscaled.
const MIN_NORM: f32 = 1e-12;

/// Tolerance used by [`Vector::is_normalized`].
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// A dense embedding vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// True when every component is finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        crate::simd::norm(&self.data)
    }

    /// True when the L2 norm is within [`UNIT_NORM_TOLERANCE`] of 1
    #[inline]
    pub fn is_normalized(&self) -> bool {
        (self.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
    }

    /// Scale to unit length in place. Zero vectors stay zero.
    #[inline]
    pub fn normalize(&mut self) {
        normalize_in_place(&mut self.data);
    }

    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut v = self.clone();
        v.normalize();
        v
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

/// Scale a raw slice to unit length. Returns the norm it had before.
#[inline]
pub fn normalize_in_place(data: &mut [f32]) -> f32 {
    let norm = crate::simd::norm(data);
    if norm > MIN_NORM {
        let inv_norm = 1.0 / norm;
        for x in data.iter_mut() {
            *x *= inv_norm;
        }
    }
    norm
}
