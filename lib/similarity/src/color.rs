//! Perceptual color distance
//!
//! sRGB → CIE L*a*b* conversion, the CIEDE2000 color difference, and the
//! Gaussian mapping from a ΔE value to a similarity in [0.0, 1.0].

use crate::config::ConfigError;
use pawprint_core::Lab;
use serde::{Deserialize, Serialize};

/// D65 reference white, 2° observer
const WHITE_X: f64 = 0.95047;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.08883;

/// CIE constants for the f(t) companding in XYZ → Lab
const LAB_EPSILON: f64 = 0.008856;
const LAB_KAPPA: f64 = 903.3;

/// 25^7, shared by the chroma compensation terms of CIEDE2000
const POW25_7: f64 = 6_103_515_625.0;

/// An 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from channels in [0.0, 1.0]. Out-of-range values are clamped,
    /// NaN maps to 0.
    pub fn from_unit(r: f64, g: f64, b: f64) -> Self {
        let quantize = |c: f64| {
            if c.is_nan() {
                0
            } else {
                (c.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        };
        Self::new(quantize(r), quantize(g), quantize(b))
    }

    #[inline]
    pub fn to_lab(self) -> Lab {
        to_lab(self)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Rgb::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        [rgb.r, rgb.g, rgb.b]
    }
}

/// sRGB transfer function inverse: gamma-encoded channel → linear light
#[inline]
fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Convert an sRGB color to CIE L*a*b* (D65)
pub fn to_lab(rgb: Rgb) -> Lab {
    let r = linearize(rgb.r);
    let g = linearize(rgb.g);
    let b = linearize(rgb.b);

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = (0.212671 * r + 0.715160 * g + 0.072169 * b) / WHITE_Y;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        LAB_KAPPA * y
    };

    Lab::new(l, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// Hue angle in degrees, [0, 360). Achromatic points get 0.
#[inline]
fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if a_prime == 0.0 && b == 0.0 {
        0.0
    } else {
        b.atan2(a_prime).to_degrees().rem_euclid(360.0)
    }
}

/// CIEDE2000 color difference (kL = kC = kH = 1).
///
/// Non-negative and symmetric, zero for identical inputs.
pub fn delta_e_2000(x: &Lab, y: &Lab) -> f64 {
    let c1 = x.a.hypot(x.b);
    let c2 = y.a.hypot(y.b);
    let c_bar7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + POW25_7)).sqrt());

    let a1 = (1.0 + g) * x.a;
    let a2 = (1.0 + g) * y.a;
    let c1p = a1.hypot(x.b);
    let c2p = a2.hypot(y.b);
    let h1p = hue_degrees(x.b, a1);
    let h2p = hue_degrees(y.b, a2);
    let chroma_product = c1p * c2p;

    let delta_l = y.l - x.l;
    let delta_c = c2p - c1p;
    let delta_h = if chroma_product == 0.0 {
        0.0
    } else {
        let d = h2p - h1p;
        if d > 180.0 {
            d - 360.0
        } else if d < -180.0 {
            d + 360.0
        } else {
            d
        }
    };
    let delta_big_h = 2.0 * chroma_product.sqrt() * (delta_h / 2.0).to_radians().sin();

    let l_bar = (x.l + y.l) / 2.0;
    let c_bar_p = (c1p + c2p) / 2.0;
    let h_bar_p = if chroma_product == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (h_bar_p - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar_p).to_radians().cos()
        + 0.32 * (3.0 * h_bar_p + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar_p - 63.0).to_radians().cos();
    let delta_theta = 30.0 * (-((h_bar_p - 275.0) / 25.0).powi(2)).exp();
    let c_bar_p7 = c_bar_p.powi(7);
    let r_c = 2.0 * (c_bar_p7 / (c_bar_p7 + POW25_7)).sqrt();
    let l_offset = (l_bar - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l_offset / (20.0 + l_offset).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;
    let r_t = -(2.0 * delta_theta).to_radians().sin() * r_c;

    let dl = delta_l / s_l;
    let dc = delta_c / s_c;
    let dh = delta_big_h / s_h;
    let sum = dl * dl + dc * dc + dh * dh + r_t * dc * dh;
    // Rounding can dip just below zero; NaN from overflowing inputs passes through.
    if sum < 0.0 {
        0.0
    } else {
        sum.sqrt()
    }
}

/// True when `lab` is finite and small enough for [`delta_e_2000`] to
/// produce a finite difference.
pub fn is_measurable(lab: &Lab) -> bool {
    lab.is_finite() && delta_e_2000(lab, lab).is_finite()
}

/// `exp(-(delta_e / sigma)^2)` for an already validated sigma
#[inline]
pub(crate) fn gaussian_similarity(delta_e: f64, sigma: f64) -> f64 {
    if delta_e.is_nan() {
        return 0.0;
    }
    (-(delta_e / sigma).powi(2)).exp()
}

/// Map a ΔE to a similarity in [0.0, 1.0] with a Gaussian kernel.
///
/// ΔE = 0 gives exactly 1.0; larger ΔE decays towards 0. `sigma` sets the
/// ΔE scale of the decay and must be finite and positive.
pub fn similarity_from_delta_e(delta_e: f64, sigma: f64) -> Result<f64, ConfigError> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(ConfigError::InvalidSigma(sigma));
    }
    Ok(gaussian_similarity(delta_e, sigma))
}

/// Coarse coat color name of an RGB sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorName {
    Black,
    White,
    Brown,
    LightBrown,
    Unknown,
}

impl ColorName {
    /// Classify by HSV thresholds: very dark → black, very bright → white,
    /// saturated orange hues → brown / light brown, then dark → black and
    /// desaturated → white.
    pub fn classify(rgb: Rgb) -> Self {
        let (h, s, v) = hsv(rgb);

        if v < 0.15 {
            return ColorName::Black;
        }
        if v > 0.95 {
            return ColorName::White;
        }
        if (10.0..=40.0).contains(&h) && s >= 0.15 {
            return if v < 0.3 {
                ColorName::Brown
            } else {
                ColorName::LightBrown
            };
        }
        if v < 0.4 {
            return ColorName::Black;
        }
        if s <= 0.25 {
            return ColorName::White;
        }
        ColorName::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorName::Black => "black",
            ColorName::White => "white",
            ColorName::Brown => "brown",
            ColorName::LightBrown => "light brown",
            ColorName::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ColorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hue in degrees [0, 360), saturation and value in [0, 1]
fn hsv(rgb: Rgb) -> (f64, f64, f64) {
    let r = f64::from(rgb.r) / 255.0;
    let g = f64::from(rgb.g) / 255.0;
    let b = f64::from(rgb.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let range = max - min;

    if range == 0.0 {
        return (0.0, 0.0, max);
    }

    let sector = if max == r {
        (g - b) / range
    } else if max == g {
        2.0 + (b - r) / range
    } else {
        4.0 + (r - g) / range
    };
    ((sector * 60.0).rem_euclid(360.0), range / max, max)
}
