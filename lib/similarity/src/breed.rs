//! Breed label normalization and agreement
//!
//! Detector output and catalog labels use different surface forms for the
//! same breed ("Jindo-dog", "jindo_dog", "진도"). Labels are lowercased,
//! whitespace becomes `_`, and the result is resolved against a static
//! alias table. Labels outside the table keep their normalized form as
//! their key, so they only ever match the same normalized text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator substituted for whitespace during normalization
pub const SEPARATOR: char = '_';

/// Breeds with a known alias set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breed {
    Jindo,
    Pomeranian,
    ToyPoodle,
    Mix,
}

impl Breed {
    pub const ALL: [Breed; 4] = [Breed::Jindo, Breed::Pomeranian, Breed::ToyPoodle, Breed::Mix];

    /// Canonical key
    pub fn key(self) -> &'static str {
        match self {
            Breed::Jindo => "jindo",
            Breed::Pomeranian => "pomeranian",
            Breed::ToyPoodle => "toy_poodle",
            Breed::Mix => "mix",
        }
    }

    /// Normalized surface forms that resolve to this breed
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Breed::Jindo => &["jindo", "jindo-dog", "jindo_dog", "진도", "진돗개"],
            Breed::Pomeranian => &["pomeranian", "pome", "포메", "포메라니안"],
            Breed::ToyPoodle => &["toy_poodle", "toy-poodle", "poodle", "토이푸들"],
            Breed::Mix => &["mix", "mixed", "mongrel", "믹스", "믹스견"],
        }
    }

    /// Resolve an already normalized label
    pub fn from_alias(normalized: &str) -> Option<Breed> {
        Breed::ALL
            .into_iter()
            .find(|breed| breed.aliases().contains(&normalized))
    }
}

impl fmt::Display for Breed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Canonical identity of a breed label after alias resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BreedKey {
    Known(Breed),
    /// Not in the alias table; holds the normalized label
    Other(String),
}

impl BreedKey {
    pub fn as_str(&self) -> &str {
        match self {
            BreedKey::Known(breed) => breed.key(),
            BreedKey::Other(label) => label,
        }
    }

    /// Normalize a query-side label. Missing or blank labels carry no
    /// breed signal and yield `None`.
    pub fn from_query(label: Option<&str>) -> Option<BreedKey> {
        match label {
            Some(label) if !label.trim().is_empty() => Some(normalize(label)),
            _ => None,
        }
    }
}

impl fmt::Display for BreedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, trim, replace whitespace with [`SEPARATOR`]
fn normalize_text(label: &str) -> String {
    label
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { SEPARATOR } else { c })
        .collect()
}

/// Canonical key of a free-text breed label. Never fails.
pub fn normalize(label: &str) -> BreedKey {
    let text = normalize_text(label);
    match Breed::from_alias(&text) {
        Some(breed) => BreedKey::Known(breed),
        None => BreedKey::Other(text),
    }
}

/// Compare a candidate label with an already normalized query key
#[inline]
pub(crate) fn key_similarity(query: Option<&BreedKey>, candidate: &str) -> f64 {
    match query {
        Some(key) if *key == normalize(candidate) => 1.0,
        _ => 0.0,
    }
}

/// 1.0 when the query breed is present and resolves to the same key as the
/// candidate breed, 0.0 otherwise. There is no partial credit.
pub fn similarity(query: Option<&str>, candidate: &str) -> f64 {
    key_similarity(BreedKey::from_query(query).as_ref(), candidate)
}
