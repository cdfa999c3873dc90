//! Username candidate generation.

use rand::Rng;

/// Stem used when an email local-part has no alphanumeric characters.
const FALLBACK_STEM: &str = "user";

/// Source of random numeric suffixes.
pub trait SuffixSource: Send + Sync {
    /// Return a value in `[0, upper)`.
    fn next_suffix(&self, upper: u32) -> u32;
}

/// Thread-local RNG backed suffixes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn next_suffix(&self, upper: u32) -> u32 {
        rand::thread_rng().gen_range(0..upper.max(1))
    }
}

/// Lower-cased alphanumeric part of the email before `@`.
pub fn username_stem(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let stem: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Build one candidate: stem followed by a suffix drawn from `[0, space)`.
pub fn candidate(stem: &str, suffixes: &dyn SuffixSource, space: u32) -> String {
    format!("{stem}{}", suffixes.next_suffix(space))
}
