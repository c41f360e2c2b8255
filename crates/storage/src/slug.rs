//! # Slug Derivation & Uniqueness
//!
//! `slugify` normalizes a title into URL-safe form; [`unique_slug`] is the
//! advisory pre-check-and-retry loop that appends numeric, then random,
//! suffixes on collision. The loop is bounded and takes "is this slug
//! taken" as an injected capability so it can be tested without a database.

use rand::Rng;
use tracing::debug;

/// Numeric suffixes tried before falling back to random ones: `base-2`
/// through `base-20`.
const NUMERIC_SUFFIX_MAX: u32 = 20;

/// Random-suffix attempts before giving up.
const RANDOM_ATTEMPTS: u32 = 5;

/// Failure modes of the uniqueness loop.
#[derive(Debug, PartialEq, Eq)]
pub enum UniqueSlugError<E> {
    /// The injected lookup failed.
    Lookup(E),
    /// Every candidate, including the random ones, was taken.
    Exhausted,
}

impl<E: std::fmt::Display> std::fmt::Display for UniqueSlugError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup(e) => write!(f, "slug lookup failed: {e}"),
            Self::Exhausted => write!(f, "no free slug candidate found"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for UniqueSlugError<E> {}

/// Find a free slug starting from `base`.
///
/// Tries `base`, then `base-2`..`base-20`, then up to five candidates of the
/// form `base-<6 random hex chars>`, each re-checked through `is_taken`.
pub fn unique_slug<E>(
    base: &str,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, UniqueSlugError<E>> {
    let base = if base.is_empty() { "test" } else { base };

    if !is_taken(base).map_err(UniqueSlugError::Lookup)? {
        return Ok(base.to_string());
    }
    for n in 2..=NUMERIC_SUFFIX_MAX {
        let candidate = format!("{base}-{n}");
        if !is_taken(&candidate).map_err(UniqueSlugError::Lookup)? {
            return Ok(candidate);
        }
    }
    debug!(base, "numeric slug suffixes exhausted, trying random ones");
    let mut rng = rand::thread_rng();
    for _ in 0..RANDOM_ATTEMPTS {
        let candidate = format!("{base}-{:06x}", rng.gen_range(0..0x100_0000u32));
        if !is_taken(&candidate).map_err(UniqueSlugError::Lookup)? {
            return Ok(candidate);
        }
    }
    Err(UniqueSlugError::Exhausted)
}

/// Normalize a title into a slug: lowercase ASCII alphanumerics joined by
/// single dashes, everything else dropped.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
