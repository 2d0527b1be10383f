//! Metadata provider contract and shared provider types.
//!
//! A provider wraps one external catalog (TMDB today, others behind the same
//! trait) and exposes a single `search` operation. Providers are selected by
//! configuration and are expected to be wrapped in an `Arc` so they can be
//! shared across matcher workers.

pub mod retry;
pub mod tmdb;

use crate::parser::MediaKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use retry::RetryingProvider;
pub use tmdb::TmdbProvider;

/// Errors surfaced by provider backends.
///
/// `Timeout` and `Transport` are retryable; `RateLimited` earns a single
/// long backoff; `NotFound` and `InvalidResponse` propagate immediately.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,
    #[error("provider rate limit hit")]
    RateLimited { retry_after: Option<Duration> },
    #[error("resource not found on provider")]
    NotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the error is transient enough to retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout | ProviderError::Transport(_))
    }
}

/// One remote catalog result. Constructed fresh per provider response and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    /// Provider-scoped unique identifier (e.g. TMDB numeric id as string).
    pub external_id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub kind: MediaKind,
    pub runtime_minutes: Option<u32>,
    pub overview: Option<String>,
    /// Provider-reported popularity, used only as a ranking tie-break.
    pub popularity: Option<f64>,
}

/// A search request against a provider, built from a parsed identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    /// Normalized title (see [`normalize_title`]).
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub kind: MediaKind,
}

impl SearchQuery {
    pub fn new(title: &str, year: Option<i32>, season: Option<u32>, kind: MediaKind) -> Self {
        Self {
            title: normalize_title(title),
            year,
            season,
            kind,
        }
    }
}

/// Normalize a title for querying and cache keying: lowercase, fold common
/// diacritics to ASCII, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title.chars().map(fold_diacritic).collect();
    folded
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fold Latin-1 style accented characters to their ASCII base letter.
/// Intentionally small: covers the accents that actually show up in release
/// names, not full Unicode normalization.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Uniform interface over remote catalog backends.
///
/// Implementations own their transport; retry, timeout, and rate-limit
/// policy is layered on via [`RetryingProvider`].
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Search the catalog for candidates matching `query`.
    ///
    /// Returns candidates in provider order; an empty vector is a valid
    /// "no results" outcome, distinct from [`ProviderError::NotFound`].
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ProviderCandidate>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_collapses() {
        assert_eq!(normalize_title("  The   MATRIX "), "the matrix");
    }

    #[test]
    fn normalize_folds_diacritics() {
        assert_eq!(normalize_title("Amélie"), "amelie");
        assert_eq!(normalize_title("LÉON"), "leon");
    }

    #[test]
    fn queries_with_same_normalized_title_are_equal() {
        let a = SearchQuery::new("Amélie", Some(2001), None, MediaKind::Movie);
        let b = SearchQuery::new("amelie", Some(2001), None, MediaKind::Movie);
        assert_eq!(a, b);
    }
}
