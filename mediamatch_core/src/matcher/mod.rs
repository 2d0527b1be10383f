//! Candidate scoring and match classification.
//!
//! The matcher turns a parsed identity into a [`MatchResult`]: it queries
//! the provider (through the cache), scores every candidate against the
//! identity, and classifies the best score against the auto-accept
//! threshold. Scoring is pure and deterministic: the same identity and the
//! same candidate set always produce the same result, bit for bit.

pub mod similarity;

use crate::cache::SearchCache;
use crate::config::MatchConfig;
use crate::parser::{MediaKind, ParsedIdentity};
use crate::provider::{MetadataProvider, ProviderCandidate, ProviderError, SearchQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a match result was (or wasn't) decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Best candidate met the auto-accept threshold.
    AutoMatched,
    /// Candidates exist but none was confident enough; needs review.
    Uncertain,
    /// A reviewer picked the candidate by hand.
    Manual,
    /// The file was deliberately excluded from matching.
    Skipped,
    /// Lookup failed or produced nothing usable.
    Error,
}

/// Outcome of matching one parsed identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: MatchStatus,
    /// Confidence of `chosen`, in `[0.0, 1.0]`. Zero when nothing was chosen.
    pub confidence: f64,
    pub chosen: Option<ProviderCandidate>,
    /// Remaining candidates, best first, capped by configuration.
    pub alternatives: Vec<ProviderCandidate>,
    /// Populated for `Error` and `Skipped` results.
    pub error_detail: Option<String>,
}

impl MatchResult {
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Error,
            confidence: 0.0,
            chosen: None,
            alternatives: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Skipped,
            confidence: 0.0,
            chosen: None,
            alternatives: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }
}

pub struct Matcher<P> {
    cache: Arc<SearchCache<P>>,
    config: MatchConfig,
}

impl<P: MetadataProvider> Matcher<P> {
    pub fn new(cache: Arc<SearchCache<P>>, config: MatchConfig) -> Self {
        Self { cache, config }
    }

    /// Match one identity against the catalog. Never fails outright: provider
    /// errors and empty candidate sets become `Error` results so the caller
    /// can record them per item.
    pub async fn match_identity(&self, identity: &ParsedIdentity) -> MatchResult {
        if identity.media_kind == MediaKind::Unknown || identity.title_guess.is_empty() {
            return MatchResult::error("unparseable filename");
        }

        let query = SearchQuery::new(
            &identity.title_guess,
            identity.year,
            identity.season,
            identity.media_kind,
        );
        let candidates = match self.cache.get_or_fetch(&query).await {
            Ok(candidates) => candidates,
            Err(ProviderError::NotFound) => Vec::new(),
            Err(e) => {
                log::warn!("lookup failed for {:?}: {}", identity.raw_path, e);
                return MatchResult::error(e.to_string());
            }
        };

        self.classify(identity, candidates)
    }

    /// Score, rank, and classify a candidate set. Pure: no I/O, no clock.
    fn classify(&self, identity: &ParsedIdentity, candidates: Vec<ProviderCandidate>) -> MatchResult {
        // Candidates of the wrong media kind never compete.
        let mut scored: Vec<(usize, f64, ProviderCandidate)> = candidates
            .into_iter()
            .filter(|c| c.kind == identity.media_kind)
            .enumerate()
            .map(|(index, candidate)| {
                let score = self.score(identity, &candidate);
                (index, score, candidate)
            })
            .collect();

        if scored.is_empty() {
            return MatchResult::error("no candidates");
        }

        // Descending score, then descending popularity, then provider order.
        // total_cmp keeps the sort total and the whole pipeline deterministic.
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| {
                    let pa = a.2.popularity.unwrap_or(f64::NEG_INFINITY);
                    let pb = b.2.popularity.unwrap_or(f64::NEG_INFINITY);
                    pb.total_cmp(&pa)
                })
                .then_with(|| a.0.cmp(&b.0))
        });

        let (_, best_score, best) = scored.remove(0);
        let alternatives: Vec<ProviderCandidate> = scored
            .into_iter()
            .take(self.config.max_alternatives)
            .map(|(_, _, candidate)| candidate)
            .collect();

        if best_score <= 0.0 {
            return MatchResult::error("no plausible candidates");
        }

        let status = if best_score >= self.config.auto_accept_threshold {
            MatchStatus::AutoMatched
        } else {
            MatchStatus::Uncertain
        };

        MatchResult {
            status,
            confidence: best_score,
            chosen: Some(best),
            alternatives,
            error_detail: None,
        }
    }

    /// Weighted confidence: title similarity plus a year component. A year
    /// disagreement zeroes the year axis; a missing year on either side gets
    /// a reduced neutral credit rather than full agreement.
    fn score(&self, identity: &ParsedIdentity, candidate: &ProviderCandidate) -> f64 {
        let title_score = similarity::title_similarity(&identity.title_guess, &candidate.title);
        let title_score = match candidate.original_title.as_deref() {
            Some(original) => {
                title_score.max(similarity::title_similarity(&identity.title_guess, original))
            }
            None => title_score,
        };

        let year_component = match (identity.year, candidate.year) {
            (Some(a), Some(b)) if a == b => self.config.year_weight,
            (Some(_), Some(_)) => 0.0,
            _ => self.config.year_weight * self.config.missing_year_factor,
        };

        (self.config.title_weight * title_score + year_component).clamp(0.0, 1.0)
    }
}
