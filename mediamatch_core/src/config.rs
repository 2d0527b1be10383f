//! Engine configuration.
//!
//! Plain serde structs with `Default` impls. The engine takes these
//! explicitly in constructors; layered loading (file/env) is the caller's
//! concern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Extensions treated as video files when the caller supplies none.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts",
];

/// Retry policy for one logical provider search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts for retryable errors (timeout/transport), including the first.
    pub max_attempts: u32,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout_secs: u64,
    /// Deadline shared by all attempts of one logical search.
    pub overall_deadline_secs: u64,
    /// Base backoff before the first retry; doubles per retry, plus jitter.
    pub base_backoff_ms: u64,
    /// Backoff used for a rate-limit hit when the provider gives no hint.
    pub rate_limit_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout_secs: 10,
            overall_deadline_secs: 45,
            base_backoff_ms: 250,
            rate_limit_backoff_secs: 5,
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}

/// Remote catalog backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Search cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a cached candidate set stays valid.
    pub ttl_minutes: u64,
    /// Entry bound; least-recently-used entries are evicted past this.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            max_entries: 1024,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

/// Confidence scoring and classification tunables.
///
/// The weights are empirically chosen defaults, not a fixed law: an exact
/// title and year lands at 1.0, an exact title with a wrong year at
/// `title_weight`, and an exact title with no year axis at
/// `title_weight + year_weight * missing_year_factor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum confidence applied without reviewer action.
    pub auto_accept_threshold: f64,
    /// Cap on ranked alternative candidates kept per result.
    pub max_alternatives: usize,
    pub title_weight: f64,
    pub year_weight: f64,
    /// Fraction of the year weight granted when either side lacks a year.
    pub missing_year_factor: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            auto_accept_threshold: 0.85,
            max_alternatives: 10,
            title_weight: 0.8,
            year_weight: 0.2,
            missing_year_factor: 0.75,
        }
    }
}

/// Scan orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root directories to walk.
    pub roots: Vec<PathBuf>,
    /// Extension allow-list (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
    /// Glob patterns for directory names to skip entirely.
    pub ignore_patterns: Vec<String>,
    /// Matcher worker pool size.
    pub match_concurrency: usize,
    /// Bound of the discovery → matching hand-off queue (backpressure).
    pub pipeline_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            allowed_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: vec![
                "extras".to_string(),
                "samples".to_string(),
                "trailers".to_string(),
                ".*".to_string(),
            ],
            match_concurrency: 4,
            pipeline_depth: 64,
        }
    }
}
