//! Core engine for scanning a media library and matching files against a
//! remote metadata catalog.
//!
//! The pipeline in one sentence: the [`orchestrator`] walks configured
//! roots, the [`parser`] turns each filename into a [`ParsedIdentity`], the
//! [`matcher`] looks it up through the [`cache`]-fronted [`provider`] and
//! scores the candidates, and the verdict lands in the [`queue`] for review.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediamatch_core::{
//!     CacheConfig, MatchConfig, Matcher, ProviderConfig, RetryingProvider,
//!     ScanConfig, ScanOrchestrator, ScanQueue, SearchCache, TmdbProvider,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = RetryingProvider::new(
//!     TmdbProvider::new(ProviderConfig::default())?,
//!     Default::default(),
//! );
//! let cache = Arc::new(SearchCache::new(Arc::new(provider), CacheConfig::default()));
//! let matcher = Arc::new(Matcher::new(cache, MatchConfig::default()));
//! let queue = Arc::new(ScanQueue::new());
//! let orchestrator = ScanOrchestrator::new(matcher, queue.clone(), ScanConfig::default());
//! let handle = orchestrator.scan()?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod matcher;
pub mod orchestrator;
pub mod parser;
pub mod provider;
pub mod queue;

pub use cache::{CacheStats, SearchCache};
pub use config::{
    CacheConfig, MatchConfig, ProviderConfig, RetryConfig, ScanConfig, DEFAULT_VIDEO_EXTENSIONS,
};
pub use matcher::{MatchResult, MatchStatus, Matcher};
pub use orchestrator::{ScanError, ScanHandle, ScanOrchestrator, ScanProgress};
pub use parser::{MediaKind, ParsedIdentity};
pub use provider::{
    MetadataProvider, ProviderCandidate, ProviderError, RetryingProvider, SearchQuery,
    TmdbProvider,
};
pub use queue::{
    ItemId, ItemState, QueueError, QueueEvent, ReviewDecision, ScanQueue, ScanQueueItem,
};
