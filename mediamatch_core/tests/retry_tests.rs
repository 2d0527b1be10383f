//! Retry policy tests, run against a scripted provider under a paused
//! clock so backoffs take no wall time.

use mediamatch_core::cache::SearchCache;
use mediamatch_core::config::{CacheConfig, MatchConfig, RetryConfig};
use mediamatch_core::matcher::{MatchStatus, Matcher};
use mediamatch_core::parser::{MediaKind, ParsedIdentity};
use mediamatch_core::provider::{
    MetadataProvider, ProviderError, RetryingProvider, SearchQuery,
};
use mediamatch_core::queue::{ItemState, ScanQueue};
use mediamatch_test_utils::{movie_candidate, MockProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn query() -> SearchQuery {
    SearchQuery::new("Inception", Some(2010), None, MediaKind::Movie)
}

fn scripted(failures: Vec<ProviderError>) -> MockProvider {
    let provider = MockProvider::new();
    provider.expect_failures(failures);
    provider.set_default_response(vec![movie_candidate("1", "Inception", Some(2010))]);
    provider
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_the_last_allowed_attempt() {
    let provider = scripted(vec![ProviderError::Timeout, ProviderError::Timeout]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert!(result.is_ok());
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let provider = scripted(vec![
        ProviderError::Timeout,
        ProviderError::Timeout,
        ProviderError::Timeout,
    ]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert_eq!(result, Err(ProviderError::Timeout));
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn transport_errors_are_retried() {
    let provider = scripted(vec![ProviderError::Transport("connection reset".into())]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert!(result.is_ok());
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn not_found_propagates_immediately() {
    let provider = scripted(vec![ProviderError::NotFound]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert_eq!(result, Err(ProviderError::NotFound));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_response_propagates_immediately() {
    let provider = scripted(vec![ProviderError::InvalidResponse("bad json".into())]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_earns_exactly_one_retry() {
    let provider = scripted(vec![ProviderError::RateLimited { retry_after: None }]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert!(result.is_ok());
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_propagates() {
    let provider = scripted(vec![
        ProviderError::RateLimited { retry_after: None },
        ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        },
    ]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let result = retrying.search(&query()).await;
    assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_backoff_respects_the_provider_hint() {
    let provider = scripted(vec![ProviderError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    }]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());

    let start = tokio::time::Instant::now();
    retrying.search(&query()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_as_item_error() {
    let provider = scripted(vec![
        ProviderError::Timeout,
        ProviderError::Timeout,
        ProviderError::Timeout,
    ]);
    let retrying = RetryingProvider::new(provider.clone(), RetryConfig::default());
    let cache = Arc::new(SearchCache::new(Arc::new(retrying), CacheConfig::default()));
    let matcher = Matcher::new(cache, MatchConfig::default());
    let queue = ScanQueue::new();

    let identity = ParsedIdentity {
        raw_path: PathBuf::from("Inception.2010.mkv"),
        title_guess: "Inception".to_string(),
        year: Some(2010),
        media_kind: MediaKind::Movie,
        season: None,
        episode: None,
        release_tags: Vec::new(),
    };
    let id = queue.enqueue(identity.clone());
    let result = matcher.match_identity(&identity).await;
    assert_eq!(result.status, MatchStatus::Error);
    queue.apply_match(id, result).unwrap();

    let item = queue.get(id).unwrap();
    assert_eq!(item.state, ItemState::Error);
    let recorded = item.match_result.unwrap();
    assert_eq!(
        recorded.error_detail.as_deref(),
        Some("provider request timed out")
    );
    assert!(recorded.chosen.is_none());
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn overall_deadline_caps_slow_attempts() {
    let provider = MockProvider::new();
    provider.set_delay(Duration::from_secs(5));
    provider.set_default_response(vec![movie_candidate("1", "Inception", Some(2010))]);
    let config = RetryConfig {
        overall_deadline_secs: 3,
        attempt_timeout_secs: 10,
        ..RetryConfig::default()
    };
    let retrying = RetryingProvider::new(provider.clone(), config);

    let start = tokio::time::Instant::now();
    let result = retrying.search(&query()).await;
    assert_eq!(result, Err(ProviderError::Timeout));
    // The first attempt was clamped to the remaining deadline.
    assert_eq!(provider.call_count(), 1);
    assert!(start.elapsed() <= Duration::from_secs(4));
}
