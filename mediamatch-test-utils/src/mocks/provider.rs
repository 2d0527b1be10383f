//! Scriptable in-memory metadata provider.
//!
//! Behavior is configured up front and consumed during the test: scripted
//! failures are returned first, one per call, then responses are looked up
//! by normalized title, falling back to the default response. The mock is
//! `Clone`; clones share behavior and the call counter, so a test can keep
//! a handle while the engine owns the provider.

use async_trait::async_trait;
use mediamatch_core::provider::{
    normalize_title, MetadataProvider, ProviderCandidate, ProviderError, SearchQuery,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockBehavior {
    responses: HashMap<String, Vec<ProviderCandidate>>,
    default_response: Vec<ProviderCandidate>,
    failures: VecDeque<ProviderError>,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    behavior: Arc<Mutex<MockBehavior>>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn behavior(&self) -> std::sync::MutexGuard<'_, MockBehavior> {
        self.behavior.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Script the candidates returned for searches on `title`. The title is
    /// normalized the same way real queries are.
    pub fn expect_search(&self, title: &str, candidates: Vec<ProviderCandidate>) {
        self.behavior()
            .responses
            .insert(normalize_title(title), candidates);
    }

    /// Candidates returned for any title without a scripted response.
    pub fn set_default_response(&self, candidates: Vec<ProviderCandidate>) {
        self.behavior().default_response = candidates;
    }

    /// Queue errors to return before any successful response; consumed one
    /// per call in order.
    pub fn expect_failures(&self, failures: Vec<ProviderError>) {
        self.behavior().failures.extend(failures);
    }

    /// Add an artificial delay to every call. Under a paused tokio clock
    /// this still yields, which lets tests overlap concurrent searches.
    pub fn set_delay(&self, delay: Duration) {
        self.behavior().delay = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared counter handle, for tests that hand the provider away.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl MetadataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ProviderCandidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, outcome) = {
            let mut behavior = self.behavior();
            let outcome = match behavior.failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(behavior
                    .responses
                    .get(&query.title)
                    .unwrap_or(&behavior.default_response)
                    .clone()),
            };
            (behavior.delay, outcome)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
