//! End-to-end pipeline tests: real directories on disk, scripted provider.

use mediamatch_core::cache::SearchCache;
use mediamatch_core::config::{CacheConfig, MatchConfig, ScanConfig};
use mediamatch_core::matcher::Matcher;
use mediamatch_core::orchestrator::{ScanError, ScanOrchestrator};
use mediamatch_core::parser::MediaKind;
use mediamatch_core::queue::{ItemState, ScanQueue};
use mediamatch_test_utils::{episode_candidate, movie_candidate, MockProvider};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"").unwrap();
    path
}

fn pipeline(
    provider: MockProvider,
    roots: Vec<PathBuf>,
) -> (ScanOrchestrator<MockProvider>, Arc<ScanQueue>) {
    let cache = Arc::new(SearchCache::new(Arc::new(provider), CacheConfig::default()));
    let matcher = Arc::new(Matcher::new(cache, MatchConfig::default()));
    let queue = Arc::new(ScanQueue::new());
    let config = ScanConfig {
        roots,
        ..ScanConfig::default()
    };
    (
        ScanOrchestrator::new(matcher, queue.clone(), config),
        queue,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn scan_matches_movies_and_episodes() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Inception.2010.1080p.BluRay.x264.mkv");
    touch(dir.path(), "Breaking.Bad.S01E01.720p.mkv");

    let provider = MockProvider::new();
    provider.expect_search(
        "inception",
        vec![movie_candidate("27205", "Inception", Some(2010))],
    );
    provider.expect_search(
        "breaking bad",
        vec![episode_candidate("1396", "Breaking Bad", Some(2008))],
    );

    let (orchestrator, queue) = pipeline(provider, vec![dir.path().to_path_buf()]);
    let handle = orchestrator.scan().unwrap();
    let progress = handle.progress().clone();
    handle.wait().await;

    assert_eq!(progress.discovered(), 2);
    assert_eq!(progress.matched(), 2);

    let items = queue.items();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.state == ItemState::AutoMatched));

    let episode = items
        .iter()
        .find(|i| i.identity.media_kind == MediaKind::Episode)
        .unwrap();
    assert_eq!(episode.identity.season, Some(1));
    assert_eq!(episode.identity.episode, Some(1));
    let result = episode.match_result.as_ref().unwrap();
    assert_eq!(
        result.chosen.as_ref().map(|c| c.external_id.as_str()),
        Some("1396")
    );
    assert!(result.confidence >= MatchConfig::default().auto_accept_threshold);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_video_files_and_ignored_directories_are_excluded() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Inception.2010.mkv");
    touch(dir.path(), "notes.txt");
    touch(dir.path(), "cover.jpg");
    let extras = dir.path().join("extras");
    fs::create_dir(&extras).unwrap();
    touch(&extras, "behind.the.scenes.mkv");

    let provider = MockProvider::new();
    provider.expect_search(
        "inception",
        vec![movie_candidate("27205", "Inception", Some(2010))],
    );

    let (orchestrator, queue) = pipeline(provider, vec![dir.path().to_path_buf()]);
    let handle = orchestrator.scan().unwrap();
    handle.wait().await;

    let items = queue.items();
    assert_eq!(items.len(), 1);
    assert!(items[0]
        .identity
        .raw_path
        .ends_with("Inception.2010.mkv"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unparseable_and_unmatched_files_land_in_error_state() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "asdfjkl.mkv");
    touch(dir.path(), "Obscure.Film.2003.mkv");

    // No scripted responses: every lookup comes back empty.
    let provider = MockProvider::new();

    let (orchestrator, queue) = pipeline(provider, vec![dir.path().to_path_buf()]);
    let handle = orchestrator.scan().unwrap();
    handle.wait().await;

    let items = queue.items();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item.state, ItemState::Error);
        let result = item.match_result.as_ref().unwrap();
        assert!(result.error_detail.is_some());
        assert!(result.chosen.is_none());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_titles_share_one_provider_call() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Inception.2010.1080p.mkv");
    touch(dir.path(), "Inception.2010.720p.mkv");

    let provider = MockProvider::new();
    provider.expect_search(
        "inception",
        vec![movie_candidate("27205", "Inception", Some(2010))],
    );

    let (orchestrator, queue) = pipeline(provider.clone(), vec![dir.path().to_path_buf()]);
    let handle = orchestrator.scan().unwrap();
    handle.wait().await;

    assert_eq!(queue.len(), 2);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn large_scan_drains_with_few_workers() {
    let dir = TempDir::new().unwrap();
    for i in 0..40 {
        touch(dir.path(), &format!("Inception.2010.part{:02}.mkv", i));
    }

    let provider = MockProvider::new();
    provider.expect_search(
        "inception",
        vec![movie_candidate("27205", "Inception", Some(2010))],
    );

    let cache = Arc::new(SearchCache::new(Arc::new(provider), CacheConfig::default()));
    let matcher = Arc::new(Matcher::new(cache, MatchConfig::default()));
    let queue = Arc::new(ScanQueue::new());
    let config = ScanConfig {
        roots: vec![dir.path().to_path_buf()],
        match_concurrency: 2,
        pipeline_depth: 4,
        ..ScanConfig::default()
    };
    let orchestrator = ScanOrchestrator::new(matcher, queue.clone(), config);

    let handle = orchestrator.scan().unwrap();
    let progress = handle.progress().clone();
    handle.wait().await;

    assert_eq!(progress.discovered(), 40);
    assert_eq!(progress.matched(), 40);
    assert_eq!(queue.len(), 40);
    assert!(queue.items().iter().all(|i| i.state != ItemState::Pending));
}

#[tokio::test(flavor = "multi_thread")]
async fn scan_rejects_missing_roots() {
    let (orchestrator, _queue) = pipeline(MockProvider::new(), Vec::new());
    assert!(matches!(orchestrator.scan(), Err(ScanError::NoRoots)));

    let (orchestrator, _queue) = pipeline(
        MockProvider::new(),
        vec![PathBuf::from("/definitely/not/here")],
    );
    assert!(matches!(
        orchestrator.scan(),
        Err(ScanError::RootNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_the_pipeline() {
    let dir = TempDir::new().unwrap();
    for i in 0..50 {
        touch(dir.path(), &format!("Movie.Number.{:02}.2020.mkv", i));
    }

    let provider = MockProvider::new();
    provider.set_delay(std::time::Duration::from_millis(20));

    let (orchestrator, queue) = pipeline(provider, vec![dir.path().to_path_buf()]);
    let handle = orchestrator.scan().unwrap();
    handle.cancel();
    handle.wait().await;

    // Whatever was already in flight completed; nothing was lost mid-write.
    let items = queue.items();
    for item in &items {
        match item.state {
            ItemState::Pending => assert!(item.match_result.is_none()),
            _ => assert!(item.match_result.is_some()),
        }
    }
    assert!(items.len() <= 50);
}
