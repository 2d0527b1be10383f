//! Scan orchestration: walk roots, parse, enqueue, and match.
//!
//! A scan runs as a small pipeline. Directory walking is synchronous
//! (`walkdir`) and runs on a blocking thread, feeding a bounded channel so a
//! slow provider applies backpressure to discovery instead of letting the
//! channel grow without bound. A dispatch task drains the channel, parses
//! and enqueues each file, and hands it to a matcher worker pool bounded by
//! a semaphore. Cancellation is cooperative: the walker checks the token
//! between entries and the dispatcher stops handing out work, while matches
//! already in flight run to completion so their results are kept.

use crate::config::ScanConfig;
use crate::matcher::Matcher;
use crate::parser;
use crate::provider::MetadataProvider;
use crate::queue::ScanQueue;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root does not exist: {0}")]
    RootNotFound(PathBuf),
    #[error("no scan roots configured")]
    NoRoots,
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// Shared, live progress counters for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    discovered: Arc<AtomicU64>,
    matched: Arc<AtomicU64>,
}

impl ScanProgress {
    /// Files discovered and dispatched for matching so far.
    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    /// Files whose match verdict has been recorded so far.
    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }
}

/// Handle to a running scan.
pub struct ScanHandle {
    progress: ScanProgress,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl ScanHandle {
    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    /// Request cooperative cancellation. Discovery stops, no new matches
    /// are dispatched, and in-flight matches finish and keep their results.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the scan pipeline to drain completely.
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            log::error!("scan task failed: {}", e);
        }
    }
}

enum WalkItem {
    File(PathBuf),
    /// A path the walker could not read, with the diagnostic.
    Failed(Option<PathBuf>, String),
}

pub struct ScanOrchestrator<P> {
    matcher: Arc<Matcher<P>>,
    queue: Arc<ScanQueue>,
    config: ScanConfig,
}

impl<P: MetadataProvider + 'static> ScanOrchestrator<P> {
    pub fn new(matcher: Arc<Matcher<P>>, queue: Arc<ScanQueue>, config: ScanConfig) -> Self {
        Self {
            matcher,
            queue,
            config,
        }
    }

    /// Start a scan over the configured roots. Returns immediately with a
    /// handle; the pipeline runs on spawned tasks.
    pub fn scan(&self) -> Result<ScanHandle, ScanError> {
        if self.config.roots.is_empty() {
            return Err(ScanError::NoRoots);
        }
        for root in &self.config.roots {
            if !root.exists() {
                return Err(ScanError::RootNotFound(root.clone()));
            }
        }
        let extensions = build_extension_set(&self.config.allowed_extensions)?;
        let ignored_dirs = build_pattern_set(&self.config.ignore_patterns)?;

        let progress = ScanProgress::default();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<WalkItem>(self.config.pipeline_depth.max(1));

        let roots = self.config.roots.clone();
        let walker_cancel = cancel.clone();
        let walker = tokio::task::spawn_blocking(move || {
            walk_roots(&roots, &extensions, &ignored_dirs, &tx, &walker_cancel);
        });

        let dispatch = DispatchTask {
            matcher: self.matcher.clone(),
            queue: self.queue.clone(),
            progress: progress.clone(),
            cancel: cancel.clone(),
            concurrency: self.config.match_concurrency.max(1),
        };
        let join = tokio::spawn(async move {
            dispatch.run(rx).await;
            if let Err(e) = walker.await {
                log::error!("directory walker panicked: {}", e);
            }
        });

        log::info!(
            "scan started over {} root(s), {} matcher worker(s)",
            self.config.roots.len(),
            self.config.match_concurrency.max(1)
        );
        Ok(ScanHandle {
            progress,
            cancel,
            join,
        })
    }
}

struct DispatchTask<P> {
    matcher: Arc<Matcher<P>>,
    queue: Arc<ScanQueue>,
    progress: ScanProgress,
    cancel: CancellationToken,
    concurrency: usize,
}

impl<P: MetadataProvider + 'static> DispatchTask<P> {
    async fn run(self, mut rx: mpsc::Receiver<WalkItem>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            // Reap finished workers so the set stays bounded by the
            // semaphore width instead of growing with the scan.
            while workers.try_join_next().is_some() {}

            match item {
                WalkItem::File(path) => {
                    let identity = parser::parse(&path);
                    let id = self.queue.enqueue(identity.clone());
                    self.progress.discovered.fetch_add(1, Ordering::Relaxed);

                    let permit = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        permit = semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    let matcher = self.matcher.clone();
                    let queue = self.queue.clone();
                    let matched = self.progress.matched.clone();
                    workers.spawn(async move {
                        let result = matcher.match_identity(&identity).await;
                        match queue.apply_match(id, result) {
                            Ok(()) => {
                                matched.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => log::warn!("could not record match: {}", e),
                        }
                        drop(permit);
                    });
                }
                WalkItem::Failed(path, detail) => {
                    let path = path.unwrap_or_default();
                    log::warn!("skipping unreadable path {:?}: {}", path, detail);
                    self.queue.enqueue_skipped(parser::parse(&path), detail);
                }
            }
        }

        // Let in-flight matches finish; their verdicts are kept even when
        // the scan was cancelled.
        while workers.join_next().await.is_some() {}
        log::info!(
            "scan finished: {} discovered, {} matched",
            self.progress.discovered(),
            self.progress.matched()
        );
    }
}

/// Blocking walk of all roots. Symlinks are followed; walkdir's own loop
/// detection turns symlink cycles into per-path errors, which surface as
/// skipped items rather than aborting the walk.
fn walk_roots(
    roots: &[PathBuf],
    extensions: &GlobSet,
    ignored_dirs: &GlobSet,
    tx: &mpsc::Sender<WalkItem>,
    cancel: &CancellationToken,
) {
    for root in roots {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !is_ignored_dir(entry, ignored_dirs));
        for entry in walker {
            if cancel.is_cancelled() {
                return;
            }
            let item = match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() || !matches_extension(&entry, extensions) {
                        continue;
                    }
                    WalkItem::File(entry.into_path())
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf());
                    WalkItem::Failed(path, e.to_string())
                }
            };
            // Receiver gone means the scan was torn down.
            if tx.blocking_send(item).is_err() {
                return;
            }
        }
    }
}

fn is_ignored_dir(entry: &DirEntry, ignored_dirs: &GlobSet) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| ignored_dirs.is_match(name))
            .unwrap_or(false)
}

fn matches_extension(entry: &DirEntry, extensions: &GlobSet) -> bool {
    // Globs are built lowercase; compare against a lowercased name so
    // `Movie.MKV` still matches.
    entry
        .file_name()
        .to_str()
        .map(|name| extensions.is_match(name.to_lowercase()))
        .unwrap_or(false)
}

fn build_extension_set(extensions: &[String]) -> Result<GlobSet, ScanError> {
    let patterns: Vec<String> = extensions
        .iter()
        .map(|ext| format!("*.{}", ext.trim_start_matches('.').to_lowercase()))
        .collect();
    build_pattern_set(&patterns)
}

fn build_pattern_set(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ScanError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ScanError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_set_normalizes_patterns() {
        let set = build_extension_set(&["mkv".to_string(), ".MP4".to_string()]).unwrap();
        assert!(set.is_match("movie.mkv"));
        assert!(set.is_match("movie.mp4"));
        assert!(!set.is_match("movie.srt"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = build_pattern_set(&["[".to_string()]);
        assert!(matches!(err, Err(ScanError::InvalidPattern { .. })));
    }
}
