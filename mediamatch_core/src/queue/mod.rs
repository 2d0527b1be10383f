//! Scan queue: per-file match lifecycle and review state.
//!
//! Items move through a small state machine:
//!
//! ```text
//! pending ─→ auto_matched ─→ accepted
//!    │            │
//!    │            └──────→ manual ─→ accepted
//!    ├─────→ uncertain ──────┤
//!    ├─────→ error ──────────┤
//!    └─────→ (any non-terminal) ─→ skipped
//! ```
//!
//! `accepted` and `skipped` are terminal; only terminal items can be
//! removed. All mutation goes through the queue so observers can follow
//! along via broadcast events.

use crate::matcher::{MatchResult, MatchStatus};
use crate::parser::ParsedIdentity;
use crate::provider::ProviderCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    AutoMatched,
    Uncertain,
    Manual,
    Error,
    Accepted,
    Skipped,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Accepted | ItemState::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanQueueItem {
    pub id: ItemId,
    pub discovered_at: DateTime<Utc>,
    pub identity: ParsedIdentity,
    pub state: ItemState,
    pub match_result: Option<MatchResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    ItemAdded(ItemId),
    MatchUpdated(ItemId),
    ItemRemoved(ItemId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    #[error("no queue item with id {0}")]
    UnknownItem(ItemId),
    #[error("cannot {action} item {id} in state {state:?}")]
    InvalidTransition {
        id: ItemId,
        state: ItemState,
        action: &'static str,
    },
    #[error("item {0} is not in a terminal state")]
    NotTerminal(ItemId),
}

/// A reviewer's decision on an item.
#[derive(Debug, Clone)]
pub enum ReviewDecision {
    /// Adopt this candidate as the match.
    Candidate(ProviderCandidate),
    /// Exclude the file from matching.
    Skip,
}

pub struct ScanQueue {
    items: RwLock<BTreeMap<ItemId, ScanQueueItem>>,
    next_id: AtomicU64,
    events: broadcast::Sender<QueueEvent>,
}

impl Default for ScanQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            items: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Subscribe to queue change events. Slow subscribers that fall more
    /// than the channel capacity behind observe a lagged error, not a stall.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ItemId, ScanQueueItem>> {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ItemId, ScanQueueItem>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a freshly discovered file in `pending` state.
    pub fn enqueue(&self, identity: ParsedIdentity) -> ItemId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = ScanQueueItem {
            id,
            discovered_at: Utc::now(),
            identity,
            state: ItemState::Pending,
            match_result: None,
        };
        self.lock_write().insert(id, item);
        self.emit(QueueEvent::ItemAdded(id));
        id
    }

    /// Add a file that is already known to be excluded, e.g. because the
    /// walker could not read it. Lands directly in terminal `skipped`.
    pub fn enqueue_skipped(&self, identity: ParsedIdentity, reason: impl Into<String>) -> ItemId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = ScanQueueItem {
            id,
            discovered_at: Utc::now(),
            identity,
            state: ItemState::Skipped,
            match_result: Some(MatchResult::skipped(reason)),
        };
        self.lock_write().insert(id, item);
        self.emit(QueueEvent::ItemAdded(id));
        id
    }

    /// Record a matcher verdict on a `pending` item.
    pub fn apply_match(&self, id: ItemId, result: MatchResult) -> Result<(), QueueError> {
        let mut items = self.lock_write();
        let item = items.get_mut(&id).ok_or(QueueError::UnknownItem(id))?;
        if item.state != ItemState::Pending {
            return Err(QueueError::InvalidTransition {
                id,
                state: item.state,
                action: "apply a match to",
            });
        }
        let state = match result.status {
            MatchStatus::AutoMatched => ItemState::AutoMatched,
            MatchStatus::Uncertain => ItemState::Uncertain,
            MatchStatus::Error => ItemState::Error,
            // Manual and skipped verdicts come from reviewers, not the matcher.
            MatchStatus::Manual | MatchStatus::Skipped => {
                return Err(QueueError::InvalidTransition {
                    id,
                    state: item.state,
                    action: "apply a reviewer verdict to",
                });
            }
        };
        item.state = state;
        item.match_result = Some(result);
        drop(items);
        self.emit(QueueEvent::MatchUpdated(id));
        Ok(())
    }

    /// Apply a reviewer decision. Allowed from any non-terminal state:
    /// a hand-picked candidate moves the item to `manual`, a skip moves it
    /// straight to terminal `skipped`.
    pub fn review(&self, id: ItemId, decision: ReviewDecision) -> Result<(), QueueError> {
        let mut items = self.lock_write();
        let item = items.get_mut(&id).ok_or(QueueError::UnknownItem(id))?;
        if item.state.is_terminal() {
            return Err(QueueError::InvalidTransition {
                id,
                state: item.state,
                action: "review",
            });
        }
        match decision {
            ReviewDecision::Candidate(candidate) => {
                let mut result = item.match_result.take().unwrap_or(MatchResult {
                    status: MatchStatus::Manual,
                    confidence: 0.0,
                    chosen: None,
                    alternatives: Vec::new(),
                    error_detail: None,
                });
                result.status = MatchStatus::Manual;
                result.chosen = Some(candidate);
                result.error_detail = None;
                item.state = ItemState::Manual;
                item.match_result = Some(result);
            }
            ReviewDecision::Skip => {
                item.state = ItemState::Skipped;
                let detail = "skipped by reviewer";
                match item.match_result.as_mut() {
                    Some(result) => {
                        result.status = MatchStatus::Skipped;
                        result.error_detail = Some(detail.to_string());
                    }
                    None => item.match_result = Some(MatchResult::skipped(detail)),
                }
            }
        }
        drop(items);
        self.emit(QueueEvent::MatchUpdated(id));
        Ok(())
    }

    /// Confirm an `auto_matched` or `manual` item, moving it to terminal
    /// `accepted`.
    pub fn accept(&self, id: ItemId) -> Result<(), QueueError> {
        let mut items = self.lock_write();
        let item = items.get_mut(&id).ok_or(QueueError::UnknownItem(id))?;
        if !matches!(item.state, ItemState::AutoMatched | ItemState::Manual) {
            return Err(QueueError::InvalidTransition {
                id,
                state: item.state,
                action: "accept",
            });
        }
        item.state = ItemState::Accepted;
        drop(items);
        self.emit(QueueEvent::MatchUpdated(id));
        Ok(())
    }

    /// Remove a terminal item from the queue.
    pub fn remove(&self, id: ItemId) -> Result<ScanQueueItem, QueueError> {
        let mut items = self.lock_write();
        let state = items
            .get(&id)
            .map(|item| item.state)
            .ok_or(QueueError::UnknownItem(id))?;
        if !state.is_terminal() {
            return Err(QueueError::NotTerminal(id));
        }
        // Presence checked above.
        let item = items.remove(&id).ok_or(QueueError::UnknownItem(id))?;
        drop(items);
        self.emit(QueueEvent::ItemRemoved(id));
        Ok(item)
    }

    pub fn get(&self, id: ItemId) -> Option<ScanQueueItem> {
        self.lock_read().get(&id).cloned()
    }

    /// Snapshot of all items matching `predicate`, in insertion (id) order.
    /// Mutations racing with the snapshot affect whether an item appears,
    /// never the consistency of an individual item.
    pub fn items_where<F>(&self, predicate: F) -> Vec<ScanQueueItem>
    where
        F: Fn(&ScanQueueItem) -> bool,
    {
        self.lock_read()
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub fn items(&self) -> Vec<ScanQueueItem> {
        self.items_where(|_| true)
    }

    pub fn len(&self) -> usize {
        self.lock_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_read().is_empty()
    }

    /// Drop every item, emitting `ItemRemoved` for each so subscribers
    /// stay in sync with the emptied queue.
    pub fn clear(&self) {
        let mut items = self.lock_write();
        let removed: Vec<ItemId> = items.keys().copied().collect();
        items.clear();
        drop(items);
        for id in removed {
            self.emit(QueueEvent::ItemRemoved(id));
        }
    }
}
