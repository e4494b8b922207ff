//! Watcher registry: which forms are monitored, and how to stop each one.
//!
//! The registry is the only structure mutated by concurrent callers. Every
//! mutation goes through the `DashMap` entry API, so check-and-insert for a
//! given id is atomic and at most one poll loop is ever spawned per id.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;

use crate::types::WatchedEntityId;

/// Cancellation handle for one running poll loop.
///
/// `generation` distinguishes successive loops for the same id, so a loop
/// that was stopped and replaced never mistakes its successor's entry for
/// its own.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    token: CancellationToken,
    generation: u64,
}

impl WatcherHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub struct WatcherRegistry {
    watchers: DashMap<WatchedEntityId, WatcherHandle>,
    root: CancellationToken,
    next_generation: AtomicU64,
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self {
            watchers: DashMap::new(),
            root: CancellationToken::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Register `id` and return its new handle, or `None` if it is already
    /// active.
    pub fn try_register(&self, id: &WatchedEntityId) -> Option<WatcherHandle> {
        match self.watchers.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let handle = WatcherHandle {
                    token: self.root.child_token(),
                    generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                };
                slot.insert(handle.clone());
                Some(handle)
            }
        }
    }

    /// `false` (no-op) if `id` is already registered.
    pub fn register(&self, id: &WatchedEntityId) -> bool {
        self.try_register(id).is_some()
    }

    /// Remove `id` and cancel its loop. Returns whether anything was removed.
    pub fn unregister(&self, id: &WatchedEntityId) -> bool {
        match self.watchers.remove(id) {
            Some((_, handle)) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: &WatchedEntityId) -> bool {
        self.watchers.contains_key(id)
    }

    /// Whether `id` is still registered under the given generation.
    pub fn is_current(&self, id: &WatchedEntityId, generation: u64) -> bool {
        self.watchers
            .get(id)
            .is_some_and(|h| h.generation == generation)
    }

    /// Remove the entry for `id` only if it still belongs to `generation`.
    /// Used by a loop that terminates on its own.
    pub fn release(&self, id: &WatchedEntityId, generation: u64) -> bool {
        self.watchers
            .remove_if(id, |_, h| h.generation == generation)
            .is_some()
    }

    pub fn active_ids(&self) -> Vec<WatchedEntityId> {
        let mut ids: Vec<_> = self.watchers.iter().map(|e| e.key().clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Cancel every loop and clear the registry.
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.watchers.clear();
    }
}
