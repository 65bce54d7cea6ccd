//! Shared holder for the current queue snapshot.

use std::sync::Arc;

use tokio::sync::watch;

use storymedia_core::models::{ItemId, ItemStage, LocalFile};

use crate::item::{ItemPatch, QueueItem};
use crate::state::QueueState;

/// Holds the latest [`QueueState`] and publishes every change.
///
/// All mutation goes through the reducers in [`QueueState`]; a reducer that
/// returns `None` leaves the snapshot untouched and wakes nobody.
pub struct QueueStore {
    tx: watch::Sender<Arc<QueueState>>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(QueueState::new()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<QueueState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<QueueState>> {
        self.tx.subscribe()
    }

    pub fn item(&self, id: ItemId) -> Option<Arc<QueueItem>> {
        self.snapshot().item(id).cloned()
    }

    fn apply<T>(&self, reducer: impl FnOnce(&QueueState) -> Option<(QueueState, T)>) -> Option<T> {
        let mut output = None;
        self.tx.send_if_modified(|state| match reducer(state) {
            Some((next, value)) => {
                *state = Arc::new(next);
                output = Some(value);
                true
            }
            None => false,
        });
        output
    }

    pub fn add_item(&self, item: QueueItem) -> Option<Arc<QueueItem>> {
        let id = item.id;
        self.apply(|state| {
            let next = state.add_item(item)?;
            let added = next.item(id)?.clone();
            Some((next, added))
        })
    }

    /// Apply a transition; returns the stage left and the updated item.
    pub fn transition(
        &self,
        id: ItemId,
        next_stage: ItemStage,
        patch: ItemPatch,
    ) -> Option<(ItemStage, Arc<QueueItem>)> {
        self.apply(|state| {
            let from = state.item(id)?.stage;
            let next = state.transition(id, next_stage, patch)?;
            let updated = next.item(id)?.clone();
            Some((next, (from, updated)))
        })
    }

    pub fn replace_placeholder_resource(
        &self,
        id: ItemId,
        width: u32,
        height: u32,
        poster_file: Option<LocalFile>,
    ) -> bool {
        self.apply(|state| {
            state
                .replace_placeholder_resource(id, width, height, poster_file)
                .map(|next| (next, ()))
        })
        .is_some()
    }

    /// Remove a terminal item; returns it as it was when removed.
    pub fn remove_item(&self, id: ItemId) -> Option<Arc<QueueItem>> {
        self.apply(|state| {
            let removed = state.item(id)?.clone();
            let next = state.remove_item(id)?;
            Some((next, removed))
        })
    }
}
