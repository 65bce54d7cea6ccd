//! Queue state and its pure transition functions.
//!
//! Every reducer takes `&self` and returns the next snapshot, or `None`
//! when the call changes nothing (unknown id, illegal transition, guard
//! not met). Snapshots are never mutated after construction, so derived
//! data can be memoized per snapshot.

use std::sync::{Arc, OnceLock};

use storymedia_core::models::{ItemId, ItemStage, LocalFile};

use crate::item::{ItemPatch, QueueItem, ResourceUpdate};
use crate::query::QueueIndex;
use crate::view::QueueView;

/// Immutable snapshot of the queue, items in enqueue order.
#[derive(Default)]
pub struct QueueState {
    items: Vec<Arc<QueueItem>>,
    pub(crate) index: OnceLock<QueueIndex>,
    pub(crate) view: OnceLock<Arc<QueueView>>,
}

impl Clone for QueueState {
    fn clone(&self) -> Self {
        Self::from_items(self.items.clone())
    }
}

impl std::fmt::Debug for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|item| (item.id, item.stage)))
            .finish()
    }
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_items(items: Vec<Arc<QueueItem>>) -> Self {
        Self {
            items,
            index: OnceLock::new(),
            view: OnceLock::new(),
        }
    }

    pub fn items(&self) -> &[Arc<QueueItem>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: ItemId) -> Option<&Arc<QueueItem>> {
        self.items.iter().find(|item| item.id == id)
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn with_replaced(&self, position: usize, item: QueueItem) -> QueueState {
        let mut items = self.items.clone();
        items[position] = Arc::new(item);
        Self::from_items(items)
    }

    /// Append a new item. Items must enter in `Pending`; duplicates are rejected.
    pub fn add_item(&self, item: QueueItem) -> Option<QueueState> {
        if item.stage != ItemStage::Pending || self.position(item.id).is_some() {
            return None;
        }
        let mut items = self.items.clone();
        items.push(Arc::new(item));
        Some(Self::from_items(items))
    }

    /// Move an item to `next` and merge `patch` into it.
    pub fn transition(&self, id: ItemId, next: ItemStage, patch: ItemPatch) -> Option<QueueState> {
        let position = self.position(id)?;
        let current = &self.items[position];
        if !current.stage.can_transition_to(next) {
            return None;
        }

        let mut item = QueueItem::clone(current);
        item.stage = next;
        patch.apply(&mut item);
        Some(self.with_replaced(position, item))
    }

    /// Apply preview dimensions to the item's current resource, only while
    /// it is still a placeholder and its upload has not started. Stage and
    /// file are left alone; an already queued poster wins over `poster_file`.
    pub fn replace_placeholder_resource(
        &self,
        id: ItemId,
        width: u32,
        height: u32,
        poster_file: Option<LocalFile>,
    ) -> Option<QueueState> {
        let position = self.position(id)?;
        let current = &self.items[position];
        if !current.resource.is_placeholder
            || current.stage.is_terminal()
            || matches!(current.stage, ItemStage::Uploading | ItemStage::Uploaded)
        {
            return None;
        }

        let mut item = QueueItem::clone(current);
        ResourceUpdate {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
        .apply(&mut item.resource);
        if item.poster_file.is_none() {
            item.poster_file = poster_file;
        }
        Some(self.with_replaced(position, item))
    }

    /// Drop an item that reached `Finished` or `Cancelled`.
    pub fn remove_item(&self, id: ItemId) -> Option<QueueState> {
        let position = self.position(id)?;
        if !self.items[position].stage.is_terminal() {
            return None;
        }
        let mut items = self.items.clone();
        items.remove(position);
        Some(Self::from_items(items))
    }
}
