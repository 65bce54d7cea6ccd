//! Per-item lifecycle callbacks supplied by callers at enqueue time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use storymedia_core::error::ItemError;
use storymedia_core::models::ItemId;

use crate::item::QueueItem;

/// Lifecycle callbacks for one queue item.
///
/// All methods default to no-ops. They run on the task that performed the
/// transition and must not block.
pub trait UploadListener: Send + Sync {
    /// The item was claimed by the scheduler.
    fn on_upload_start(&self, _item: &QueueItem) {}

    /// The item moved to another in-flight stage.
    fn on_upload_progress(&self, _item: &QueueItem) {}

    /// The upload succeeded; `item.resource` is the stored resource.
    fn on_upload_success(&self, _item: &QueueItem) {}

    /// The item was cancelled. `item` is the state at failure time, usable
    /// for rendering a thumbnail of what failed.
    fn on_upload_error(&self, _item: &QueueItem, _error: &ItemError) {}
}

/// Listener registry keyed by item id.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<ItemId, Arc<dyn UploadListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, item_id: ItemId, listener: Arc<dyn UploadListener>) {
        self.lock().insert(item_id, listener);
    }

    pub fn unregister(&self, item_id: ItemId) {
        self.lock().remove(&item_id);
    }

    pub fn get(&self, item_id: ItemId) -> Option<Arc<dyn UploadListener>> {
        self.lock().get(&item_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ItemId, Arc<dyn UploadListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
