//! Sub-lists of a snapshot for UI consumption.

use std::sync::Arc;

use storymedia_core::models::ItemStage;

use crate::item::QueueItem;
use crate::state::QueueState;

#[derive(Debug, Default, Clone)]
pub struct QueueView {
    pub pending: Vec<Arc<QueueItem>>,
    /// Non-pending, non-terminal items (includes `Uploaded` awaiting finish).
    pub progress: Vec<Arc<QueueItem>>,
    pub uploaded: Vec<Arc<QueueItem>>,
    pub finished: Vec<Arc<QueueItem>>,
    pub failures: Vec<Arc<QueueItem>>,
    /// Everything not cancelled.
    pub active: Vec<Arc<QueueItem>>,
}

impl QueueView {
    fn build(state: &QueueState) -> Self {
        let mut view = QueueView::default();
        for item in state.items() {
            match item.stage {
                ItemStage::Pending => view.pending.push(item.clone()),
                ItemStage::Finished => view.finished.push(item.clone()),
                ItemStage::Cancelled => view.failures.push(item.clone()),
                ItemStage::Uploaded => {
                    view.uploaded.push(item.clone());
                    view.progress.push(item.clone());
                }
                _ => view.progress.push(item.clone()),
            }
            if item.stage != ItemStage::Cancelled {
                view.active.push(item.clone());
            }
        }
        view
    }
}

impl QueueState {
    /// Memoized view of this snapshot.
    pub fn view(&self) -> Arc<QueueView> {
        self.view
            .get_or_init(|| Arc::new(QueueView::build(self)))
            .clone()
    }
}
