//! Read-only predicates over a queue snapshot.
//!
//! The stage counts and batch set are built once per snapshot on first
//! use and reused by every later query against the same snapshot.

use std::collections::{HashMap, HashSet};

use storymedia_core::models::{BatchId, ItemStage, ResourceDescriptor, ResourceId};

use crate::item::QueueItem;
use crate::state::QueueState;

#[derive(Debug, Default)]
pub(crate) struct QueueIndex {
    stage_counts: HashMap<ItemStage, usize>,
    batches: HashSet<BatchId>,
}

impl QueueIndex {
    fn build(state: &QueueState) -> Self {
        let mut index = QueueIndex::default();
        for item in state.items() {
            *index.stage_counts.entry(item.stage).or_default() += 1;
            index.batches.insert(item.batch_id);
        }
        index
    }

    fn count(&self, stage: ItemStage) -> usize {
        self.stage_counts.get(&stage).copied().unwrap_or(0)
    }
}

impl QueueState {
    fn index(&self) -> &QueueIndex {
        self.index.get_or_init(|| QueueIndex::build(self))
    }

    /// Number of items currently in `stage`.
    pub fn count_in_stage(&self, stage: ItemStage) -> usize {
        self.index().count(stage)
    }

    /// Items holding the transcode lock, i.e. in a transcoding-class stage.
    pub fn active_transcodes(&self) -> usize {
        [
            ItemStage::Transcoding,
            ItemStage::Trimming,
            ItemStage::Muting,
            ItemStage::Cropping,
        ]
        .into_iter()
        .map(|stage| self.count_in_stage(stage))
        .sum()
    }

    pub fn is_uploading(&self) -> bool {
        self.count_in_stage(ItemStage::Uploading) > 0
    }

    pub fn is_transcoding(&self) -> bool {
        self.count_in_stage(ItemStage::Transcoding) > 0
    }

    pub fn is_muting(&self) -> bool {
        self.count_in_stage(ItemStage::Muting) > 0
    }

    pub fn is_cropping(&self) -> bool {
        self.count_in_stage(ItemStage::Cropping) > 0
    }

    pub fn is_trimming(&self) -> bool {
        self.count_in_stage(ItemStage::Trimming) > 0
    }

    fn any_current(&self, resource_id: &ResourceId, pred: impl Fn(&QueueItem) -> bool) -> bool {
        self.items()
            .iter()
            .any(|item| item.matches_current_resource(resource_id) && pred(item))
    }

    /// The resource the caller started with is still being worked on.
    pub fn is_current_resource_processing(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, QueueItem::is_processing)
    }

    /// A resource derived from `resource_id` (e.g. an optimized copy) is
    /// still being worked on.
    pub fn is_new_resource_processing(&self, resource_id: &ResourceId) -> bool {
        self.items().iter().any(|item| {
            item.original_resource_id.as_ref() == Some(resource_id) && item.is_processing()
        })
    }

    pub fn is_current_resource_uploading(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, |item| item.stage == ItemStage::Uploading)
    }

    pub fn is_current_resource_transcoding(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, |item| item.stage == ItemStage::Transcoding)
    }

    pub fn is_current_resource_muting(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, |item| item.stage == ItemStage::Muting)
    }

    pub fn is_current_resource_trimming(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, |item| item.stage == ItemStage::Trimming)
    }

    pub fn is_current_resource_cropping(&self, resource_id: &ResourceId) -> bool {
        self.any_current(resource_id, |item| item.stage == ItemStage::Cropping)
    }

    /// True when the resource can be submitted for a new transcode: it is
    /// hosted by us, has a source, and is not already queued under any of
    /// its identities.
    pub fn can_transcode_resource(&self, resource: &ResourceDescriptor) -> bool {
        if resource.is_external || resource.src.trim().is_empty() {
            return false;
        }
        !self
            .items()
            .iter()
            .any(|item| item.matches_any_resource(&resource.id))
    }

    pub fn is_batch_uploading(&self, batch_id: BatchId) -> bool {
        self.index().batches.contains(&batch_id)
    }
}
