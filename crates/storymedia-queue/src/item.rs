//! Queue items and the patches stage transitions apply to them.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use storymedia_core::error::{ItemError, Operation};
use storymedia_core::models::{
    AdditionalData, BatchId, ItemId, ItemStage, LocalFile, ResourceDescriptor, ResourceId,
    ResourceKind, TransformFlags,
};

use crate::listener::UploadListener;

/// Transcode-class operations in dispatch priority order.
pub const TRANSCODE_PRIORITY: [Operation; 6] = [
    Operation::ConvertHeif,
    Operation::ConvertGif,
    Operation::Trim,
    Operation::Mute,
    Operation::Crop,
    Operation::Optimize,
];

/// Unit of work tracked by the queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// File currently being acted on; replaced as stages produce new files.
    #[serde(skip)]
    pub file: LocalFile,
    #[serde(skip)]
    pub poster_file: Option<LocalFile>,
    pub resource: ResourceDescriptor,
    /// Story resource this item is a derived replacement for.
    pub original_resource_id: Option<ResourceId>,
    /// Resource id this item replaced once its upload succeeded.
    pub previous_resource_id: Option<ResourceId>,
    pub stage: ItemStage,
    pub flags: TransformFlags,
    pub additional_data: AdditionalData,
    pub error: Option<ItemError>,
    pub batch_id: BatchId,
}

impl QueueItem {
    pub fn new(
        file: LocalFile,
        resource: ResourceDescriptor,
        flags: TransformFlags,
        additional_data: AdditionalData,
        batch_id: BatchId,
    ) -> Self {
        Self {
            id: ItemId::new(),
            file,
            poster_file: None,
            resource,
            original_resource_id: None,
            previous_resource_id: None,
            stage: ItemStage::Pending,
            flags,
            additional_data,
            error: None,
            batch_id,
        }
    }

    pub fn wants_trim(&self) -> bool {
        self.flags.wants_trim()
    }

    pub fn wants_mute(&self) -> bool {
        self.flags.wants_mute()
    }

    pub fn wants_crop(&self) -> bool {
        self.flags.wants_crop()
    }

    pub fn is_animated_gif(&self) -> bool {
        self.flags.is_animated_gif()
    }

    /// Not terminal and not yet uploaded.
    pub fn is_processing(&self) -> bool {
        !self.stage.is_terminal() && self.stage != ItemStage::Uploaded
    }

    /// Matches the resource this item currently works on, under its
    /// current id or the id it replaced.
    pub fn matches_current_resource(&self, resource_id: &ResourceId) -> bool {
        &self.resource.id == resource_id || self.previous_resource_id.as_ref() == Some(resource_id)
    }

    /// Matches under any identity the item has carried.
    pub fn matches_any_resource(&self, resource_id: &ResourceId) -> bool {
        self.matches_current_resource(resource_id)
            || self.original_resource_id.as_ref() == Some(resource_id)
    }

    /// Transform operations this item needs, in the order they run.
    ///
    /// An item that reached `PendingTranscoding` without any requested
    /// transform needs the generic optimize pass.
    pub fn planned_operations(&self) -> Vec<Operation> {
        let mut operations = Vec::new();
        if self.resource.is_heif() {
            operations.push(Operation::ConvertHeif);
        }
        if self.is_animated_gif() {
            operations.push(Operation::ConvertGif);
        }
        if self.wants_trim() {
            operations.push(Operation::Trim);
        }
        if self.wants_mute() {
            operations.push(Operation::Mute);
        }
        if self.wants_crop() {
            operations.push(Operation::Crop);
        }
        if operations.is_empty() {
            operations.push(Operation::Optimize);
        }
        operations
    }

    /// Whether the prepare step must route this item through the transcode lock.
    pub fn requires_transform(&self, already_optimized: bool) -> bool {
        self.flags.any()
            || self.resource.is_heif()
            || (self.resource.kind == ResourceKind::Video && !already_optimized)
    }
}

/// Rank of an operation in [`TRANSCODE_PRIORITY`]; lower runs first.
pub fn transcode_priority(operation: Operation) -> usize {
    TRANSCODE_PRIORITY
        .iter()
        .position(|op| *op == operation)
        .unwrap_or(TRANSCODE_PRIORITY.len())
}

/// Stage an item holds while `operation` runs.
pub fn stage_for_operation(operation: Operation) -> ItemStage {
    match operation {
        Operation::Trim => ItemStage::Trimming,
        Operation::Mute => ItemStage::Muting,
        Operation::Crop => ItemStage::Cropping,
        _ => ItemStage::Transcoding,
    }
}

/// Partial update of a resource descriptor. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceUpdate {
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub is_muted: Option<bool>,
    pub is_optimized: Option<bool>,
    pub poster: Option<String>,
    pub poster_id: Option<ResourceId>,
}

impl ResourceUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ResourceUpdate::default()
    }

    /// Known dimensions confirm a placeholder resource.
    pub fn apply(self, resource: &mut ResourceDescriptor) {
        if self.width.is_some() && self.height.is_some() {
            resource.is_placeholder = false;
        }
        if let Some(mime_type) = self.mime_type {
            resource.mime_type = mime_type;
        }
        if let Some(width) = self.width {
            resource.width = Some(width);
        }
        if let Some(height) = self.height {
            resource.height = Some(height);
        }
        if let Some(duration) = self.duration_seconds {
            resource.duration_seconds = Some(duration);
        }
        if let Some(muted) = self.is_muted {
            resource.is_muted = muted;
        }
        if let Some(optimized) = self.is_optimized {
            resource.is_optimized = optimized;
        }
        if let Some(poster) = self.poster {
            resource.poster = Some(poster);
        }
        if let Some(poster_id) = self.poster_id {
            resource.poster_id = Some(poster_id);
        }
    }
}

/// Changes merged into an item by a stage transition.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub file: Option<LocalFile>,
    pub poster_file: Option<LocalFile>,
    /// Full replacement, applied before `resource_update`.
    pub resource: Option<ResourceDescriptor>,
    pub resource_update: ResourceUpdate,
    /// Merged into the item's accumulated data; later values win.
    pub additional_data: Option<AdditionalData>,
    pub previous_resource_id: Option<ResourceId>,
    /// Only kept when the transition is into `Cancelled`.
    pub error: Option<ItemError>,
}

impl ItemPatch {
    pub fn with_file(mut self, file: LocalFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_poster_file(mut self, poster_file: LocalFile) -> Self {
        self.poster_file = Some(poster_file);
        self
    }

    pub fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_resource_update(mut self, update: ResourceUpdate) -> Self {
        self.resource_update = update;
        self
    }

    pub fn with_additional_data(mut self, additional_data: AdditionalData) -> Self {
        self.additional_data = Some(additional_data);
        self
    }

    pub fn with_previous_resource_id(mut self, resource_id: ResourceId) -> Self {
        self.previous_resource_id = Some(resource_id);
        self
    }

    pub fn failed(error: ItemError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Apply to `item`, which is already in its next stage.
    pub(crate) fn apply(self, item: &mut QueueItem) {
        if let Some(file) = self.file {
            item.file = file;
        }
        if let Some(poster_file) = self.poster_file {
            item.poster_file = Some(poster_file);
        }
        if let Some(resource) = self.resource {
            item.resource = resource;
        }
        self.resource_update.apply(&mut item.resource);
        if let Some(additional_data) = self.additional_data {
            item.additional_data = std::mem::take(&mut item.additional_data).merge(additional_data);
        }
        if let Some(previous) = self.previous_resource_id {
            item.previous_resource_id = Some(previous);
        }
        if item.stage == ItemStage::Cancelled {
            item.error = self.error;
        }
    }
}

/// Caller request for one enqueued file.
#[derive(Clone)]
pub struct AddItemRequest {
    pub file: LocalFile,
    /// Derived from the file by the introspector when absent.
    pub resource: Option<ResourceDescriptor>,
    pub poster_file: Option<LocalFile>,
    pub flags: TransformFlags,
    pub additional_data: AdditionalData,
    pub original_resource_id: Option<ResourceId>,
    pub listener: Option<Arc<dyn UploadListener>>,
}

impl AddItemRequest {
    pub fn new(file: LocalFile) -> Self {
        Self {
            file,
            resource: None,
            poster_file: None,
            flags: TransformFlags::default(),
            additional_data: AdditionalData::default(),
            original_resource_id: None,
            listener: None,
        }
    }

    pub fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_poster_file(mut self, poster_file: LocalFile) -> Self {
        self.poster_file = Some(poster_file);
        self
    }

    pub fn with_flags(mut self, flags: TransformFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_additional_data(mut self, additional_data: AdditionalData) -> Self {
        self.additional_data = additional_data;
        self
    }

    pub fn with_original_resource_id(mut self, resource_id: ResourceId) -> Self {
        self.original_resource_id = Some(resource_id);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn UploadListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl fmt::Debug for AddItemRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddItemRequest")
            .field("file", &self.file)
            .field("resource", &self.resource)
            .field("flags", &self.flags)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}
