//! Hooks for telemetry integration
//!
//! The pipeline only signals that something happened; recording it is up to
//! whoever implements [`EventSink`]. Calls are synchronous and must not block.

use crate::error::{FailureKind, Operation};
use crate::models::{BatchId, ItemId, ItemStage, ResourceId};

/// Events emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ItemQueued {
        item_id: ItemId,
        batch_id: BatchId,
        resource_id: ResourceId,
    },
    StageChanged {
        item_id: ItemId,
        from: ItemStage,
        to: ItemStage,
    },
    ItemFailed {
        item_id: ItemId,
        operation: Option<Operation>,
        kind: FailureKind,
    },
    ItemUploaded {
        item_id: ItemId,
        resource_id: ResourceId,
        previous_resource_id: ResourceId,
    },
    PlaceholderRefined {
        item_id: ItemId,
    },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::ItemQueued { .. } => "item_queued",
            PipelineEvent::StageChanged { .. } => "stage_changed",
            PipelineEvent::ItemFailed { .. } => "item_failed",
            PipelineEvent::ItemUploaded { .. } => "item_uploaded",
            PipelineEvent::PlaceholderRefined { .. } => "placeholder_refined",
        }
    }
}

/// Receiver for pipeline events.
pub trait EventSink: Send + Sync {
    fn track(&self, event: PipelineEvent);
}

/// No-op implementation for when tracking is disabled
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn track(&self, _event: PipelineEvent) {}
}

/// Writes every event to the `tracing` subscriber at debug level.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn track(&self, event: PipelineEvent) {
        tracing::debug!(event = event.name(), details = ?event, "Pipeline event");
    }
}
