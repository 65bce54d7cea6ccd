//! Shared pipeline context
//!
//! Holds the store, the collaborators and the caller-facing hooks. The
//! scheduler and every stage driver share one `Arc<PipelineContext>` and
//! only ever touch the queue through [`PipelineContext::transition`] and the
//! other store entry points.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use storymedia_core::error::{ErrorMetadata, LogLevel, Operation, PipelineError, PipelineResult};
use storymedia_core::hooks::{EventSink, PipelineEvent};
use storymedia_core::models::{ItemId, ItemStage};
use storymedia_core::PipelineConfig;
use storymedia_processing::{MediaTransformer, OptimizationPolicy, ResourceIntrospector, Uploader};

use crate::item::{ItemPatch, QueueItem};
use crate::listener::ListenerRegistry;
use crate::store::QueueStore;

/// External collaborators the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub transformer: Arc<dyn MediaTransformer>,
    pub uploader: Arc<dyn Uploader>,
    pub introspector: Arc<dyn ResourceIntrospector>,
    pub optimization: Arc<dyn OptimizationPolicy>,
}

pub(crate) struct PipelineContext {
    pub store: QueueStore,
    pub collaborators: Collaborators,
    pub listeners: ListenerRegistry,
    pub events: Arc<dyn EventSink>,
    pub timeout: Option<Duration>,
    pub heif_target_mime: String,
    /// Wakes the scheduler when a lock is released without a store change.
    pub wake: Notify,
}

impl PipelineContext {
    pub fn new(
        config: &PipelineConfig,
        collaborators: Collaborators,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store: QueueStore::new(),
            collaborators,
            listeners: ListenerRegistry::new(),
            events,
            timeout: config.collaborator_timeout(),
            heif_target_mime: config.heif_target_mime.clone(),
            wake: Notify::new(),
        }
    }

    /// Current state of an item, re-read from the store.
    pub fn current(&self, id: ItemId) -> Option<Arc<QueueItem>> {
        self.store.item(id)
    }

    /// Apply a stage transition and notify listeners and the event sink.
    ///
    /// Returns `None` when the store rejected the transition.
    pub fn transition(
        &self,
        id: ItemId,
        next: ItemStage,
        patch: ItemPatch,
    ) -> Option<Arc<QueueItem>> {
        let (from, item) = self.store.transition(id, next, patch)?;

        tracing::debug!(
            item.id = %id,
            resource.id = %item.resource.id,
            from = %from,
            to = %next,
            "Stage transition"
        );
        self.events.track(PipelineEvent::StageChanged {
            item_id: id,
            from,
            to: next,
        });

        let listener = self.listeners.get(id);
        match next {
            ItemStage::Preparing => {
                if let Some(listener) = &listener {
                    listener.on_upload_start(&item);
                }
            }
            ItemStage::Uploaded => {
                self.events.track(PipelineEvent::ItemUploaded {
                    item_id: id,
                    resource_id: item.resource.id.clone(),
                    previous_resource_id: item.previous_resource_id.clone().unwrap_or_default(),
                });
                if let Some(listener) = &listener {
                    listener.on_upload_success(&item);
                }
            }
            ItemStage::Cancelled => {
                if let Some(error) = &item.error {
                    self.events.track(PipelineEvent::ItemFailed {
                        item_id: id,
                        operation: error.operation,
                        kind: error.kind,
                    });
                    if let Some(listener) = &listener {
                        listener.on_upload_error(&item, error);
                    }
                }
            }
            stage if stage.is_in_progress() => {
                if let Some(listener) = &listener {
                    listener.on_upload_progress(&item);
                }
            }
            _ => {}
        }

        Some(item)
    }

    /// Cancel an item because of a hard failure.
    pub fn fail(&self, id: ItemId, error: PipelineError) {
        match error.log_level() {
            LogLevel::Debug => tracing::debug!(item.id = %id, error = %error, "Item cancelled"),
            LogLevel::Warn => tracing::warn!(item.id = %id, error = %error, "Item cancelled"),
            LogLevel::Error => tracing::error!(
                item.id = %id,
                error = %error,
                error_code = error.error_code(),
                "Item cancelled"
            ),
        }

        if self
            .transition(id, ItemStage::Cancelled, ItemPatch::failed(error.to_item_error()))
            .is_none()
        {
            tracing::debug!(item.id = %id, "Item already terminal, failure dropped");
        }
    }

    /// Run one collaborator call under the configured timeout.
    pub async fn call<T, F>(&self, operation: Operation, fut: F) -> PipelineResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(PipelineError::Timeout {
                        operation,
                        seconds: limit.as_secs(),
                    })
                }
            },
            None => fut.await,
        };
        result.map_err(|source| PipelineError::collaborator(operation, source))
    }

    /// Like [`call`](Self::call) but swallows failures.
    pub async fn best_effort<T, F>(&self, id: ItemId, operation: Operation, fut: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match self.call(operation, fut).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    item.id = %id,
                    operation = %operation,
                    error = %e,
                    "Best-effort step failed, continuing"
                );
                None
            }
        }
    }
}
