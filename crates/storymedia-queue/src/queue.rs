//! Media queue: the caller-facing entry point of the pipeline.
//!
//! Shutdown: [`MediaQueue::shutdown`] stops the scheduler from starting new
//! work; drivers already running complete and commit their transitions.
//! Dropping the queue has the same effect.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use validator::Validate;

use storymedia_core::error::{Operation, PipelineError, PipelineResult};
use storymedia_core::hooks::{EventSink, PipelineEvent, TracingEventSink};
use storymedia_core::models::{
    BatchId, ItemId, ItemStage, ResourceId, ResourceKind, TransformFlags, TrimRange,
};
use storymedia_core::PipelineConfig;
use storymedia_processing::{is_animated_gif, MediaValidator};

use crate::context::{Collaborators, PipelineContext};
use crate::item::{AddItemRequest, ItemPatch, QueueItem};
use crate::listener::UploadListener;
use crate::scheduler::Scheduler;
use crate::state::QueueState;
use crate::view::QueueView;

struct PreparedItem {
    item: QueueItem,
    listener: Option<Arc<dyn UploadListener>>,
}

pub struct MediaQueue {
    ctx: Arc<PipelineContext>,
    validator: MediaValidator,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl MediaQueue {
    /// Create a queue that reports events to `tracing`.
    pub fn new(config: &PipelineConfig, collaborators: Collaborators) -> Self {
        Self::with_event_sink(config, collaborators, Arc::new(TracingEventSink))
    }

    pub fn with_event_sink(
        config: &PipelineConfig,
        collaborators: Collaborators,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            ctx: Arc::new(PipelineContext::new(config, collaborators, events)),
            validator: MediaValidator::from_config(config),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Spawn the scheduler. Returns `false` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut shutdown_tx = self.lock_shutdown();
        if shutdown_tx.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return false;
        }

        let (tx, rx) = mpsc::channel(1);
        let scheduler = Scheduler::new(self.ctx.clone());
        tokio::spawn(scheduler.run(rx));
        *shutdown_tx = Some(tx);
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock_shutdown()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Stop the scheduler. Running drivers are not interrupted.
    pub async fn shutdown(&self) {
        let tx = self.lock_shutdown().take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }

    fn lock_shutdown(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<()>>> {
        self.shutdown_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate and enqueue one file under a fresh batch id.
    #[tracing::instrument(skip_all, fields(file = %request.file.name))]
    pub async fn add_item(&self, request: AddItemRequest) -> PipelineResult<ItemId> {
        let prepared = self.prepare_item(request, BatchId::new()).await?;
        Ok(self.enqueue(prepared))
    }

    /// Enqueue several files under one batch id. All requests are validated
    /// first; if any is rejected nothing is enqueued.
    #[tracing::instrument(skip_all, fields(count = requests.len()))]
    pub async fn add_batch(
        &self,
        requests: Vec<AddItemRequest>,
    ) -> PipelineResult<(BatchId, Vec<ItemId>)> {
        let batch_id = BatchId::new();
        let mut prepared = Vec::with_capacity(requests.len());
        for request in requests {
            prepared.push(self.prepare_item(request, batch_id).await?);
        }

        let ids = prepared
            .into_iter()
            .map(|item| self.enqueue(item))
            .collect();
        Ok((batch_id, ids))
    }

    async fn prepare_item(
        &self,
        request: AddItemRequest,
        batch_id: BatchId,
    ) -> PipelineResult<PreparedItem> {
        let kind = self.validator.validate_file(&request.file)?;

        let mut flags = request.flags;
        if kind == ResourceKind::Gif && !flags.animated_gif && is_animated_gif(&request.file.data) {
            flags.animated_gif = true;
        }
        validate_flags(kind, &flags)?;

        let (mut resource, introspected_poster) = match request.resource {
            Some(resource) => (resource, None),
            None => {
                let local = self
                    .ctx
                    .call(
                        Operation::Introspect,
                        self.ctx
                            .collaborators
                            .introspector
                            .resource_from_local_file(&request.file),
                    )
                    .await?;
                (local.resource, local.poster_file)
            }
        };
        if resource.id.is_empty() {
            resource.id = ResourceId::temporary();
        }

        let mut additional_data = request.additional_data.absorb_resource_hints(&resource);
        if additional_data.original_id.is_none() {
            additional_data.original_id = request.original_resource_id.clone();
        }

        let mut item = QueueItem::new(request.file, resource, flags, additional_data, batch_id);
        item.poster_file = request.poster_file.or(introspected_poster);
        item.original_resource_id = request.original_resource_id;

        Ok(PreparedItem {
            item,
            listener: request.listener,
        })
    }

    fn enqueue(&self, prepared: PreparedItem) -> ItemId {
        let PreparedItem { item, listener } = prepared;
        let id = item.id;
        let batch_id = item.batch_id;
        let resource_id = item.resource.id.clone();

        // Registered first so the claim already sees it.
        if let Some(listener) = listener {
            self.ctx.listeners.register(id, listener);
        }
        self.ctx.store.add_item(item);

        tracing::info!(
            item.id = %id,
            batch.id = %batch_id,
            resource.id = %resource_id,
            "Item queued"
        );
        self.ctx.events.track(PipelineEvent::ItemQueued {
            item_id: id,
            batch_id,
            resource_id,
        });
        id
    }

    /// Move an uploaded item to `Finished` once the caller applied its resource.
    pub fn finish_item(&self, id: ItemId) -> PipelineResult<Arc<QueueItem>> {
        let item = self
            .ctx
            .current(id)
            .ok_or_else(|| PipelineError::ItemNotFound(id.to_string()))?;
        if item.stage != ItemStage::Uploaded {
            return Err(PipelineError::Validation(format!(
                "Item {} is {}, only uploaded items can be finished",
                id, item.stage
            )));
        }
        self.ctx
            .transition(id, ItemStage::Finished, ItemPatch::default())
            .ok_or_else(|| PipelineError::ItemNotFound(id.to_string()))
    }

    /// Evict a finished or cancelled item.
    pub fn remove_item(&self, id: ItemId) -> PipelineResult<Arc<QueueItem>> {
        let item = self
            .ctx
            .current(id)
            .ok_or_else(|| PipelineError::ItemNotFound(id.to_string()))?;
        let removed = self.ctx.store.remove_item(id).ok_or_else(|| {
            PipelineError::Validation(format!(
                "Item {} is {}, only finished or cancelled items can be removed",
                id, item.stage
            ))
        })?;
        self.ctx.listeners.unregister(id);
        tracing::debug!(item.id = %id, "Item removed");
        Ok(removed)
    }

    pub fn item(&self, id: ItemId) -> Option<Arc<QueueItem>> {
        self.ctx.current(id)
    }

    /// Current snapshot; the query functions are methods on it.
    pub fn snapshot(&self) -> Arc<QueueState> {
        self.ctx.store.snapshot()
    }

    pub fn view(&self) -> Arc<QueueView> {
        self.snapshot().view()
    }

    /// Receiver notified with every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueueState>> {
        self.ctx.store.subscribe()
    }

    /// Wait until the item's stage satisfies `predicate`.
    pub async fn wait_for_stage<P>(&self, id: ItemId, predicate: P) -> PipelineResult<Arc<QueueItem>>
    where
        P: Fn(ItemStage) -> bool,
    {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match snapshot.item(id) {
                Some(item) if predicate(item.stage) => return Ok(item.clone()),
                Some(_) => {}
                None => return Err(PipelineError::ItemNotFound(id.to_string())),
            }
            if rx.changed().await.is_err() {
                return Err(PipelineError::QueueClosed);
            }
        }
    }

    /// Wait until the item is uploaded or reached a terminal stage.
    pub async fn wait_until_settled(&self, id: ItemId) -> PipelineResult<Arc<QueueItem>> {
        self.wait_for_stage(id, |stage| stage == ItemStage::Uploaded || stage.is_terminal())
            .await
    }
}

/// Transform flags must fit the media they are applied to.
fn validate_flags(kind: ResourceKind, flags: &TransformFlags) -> PipelineResult<()> {
    if let Some(trim) = flags.trim {
        TrimRange::new(trim.start_ms, trim.end_ms).map_err(PipelineError::Validation)?;
    }
    if let Some(crop) = &flags.crop {
        crop.validate()
            .map_err(|e| PipelineError::Validation(format!("Invalid crop: {}", e)))?;
    }

    let edits_video = flags.wants_trim() || flags.wants_mute() || flags.wants_crop();
    let is_video = kind == ResourceKind::Video || (kind == ResourceKind::Gif && flags.animated_gif);
    if edits_video && !is_video {
        return Err(PipelineError::Validation(format!(
            "Trim, mute and crop apply to videos only, got {}",
            kind
        )));
    }
    if flags.animated_gif && kind != ResourceKind::Gif {
        return Err(PipelineError::Validation(format!(
            "Animated GIF conversion requested for {}",
            kind
        )));
    }
    Ok(())
}
