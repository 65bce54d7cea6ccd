//! Scheduler: reacts to every store change and dispatches stage drivers.
//!
//! One pass over a snapshot runs four sub-passes:
//!
//! 1. claim every `Pending` item (`Pending -> Preparing`) and spawn its
//!    prepare driver,
//! 2. under the transcode lock, claim the highest-priority
//!    `PendingTranscoding` item and spawn its transform driver,
//! 3. claim every item whose transform is done (`-> Uploading`) and spawn
//!    its upload driver, no lock,
//! 4. under the poster lock, refine one placeholder video.
//!
//! Every claim is a store transition, so running a pass twice against the
//! same snapshot dispatches nothing the second time.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use storymedia_core::models::{ItemId, ItemStage};

use crate::context::PipelineContext;
use crate::drivers::{placeholder, prepare, transcode, upload};
use crate::item::{stage_for_operation, transcode_priority, ItemPatch, QueueItem};
use crate::state::QueueState;

/// Work one pass would dispatch for a snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassPlan {
    pub claims: Vec<ItemId>,
    /// Item and the transcoding stage it is claimed into.
    pub transcode: Option<(ItemId, ItemStage)>,
    pub uploads: Vec<ItemId>,
    pub placeholder: Option<ItemId>,
}

impl PassPlan {
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
            && self.transcode.is_none()
            && self.uploads.is_empty()
            && self.placeholder.is_none()
    }
}

/// Stages in which a placeholder may still be refined.
fn accepts_refinement(item: &QueueItem) -> bool {
    item.resource.is_placeholder
        && item.resource.kind.is_video_like()
        && (item.stage == ItemStage::Pending
            || (item.stage.is_in_progress() && item.stage != ItemStage::Uploading))
}

/// Decide what a pass over `state` dispatches.
///
/// `transcode_free` / `poster_free` report whether the respective lock could
/// be taken; `refined` lists items whose refinement was already attempted.
pub fn plan_pass(
    state: &QueueState,
    transcode_free: bool,
    poster_free: bool,
    refined: &HashSet<ItemId>,
) -> PassPlan {
    let mut plan = PassPlan::default();

    for item in state.items() {
        match item.stage {
            ItemStage::Pending => plan.claims.push(item.id),
            stage if stage.is_transform_done() => plan.uploads.push(item.id),
            _ => {}
        }
    }

    if transcode_free && state.active_transcodes() == 0 {
        plan.transcode = state
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.stage == ItemStage::PendingTranscoding)
            .filter_map(|(position, item)| {
                let operation = *item.planned_operations().first()?;
                Some(((transcode_priority(operation), position), item.id, operation))
            })
            .min_by_key(|(rank, _, _)| *rank)
            .map(|(_, id, operation)| (id, stage_for_operation(operation)));
    }

    if poster_free {
        plan.placeholder = state
            .items()
            .iter()
            .find(|item| !refined.contains(&item.id) && accepts_refinement(item))
            .map(|item| item.id);
    }

    plan
}

pub(crate) struct Scheduler {
    ctx: Arc<PipelineContext>,
    transcode_lock: Arc<Semaphore>,
    poster_lock: Arc<Semaphore>,
    refined: HashSet<ItemId>,
}

impl Scheduler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            transcode_lock: Arc::new(Semaphore::new(1)),
            poster_lock: Arc::new(Semaphore::new(1)),
            refined: HashSet::new(),
        }
    }

    /// Run until `shutdown_rx` fires or its sender is dropped.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut state_rx = self.ctx.store.subscribe();
        tracing::info!("Media queue scheduler started");

        loop {
            let snapshot = state_rx.borrow_and_update().clone();
            self.run_pass(&snapshot);

            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    tracing::info!("Media queue scheduler shutting down");
                    break;
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.ctx.wake.notified() => {}
            }
        }

        tracing::info!("Media queue scheduler stopped");
    }

    fn run_pass(&mut self, snapshot: &QueueState) {
        self.refined.retain(|id| snapshot.item(*id).is_some());

        let plan = plan_pass(
            snapshot,
            self.transcode_lock.available_permits() > 0,
            self.poster_lock.available_permits() > 0,
            &self.refined,
        );
        if plan.is_empty() {
            return;
        }
        tracing::trace!(?plan, "Scheduler pass");

        if let Some(id) = plan.placeholder {
            self.dispatch_placeholder(id);
        }
        for id in plan.claims {
            self.dispatch_prepare(id);
        }
        if let Some((id, stage)) = plan.transcode {
            self.dispatch_transcode(id, stage);
        }
        for id in plan.uploads {
            self.dispatch_upload(id);
        }
    }

    fn dispatch_prepare(&self, id: ItemId) {
        if self
            .ctx
            .transition(id, ItemStage::Preparing, ItemPatch::default())
            .is_some()
        {
            tokio::spawn(prepare::run(self.ctx.clone(), id));
        }
    }

    fn dispatch_transcode(&self, id: ItemId, stage: ItemStage) {
        let permit = match self.transcode_lock.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("Transcode lock held, deferring");
                return;
            }
        };

        if self.ctx.transition(id, stage, ItemPatch::default()).is_some() {
            tokio::spawn(transcode::run(self.ctx.clone(), id, permit));
        } else {
            drop(permit);
        }
    }

    fn dispatch_upload(&self, id: ItemId) {
        if self
            .ctx
            .transition(id, ItemStage::Uploading, ItemPatch::default())
            .is_some()
        {
            tokio::spawn(upload::run(self.ctx.clone(), id));
        }
    }

    fn dispatch_placeholder(&mut self, id: ItemId) {
        let permit = match self.poster_lock.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return,
        };
        self.refined.insert(id);
        tokio::spawn(placeholder::run(self.ctx.clone(), id, permit));
    }
}
