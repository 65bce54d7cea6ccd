#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use storymedia_core::error::{ItemError, Operation};
use storymedia_core::hooks::{EventSink, PipelineEvent};
use storymedia_core::models::{
    CropParams, ItemId, ItemStage, LocalFile, ResourceDescriptor, ResourceId, TrimRange,
};
use storymedia_core::PipelineConfig;
use storymedia_processing::{
    LocalResourceIntrospector, MediaTransformer, ResourceFlagPolicy, UploadMetadata, Uploader,
};
use storymedia_queue::{Collaborators, MediaQueue, QueueItem, UploadListener};

/// Encoded PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub fn jpeg_file(name: &str) -> LocalFile {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(32, 24));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    LocalFile::new(name, "image/jpeg", buf)
}

pub fn video_file(name: &str) -> LocalFile {
    LocalFile::new(name, "video/mp4", b"fake mp4 payload".to_vec())
}

pub fn heic_file(name: &str) -> LocalFile {
    LocalFile::new(name, "image/heic", b"fake heic payload".to_vec())
}

/// Codec engine double.
///
/// Records every call, tracks how many transform calls overlap, and can
/// be told to fail, hang, or wait for a permit before finishing.
#[derive(Default)]
pub struct MockTransformer {
    pub calls: Mutex<Vec<Operation>>,
    pub frame_calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail_on: Mutex<HashSet<Operation>>,
    hang_on: Mutex<HashSet<Operation>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transform call waits for one permit of `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn fail_on(&self, operation: Operation) {
        self.fail_on.lock().unwrap().insert(operation);
    }

    pub fn hang_on(&self, operation: Operation) {
        self.hang_on.lock().unwrap().insert(operation);
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn transform(
        &self,
        operation: Operation,
        file: &LocalFile,
        mime_type: &str,
    ) -> anyhow::Result<LocalFile> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(operation);

        let result = self.finish(operation, file, mime_type).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn finish(
        &self,
        operation: Operation,
        file: &LocalFile,
        mime_type: &str,
    ) -> anyhow::Result<LocalFile> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.hang_on.lock().unwrap().contains(&operation) {
            std::future::pending::<()>().await;
        }
        if self.fail_on.lock().unwrap().contains(&operation) {
            anyhow::bail!("mock {} failure", operation);
        }

        let mut data = file.data.to_vec();
        data.extend_from_slice(operation.to_string().as_bytes());
        Ok(LocalFile::new(
            format!("{}.{}", file.name, operation),
            mime_type,
            data,
        ))
    }
}

#[async_trait]
impl MediaTransformer for MockTransformer {
    async fn convert_heif(&self, file: &LocalFile, target_mime: &str) -> anyhow::Result<LocalFile> {
        let mut output = self.transform(Operation::ConvertHeif, file, target_mime).await?;
        output.data = png_bytes(40, 30).into();
        Ok(output)
    }

    async fn convert_gif_to_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile> {
        self.transform(Operation::ConvertGif, file, "video/mp4").await
    }

    async fn trim_video(&self, file: &LocalFile, _range: TrimRange) -> anyhow::Result<LocalFile> {
        self.transform(Operation::Trim, file, &file.mime_type).await
    }

    async fn mute_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile> {
        self.transform(Operation::Mute, file, &file.mime_type).await
    }

    async fn crop_video(&self, file: &LocalFile, _params: &CropParams) -> anyhow::Result<LocalFile> {
        self.transform(Operation::Crop, file, &file.mime_type).await
    }

    async fn optimize_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile> {
        self.transform(Operation::Optimize, file, "video/mp4").await
    }

    async fn extract_first_frame(&self, file: &LocalFile) -> anyhow::Result<LocalFile> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().unwrap().contains(&Operation::ExtractFirstFrame) {
            anyhow::bail!("mock frame failure");
        }
        Ok(LocalFile::new(
            format!("{}.poster.png", file.name),
            "image/png",
            png_bytes(64, 48),
        ))
    }
}

/// Backend double recording every upload.
#[derive(Default)]
pub struct MockUploader {
    pub uploads: Mutex<Vec<(String, UploadMetadata)>>,
    fail_names: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl MockUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, file_name: &str) {
        self.fail_names.lock().unwrap().insert(file_name.to_string());
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn metadata_for(&self, prefix: &str) -> Option<UploadMetadata> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name.starts_with(prefix) && !name.contains("poster"))
            .map(|(_, metadata)| metadata.clone())
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload_file(
        &self,
        file: &LocalFile,
        metadata: &UploadMetadata,
    ) -> anyhow::Result<ResourceDescriptor> {
        if self.fail_names.lock().unwrap().contains(&file.name) {
            anyhow::bail!("mock upload failure for {}", file.name);
        }
        self.uploads
            .lock()
            .unwrap()
            .push((file.name.clone(), metadata.clone()));

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut resource = ResourceDescriptor::placeholder(metadata.kind, file.mime_type.clone())
            .with_id(ResourceId::new(format!("remote-{}", n)))
            .with_src(format!("https://cdn.test/{}", file.name));
        if let (Some(width), Some(height)) = (metadata.width, metadata.height) {
            resource = resource.with_dimensions(width, height);
        }
        resource.duration_seconds = metadata.duration_seconds;
        resource.is_muted = metadata.is_muted();
        Ok(resource.confirmed())
    }
}

/// Collects every pipeline event in emission order.
#[derive(Default)]
pub struct RecordingEventSink {
    pub events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Stages an item went through, starting with `Pending`.
    pub fn stages_of(&self, id: ItemId) -> Vec<ItemStage> {
        let mut stages = vec![ItemStage::Pending];
        for event in self.events.lock().unwrap().iter() {
            if let PipelineEvent::StageChanged { item_id, to, .. } = event {
                if *item_id == id {
                    stages.push(*to);
                }
            }
        }
        stages
    }

    /// Highest number of items simultaneously in a transcoding-class stage,
    /// replayed from the transition log.
    pub fn max_concurrent_transcodes(&self) -> usize {
        let mut current: HashSet<ItemId> = HashSet::new();
        let mut max = 0;
        for event in self.events.lock().unwrap().iter() {
            if let PipelineEvent::StageChanged { item_id, from, to } = event {
                if from.is_transcoding_class() {
                    current.remove(item_id);
                }
                if to.is_transcoding_class() {
                    current.insert(*item_id);
                }
                max = max.max(current.len());
            }
        }
        max
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn track(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Listener recording callback names.
#[derive(Default)]
pub struct RecordingListener {
    pub calls: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<ItemError>>,
}

impl RecordingListener {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl UploadListener for RecordingListener {
    fn on_upload_start(&self, _item: &QueueItem) {
        self.calls.lock().unwrap().push("start".to_string());
    }

    fn on_upload_progress(&self, item: &QueueItem) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("progress:{}", item.stage));
    }

    fn on_upload_success(&self, item: &QueueItem) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("success:{}", item.resource.id));
    }

    fn on_upload_error(&self, _item: &QueueItem, error: &ItemError) {
        self.calls.lock().unwrap().push("error".to_string());
        self.errors.lock().unwrap().push(error.clone());
    }
}

pub struct TestQueue {
    pub queue: MediaQueue,
    pub transformer: Arc<MockTransformer>,
    pub uploader: Arc<MockUploader>,
    pub events: Arc<RecordingEventSink>,
}

pub fn test_queue(transformer: MockTransformer) -> TestQueue {
    test_queue_with_config(transformer, PipelineConfig::default())
}

pub fn test_queue_with_config(transformer: MockTransformer, config: PipelineConfig) -> TestQueue {
    let transformer = Arc::new(transformer);
    let uploader = Arc::new(MockUploader::new());
    let events = Arc::new(RecordingEventSink::default());
    let collaborators = Collaborators {
        transformer: transformer.clone(),
        uploader: uploader.clone(),
        introspector: Arc::new(LocalResourceIntrospector::new()),
        optimization: Arc::new(ResourceFlagPolicy),
    };
    let queue = MediaQueue::with_event_sink(&config, collaborators, events.clone());
    TestQueue {
        queue,
        transformer,
        uploader,
        events,
    }
}
