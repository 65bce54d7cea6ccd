mod helpers;

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use helpers::*;
use storymedia_core::error::{FailureKind, Operation, PipelineError};
use storymedia_core::models::{
    CropParams, ItemId, ItemStage, LocalFile, MediaSource, ResourceId, ResourceKind, TransformFlags,
    TrimRange,
};
use storymedia_core::PipelineConfig;
use storymedia_queue::{AddItemRequest, MediaQueue, QueueItem};

const WAIT: Duration = Duration::from_secs(5);

async fn settle(queue: &MediaQueue, id: ItemId) -> Arc<QueueItem> {
    tokio::time::timeout(WAIT, queue.wait_until_settled(id))
        .await
        .expect("item did not settle in time")
        .expect("item vanished")
}

async fn reach(queue: &MediaQueue, id: ItemId, stage: ItemStage) -> Arc<QueueItem> {
    tokio::time::timeout(WAIT, queue.wait_for_stage(id, |s| s == stage))
        .await
        .unwrap_or_else(|_| panic!("item did not reach {}", stage))
        .expect("item vanished")
}

fn animated_gif(name: &str) -> LocalFile {
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgba, RgbaImage};

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(Cursor::new(&mut buf));
        let frames = vec![
            Frame::new(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))),
            Frame::new(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))),
        ];
        encoder.encode_frames(frames).unwrap();
    }
    LocalFile::new(name, "image/gif", buf)
}

#[tokio::test]
async fn test_plain_image_skips_transcode_lock() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let listener = Arc::new(RecordingListener::default());
    let id = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("photo.jpg")).with_listener(listener.clone()))
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert!(t.transformer.calls().is_empty());
    assert_eq!(
        t.events.stages_of(id),
        vec![
            ItemStage::Pending,
            ItemStage::Preparing,
            ItemStage::Uploading,
            ItemStage::Uploaded,
        ]
    );
    assert_eq!(
        listener.calls(),
        vec![
            "start".to_string(),
            "progress:uploading".to_string(),
            format!("success:{}", item.resource.id),
        ]
    );
    assert!(item.previous_resource_id.is_some());
    assert_eq!(item.resource.width, Some(32));

    let finished = t.queue.finish_item(id).unwrap();
    assert_eq!(finished.stage, ItemStage::Finished);
    assert_eq!(t.queue.view().finished.len(), 1);
}

#[tokio::test]
async fn test_second_video_waits_for_transcode_lock() {
    let gate = Arc::new(Semaphore::new(0));
    let t = test_queue(MockTransformer::gated(gate.clone()));
    t.queue.start();

    let first = t
        .queue
        .add_item(AddItemRequest::new(video_file("first.mp4")))
        .await
        .unwrap();
    let second = t
        .queue
        .add_item(AddItemRequest::new(video_file("second.mp4")))
        .await
        .unwrap();

    let holder = reach(&t.queue, first, ItemStage::Transcoding).await;
    reach(&t.queue, second, ItemStage::PendingTranscoding).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = t.queue.snapshot();
    assert_eq!(snapshot.active_transcodes(), 1);
    assert!(snapshot.is_transcoding());
    assert!(snapshot.is_current_resource_transcoding(&holder.resource.id));
    assert_eq!(
        snapshot.item(second).unwrap().stage,
        ItemStage::PendingTranscoding
    );

    gate.add_permits(2);
    assert_eq!(settle(&t.queue, first).await.stage, ItemStage::Uploaded);
    assert_eq!(settle(&t.queue, second).await.stage, ItemStage::Uploaded);

    assert_eq!(t.transformer.max_active(), 1);
    assert_eq!(t.events.max_concurrent_transcodes(), 1);
    assert_eq!(
        t.transformer.calls(),
        vec![Operation::Optimize, Operation::Optimize]
    );

    let metadata = t.uploader.metadata_for("first.mp4").unwrap();
    assert_eq!(
        metadata.additional_data.media_source,
        Some(MediaSource::VideoOptimization)
    );
}

#[tokio::test]
async fn test_uploads_run_while_lock_is_held() {
    let gate = Arc::new(Semaphore::new(0));
    let t = test_queue(MockTransformer::gated(gate.clone()));
    t.queue.start();

    let video = t
        .queue
        .add_item(AddItemRequest::new(video_file("long.mp4")))
        .await
        .unwrap();
    reach(&t.queue, video, ItemStage::Transcoding).await;

    let image = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("quick.jpg")))
        .await
        .unwrap();
    assert_eq!(settle(&t.queue, image).await.stage, ItemStage::Uploaded);
    assert_eq!(
        t.queue.item(video).unwrap().stage,
        ItemStage::Transcoding
    );

    gate.add_permits(1);
    assert_eq!(settle(&t.queue, video).await.stage, ItemStage::Uploaded);
}

#[tokio::test]
async fn test_trim_and_mute_run_in_order() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let listener = Arc::new(RecordingListener::default());
    let flags = TransformFlags {
        trim: Some(TrimRange::new(1000, 3500).unwrap()),
        mute: true,
        ..Default::default()
    };
    let id = t
        .queue
        .add_item(
            AddItemRequest::new(video_file("clip.mp4"))
                .with_flags(flags)
                .with_listener(listener.clone()),
        )
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert_eq!(t.transformer.calls(), vec![Operation::Trim, Operation::Mute]);
    assert_eq!(
        t.events.stages_of(id),
        vec![
            ItemStage::Pending,
            ItemStage::Preparing,
            ItemStage::PendingTranscoding,
            ItemStage::Trimming,
            ItemStage::Trimmed,
            ItemStage::Uploading,
            ItemStage::Uploaded,
        ]
    );

    let metadata = t.uploader.metadata_for("clip.mp4").unwrap();
    assert_eq!(metadata.duration_seconds, Some(2.5));
    assert_eq!(metadata.additional_data.trim, TrimRange::new(1000, 3500).ok());
    assert!(metadata.is_muted());
    assert!(item.resource.is_muted);

    let calls = listener.calls();
    assert_eq!(calls.first().map(String::as_str), Some("start"));
    assert!(calls.contains(&"progress:trimming".to_string()));
    assert!(calls.contains(&"progress:trimmed".to_string()));
    assert!(calls.last().unwrap().starts_with("success:"));
}

#[tokio::test]
async fn test_crop_updates_dimensions_and_poster() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let flags = TransformFlags {
        crop: Some(CropParams {
            x: 10,
            y: 10,
            width: 320,
            height: 240,
        }),
        ..Default::default()
    };
    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("wide.mp4")).with_flags(flags))
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert!(t.events.stages_of(id).contains(&ItemStage::Cropped));
    assert_eq!(item.resource.width, Some(320));
    assert_eq!(item.resource.height, Some(240));
    assert!(item.resource.has_poster());
    assert!(t
        .uploader
        .uploaded_names()
        .iter()
        .any(|name| name.contains("poster")));
}

#[tokio::test]
async fn test_upload_failure_cancels_only_that_item() {
    let t = test_queue(MockTransformer::new());
    t.uploader.fail_for("broken.jpg");
    t.queue.start();

    let listener = Arc::new(RecordingListener::default());
    let (_, ids) = t
        .queue
        .add_batch(vec![
            AddItemRequest::new(jpeg_file("broken.jpg")).with_listener(listener.clone()),
            AddItemRequest::new(jpeg_file("fine.jpg")),
        ])
        .await
        .unwrap();
    let (broken, fine) = (ids[0], ids[1]);

    let failed = settle(&t.queue, broken).await;
    assert_eq!(failed.stage, ItemStage::Cancelled);
    let error = failed.error.clone().unwrap();
    assert_eq!(error.kind, FailureKind::Upload);
    assert_eq!(error.code, "UPLOAD_FAILED");
    assert_eq!(listener.calls().last().map(String::as_str), Some("error"));
    assert_eq!(listener.errors.lock().unwrap().len(), 1);

    assert_eq!(settle(&t.queue, fine).await.stage, ItemStage::Uploaded);
    assert_eq!(t.queue.finish_item(fine).unwrap().stage, ItemStage::Finished);

    let view = t.queue.view();
    assert_eq!(view.failures.len(), 1);
    assert_eq!(view.finished.len(), 1);
    assert_eq!(view.active.len(), 1);
}

#[tokio::test]
async fn test_mute_marks_upload_muted() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let flags = TransformFlags {
        mute: true,
        ..Default::default()
    };
    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("talk.mp4")).with_flags(flags))
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(
        t.events.stages_of(id),
        vec![
            ItemStage::Pending,
            ItemStage::Preparing,
            ItemStage::PendingTranscoding,
            ItemStage::Muting,
            ItemStage::Muted,
            ItemStage::Uploading,
            ItemStage::Uploaded,
        ]
    );
    assert_eq!(item.additional_data.is_muted, Some(true));
    let metadata = t.uploader.metadata_for("talk.mp4").unwrap();
    assert_eq!(metadata.additional_data.is_muted, Some(true));
}

#[tokio::test]
async fn test_resource_in_transcode_cannot_be_resubmitted() {
    let gate = Arc::new(Semaphore::new(0));
    let t = test_queue(MockTransformer::gated(gate.clone()));
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("busy.mp4")))
        .await
        .unwrap();
    let holder = reach(&t.queue, id, ItemStage::Transcoding).await;
    let resource = holder.resource.clone();
    assert!(!resource.src.is_empty());
    assert!(!t.queue.snapshot().can_transcode_resource(&resource));
    assert!(t.queue.snapshot().is_current_resource_processing(&resource.id));

    gate.add_permits(1);
    let uploaded = settle(&t.queue, id).await;
    // The backend id replaced the local one, which stays known as previous.
    assert_eq!(uploaded.previous_resource_id.as_ref(), Some(&resource.id));
    assert!(!t.queue.snapshot().can_transcode_resource(&resource));

    t.queue.finish_item(id).unwrap();
    t.queue.remove_item(id).unwrap();
    assert!(t.queue.snapshot().can_transcode_resource(&resource));
}

#[tokio::test]
async fn test_transform_failure_releases_lock() {
    let t = test_queue(MockTransformer::new());
    t.transformer.fail_on(Operation::Mute);
    t.queue.start();

    let flags = TransformFlags {
        mute: true,
        ..Default::default()
    };
    let muted = t
        .queue
        .add_item(AddItemRequest::new(video_file("loud.mp4")).with_flags(flags))
        .await
        .unwrap();
    let next = t
        .queue
        .add_item(AddItemRequest::new(video_file("next.mp4")))
        .await
        .unwrap();

    let failed = settle(&t.queue, muted).await;
    assert_eq!(failed.stage, ItemStage::Cancelled);
    let error = failed.error.clone().unwrap();
    assert_eq!(error.kind, FailureKind::Transform);
    assert_eq!(error.operation, Some(Operation::Mute));

    assert_eq!(settle(&t.queue, next).await.stage, ItemStage::Uploaded);
    assert_eq!(t.queue.snapshot().active_transcodes(), 0);
}

#[tokio::test]
async fn test_heif_is_converted_before_upload() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(heic_file("photo.heic")))
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert_eq!(t.transformer.calls(), vec![Operation::ConvertHeif]);
    assert!(t.events.stages_of(id).contains(&ItemStage::Transcoded));

    let metadata = t.uploader.metadata_for("photo.heic").unwrap();
    assert_eq!(metadata.width, Some(40));
    assert_eq!(metadata.height, Some(30));
    assert_eq!(
        metadata.additional_data.media_source,
        Some(MediaSource::ImageConversion)
    );
    assert_eq!(item.resource.mime_type, "image/jpeg");
}

#[tokio::test]
async fn test_animated_gif_becomes_silent_video() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(animated_gif("loop.gif")))
        .await
        .unwrap();
    assert!(t.queue.item(id).unwrap().is_animated_gif());

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert_eq!(t.transformer.calls(), vec![Operation::ConvertGif]);

    let metadata = t.uploader.metadata_for("loop.gif").unwrap();
    assert_eq!(
        metadata.additional_data.media_source,
        Some(MediaSource::GifConversion)
    );
    assert!(metadata.is_muted());
    assert_eq!(item.resource.mime_type, "video/mp4");
}

#[tokio::test]
async fn test_timeout_cancels_item() {
    let config = PipelineConfig {
        collaborator_timeout_secs: 1,
        ..Default::default()
    };
    let t = test_queue_with_config(MockTransformer::new(), config);
    t.transformer.hang_on(Operation::Optimize);
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("stuck.mp4")))
        .await
        .unwrap();

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Cancelled);
    let error = item.error.clone().unwrap();
    assert_eq!(error.code, "TIMEOUT");
    assert_eq!(error.operation, Some(Operation::Optimize));
    assert_eq!(t.queue.snapshot().active_transcodes(), 0);
}

#[tokio::test]
async fn test_placeholder_failure_is_swallowed() {
    let t = test_queue(MockTransformer::new());
    t.transformer.fail_on(Operation::ExtractFirstFrame);
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("raw.mp4")))
        .await
        .unwrap();
    assert!(t.queue.item(id).unwrap().resource.is_placeholder);

    let item = settle(&t.queue, id).await;
    assert_eq!(item.stage, ItemStage::Uploaded);
    assert!(item.error.is_none());
    assert_eq!(t.events.count("placeholder_refined"), 0);
    assert!(t.transformer.frame_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_placeholder_refined_at_most_once() {
    let gate = Arc::new(Semaphore::new(0));
    let t = test_queue(MockTransformer::gated(gate.clone()));
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(video_file("raw.mp4")))
        .await
        .unwrap();
    reach(&t.queue, id, ItemStage::Transcoding).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let item = t.queue.item(id).unwrap();
    assert!(!item.resource.is_placeholder);
    assert_eq!(item.resource.width, Some(64));
    assert!(item.poster_file.is_some());

    gate.add_permits(1);
    settle(&t.queue, id).await;
    assert_eq!(t.events.count("placeholder_refined"), 1);
}

#[tokio::test]
async fn test_every_item_uploaded_once() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(
            t.queue
                .add_item(AddItemRequest::new(jpeg_file(&format!("img-{}.jpg", i))))
                .await
                .unwrap(),
        );
        ids.push(
            t.queue
                .add_item(AddItemRequest::new(video_file(&format!("vid-{}.mp4", i))))
                .await
                .unwrap(),
        );
    }
    for id in &ids {
        assert_eq!(settle(&t.queue, *id).await.stage, ItemStage::Uploaded);
    }

    let names: Vec<String> = t
        .uploader
        .uploaded_names()
        .into_iter()
        .filter(|name| !name.contains("poster"))
        .collect();
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(names.len(), ids.len());
    assert_eq!(unique.len(), names.len());
    assert_eq!(t.events.count("item_uploaded"), ids.len());
    assert_eq!(t.events.max_concurrent_transcodes(), 1);
    assert_eq!(t.transformer.max_active(), 1);
}

#[tokio::test]
async fn test_terminal_items_are_immutable() {
    let t = test_queue(MockTransformer::new());
    t.uploader.fail_for("gone.jpg");
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("gone.jpg")))
        .await
        .unwrap();
    let cancelled = settle(&t.queue, id).await;
    assert_eq!(cancelled.stage, ItemStage::Cancelled);

    assert!(matches!(
        t.queue.finish_item(id),
        Err(PipelineError::Validation(_))
    ));
    assert_eq!(t.queue.item(id).unwrap().stage, ItemStage::Cancelled);

    let removed = t.queue.remove_item(id).unwrap();
    assert_eq!(removed.id, id);
    assert!(t.queue.item(id).is_none());
    assert!(matches!(
        t.queue.remove_item(id),
        Err(PipelineError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn test_uploaded_item_cannot_be_removed() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let id = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("keep.jpg")))
        .await
        .unwrap();
    settle(&t.queue, id).await;

    assert!(t.queue.remove_item(id).is_err());
    t.queue.finish_item(id).unwrap();
    assert!(t.queue.remove_item(id).is_ok());
    assert!(t.queue.snapshot().is_empty());
}

#[tokio::test]
async fn test_invalid_requests_never_enter_queue() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let mute_image = TransformFlags {
        mute: true,
        ..Default::default()
    };
    let result = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("still.jpg")).with_flags(mute_image))
        .await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));

    let empty = LocalFile::new("empty.jpg", "image/jpeg", Vec::new());
    assert!(t.queue.add_item(AddItemRequest::new(empty)).await.is_err());

    let spoofed = LocalFile::new("movie.mp4", "image/jpeg", vec![1, 2, 3]);
    assert!(t.queue.add_item(AddItemRequest::new(spoofed)).await.is_err());

    let unknown = LocalFile::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
    assert!(t.queue.add_item(AddItemRequest::new(unknown)).await.is_err());

    assert!(t.queue.snapshot().is_empty());
    assert_eq!(t.events.count("item_queued"), 0);
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let rejected = t
        .queue
        .add_batch(vec![
            AddItemRequest::new(jpeg_file("a.jpg")),
            AddItemRequest::new(LocalFile::new("b.jpg", "image/jpeg", Vec::new())),
        ])
        .await;
    assert!(rejected.is_err());
    assert!(t.queue.snapshot().is_empty());

    let (batch_id, ids) = t
        .queue
        .add_batch(vec![
            AddItemRequest::new(jpeg_file("a.jpg")),
            AddItemRequest::new(video_file("b.mp4")),
        ])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert!(t.queue.snapshot().is_batch_uploading(batch_id));

    for id in &ids {
        let item = settle(&t.queue, *id).await;
        assert_eq!(item.batch_id, batch_id);
        t.queue.finish_item(*id).unwrap();
        t.queue.remove_item(*id).unwrap();
    }
    assert!(!t.queue.snapshot().is_batch_uploading(batch_id));
}

#[tokio::test]
async fn test_stopped_queue_holds_pending_items() {
    let t = test_queue(MockTransformer::new());
    assert!(t.queue.start());
    assert!(!t.queue.start());
    t.queue.shutdown().await;
    assert!(!t.queue.is_running());

    let id = t
        .queue
        .add_item(AddItemRequest::new(jpeg_file("later.jpg")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(t.queue.item(id).unwrap().stage, ItemStage::Pending);
    assert_eq!(t.queue.view().pending.len(), 1);

    assert!(t.queue.start());
    assert_eq!(settle(&t.queue, id).await.stage, ItemStage::Uploaded);
}

#[tokio::test]
async fn test_original_resource_id_is_tracked() {
    let t = test_queue(MockTransformer::new());
    t.queue.start();

    let original = ResourceId::new("story-asset-7");
    let id = t
        .queue
        .add_item(
            AddItemRequest::new(jpeg_file("edit.jpg")).with_original_resource_id(original.clone()),
        )
        .await
        .unwrap();

    let snapshot = t.queue.snapshot();
    let item = snapshot.item(id).unwrap();
    assert_eq!(item.resource.kind, ResourceKind::Image);
    assert!(snapshot.is_new_resource_processing(&original));
    assert_eq!(item.additional_data.original_id, Some(original.clone()));

    settle(&t.queue, id).await;
    let metadata = t.uploader.metadata_for("edit.jpg").unwrap();
    assert_eq!(metadata.additional_data.original_id, Some(original));
}
