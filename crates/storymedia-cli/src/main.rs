//! Storymedia CLI: runs local media files through the upload pipeline.
//!
//! Files are stored by the local uploader under UPLOAD_DIR. Settings come
//! from the environment (and `.env`), see `PipelineConfig::from_env`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use storymedia_cli::{init_tracing, mime_for_path, parse_crop, parse_trim};
use storymedia_core::models::{ItemStage, LocalFile, TransformFlags};
use storymedia_core::PipelineConfig;
use storymedia_processing::{
    FfmpegTransformer, LocalResourceIntrospector, MediaValidator, MimeAllowListPolicy,
    ResourceIntrospector,
};
use storymedia_queue::{AddItemRequest, Collaborators, MediaQueue, QueueItem};
use storymedia_storage::LocalUploader;

#[derive(Parser)]
#[command(name = "storymedia", about = "Story media upload pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare, transform and store files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Strip the audio track of videos
        #[arg(long)]
        mute: bool,
        /// Keep only START:END (milliseconds) of videos
        #[arg(long, value_name = "START:END")]
        trim: Option<String>,
        /// Crop videos to X,Y,WIDTH,HEIGHT
        #[arg(long, value_name = "X,Y,W,H")]
        crop: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a file and show the descriptor derived from it
    Probe {
        /// File to inspect
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct UploadOutcome<'a> {
    file: String,
    #[serde(flatten)]
    item: &'a QueueItem,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Upload {
            files,
            mute,
            trim,
            crop,
            json,
        } => {
            let flags = TransformFlags {
                trim: trim.as_deref().map(parse_trim).transpose()?,
                mute,
                crop: crop.as_deref().map(parse_crop).transpose()?,
                animated_gif: false,
            };
            upload(&config, files, flags, json).await
        }
        Commands::Probe { file } => probe(&config, &file).await,
    }
}

async fn read_local_file(path: &Path) -> Result<LocalFile> {
    let mime_type = mime_for_path(path)
        .ok_or_else(|| anyhow!("Unsupported file type: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?
        .to_string();
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(LocalFile::new(name, mime_type, data))
}

async fn upload(
    config: &PipelineConfig,
    files: Vec<PathBuf>,
    flags: TransformFlags,
    json: bool,
) -> Result<()> {
    let transformer = FfmpegTransformer::new(config.ffmpeg_path.clone())?;
    let uploader = LocalUploader::new(&config.upload_dir, config.upload_base_url.clone()).await?;
    let collaborators = Collaborators {
        transformer: Arc::new(transformer),
        uploader: Arc::new(uploader),
        introspector: Arc::new(LocalResourceIntrospector::new()),
        optimization: Arc::new(MimeAllowListPolicy::new(vec!["video/mp4".to_string()])),
    };

    let queue = MediaQueue::new(config, collaborators);
    queue.start();

    let mut queued = Vec::new();
    let mut failed = 0usize;
    for path in &files {
        let file = read_local_file(path).await?;
        // Video edits only make sense for video inputs.
        let item_flags = if file.mime_type.starts_with("video/") {
            flags.clone()
        } else {
            TransformFlags::default()
        };
        match queue
            .add_item(AddItemRequest::new(file).with_flags(item_flags))
            .await
        {
            Ok(id) => queued.push((path.display().to_string(), id)),
            Err(e) => {
                failed += 1;
                eprintln!("Rejected {}: {}", path.display(), e);
            }
        }
    }

    let mut results = Vec::with_capacity(queued.len());
    for (file, id) in queued {
        let settled = queue.wait_until_settled(id).await?;
        let item = if settled.stage == ItemStage::Uploaded {
            queue.finish_item(id)?
        } else {
            failed += 1;
            settled
        };
        results.push((file, item));
    }
    queue.shutdown().await;

    if json {
        let outcomes: Vec<UploadOutcome<'_>> = results
            .iter()
            .map(|(file, item)| UploadOutcome {
                file: file.clone(),
                item: item.as_ref(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_table(&results);
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} files failed", failed, files.len()));
    }
    Ok(())
}

fn print_table(results: &[(String, Arc<QueueItem>)]) {
    println!("{:<32} {:<10} {:<38} SOURCE", "FILE", "STAGE", "RESOURCE");
    for (file, item) in results {
        match &item.error {
            Some(error) => println!("{:<32} {:<10} {}", file, item.stage, error),
            None => println!(
                "{:<32} {:<10} {:<38} {}",
                file, item.stage, item.resource.id, item.resource.src
            ),
        }
    }
}

async fn probe(config: &PipelineConfig, path: &Path) -> Result<()> {
    let file = read_local_file(path).await?;
    let kind = MediaValidator::from_config(config).validate_file(&file)?;
    let local = LocalResourceIntrospector::new()
        .resource_from_local_file(&file)
        .await?;

    tracing::debug!(kind = %kind, placeholder = local.resource.is_placeholder, "Probed file");
    println!("{}", serde_json::to_string_pretty(&local.resource)?);
    Ok(())
}
