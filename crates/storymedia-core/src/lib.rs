//! Storymedia Core Library
//!
//! Domain models, error types, configuration and hooks shared by the
//! story media pipeline crates.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{
    ErrorMetadata, FailureKind, ItemError, LogLevel, Operation, PipelineError, PipelineResult,
};
pub use hooks::{EventSink, NoOpEventSink, PipelineEvent, TracingEventSink};
pub use models::{
    AdditionalData, BatchId, CropParams, ItemId, ItemStage, LocalFile, MediaSource,
    ResourceDescriptor, ResourceId, ResourceKind, TransformFlags, TrimRange,
};
