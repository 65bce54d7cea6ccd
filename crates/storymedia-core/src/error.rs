//! Error types module
//!
//! All pipeline failures are unified under [`PipelineError`]. External
//! collaborators report failures as `anyhow::Error`; the stage drivers wrap
//! them together with the [`Operation`] that failed so the item can be
//! cancelled with a precise, cloneable [`ItemError`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for best-effort work that failed
    Warn,
    /// Error level - for failures that cancel an item
    Error,
}

/// Failure taxonomy used when reporting an item's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected before enqueue.
    Validation,
    /// A transcode-class collaborator failed.
    Transform,
    /// The uploader failed.
    Upload,
    /// Placeholder refinement or poster work; always swallowed.
    BestEffort,
}

/// External operations the pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Introspect,
    ConvertHeif,
    ConvertGif,
    Trim,
    Mute,
    Crop,
    Optimize,
    ExtractFirstFrame,
    Upload,
    PosterUpload,
}

impl Operation {
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Operation::ConvertHeif
            | Operation::ConvertGif
            | Operation::Trim
            | Operation::Mute
            | Operation::Crop
            | Operation::Optimize => FailureKind::Transform,
            Operation::Upload => FailureKind::Upload,
            Operation::Introspect | Operation::ExtractFirstFrame | Operation::PosterUpload => {
                FailureKind::BestEffort
            }
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Operation::Introspect => "introspect",
            Operation::ConvertHeif => "convert_heif",
            Operation::ConvertGif => "convert_gif",
            Operation::Trim => "trim",
            Operation::Mute => "mute",
            Operation::Crop => "crop",
            Operation::Optimize => "optimize",
            Operation::ExtractFirstFrame => "extract_first_frame",
            Operation::Upload => "upload",
            Operation::PosterUpload => "poster_upload",
        };
        f.write_str(name)
    }
}

/// Metadata describing how an error should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "UPLOAD_FAILED")
    fn error_code(&self) -> &'static str;

    /// Where in the taxonomy this failure sits
    fn failure_kind(&self) -> FailureKind;

    /// Caller-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: Operation, seconds: u64 },

    #[error("Queue item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Media queue is not running")]
    QueueClosed,
}

impl PipelineError {
    pub fn collaborator(operation: Operation, source: impl Into<anyhow::Error>) -> Self {
        PipelineError::Collaborator {
            operation,
            source: source.into(),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            PipelineError::Collaborator { operation, .. }
            | PipelineError::Timeout { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Cloneable summary stored on a cancelled item.
    pub fn to_item_error(&self) -> ItemError {
        ItemError {
            kind: self.failure_kind(),
            code: self.error_code().to_string(),
            operation: self.operation(),
            message: self.client_message(),
        }
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_FAILED",
            PipelineError::Collaborator { operation, .. } => match operation.failure_kind() {
                FailureKind::Upload => "UPLOAD_FAILED",
                FailureKind::Transform => "TRANSFORM_FAILED",
                _ => "BEST_EFFORT_FAILED",
            },
            PipelineError::Timeout { .. } => "TIMEOUT",
            PipelineError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::QueueClosed => "QUEUE_CLOSED",
        }
    }

    fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Collaborator { operation, .. }
            | PipelineError::Timeout { operation, .. } => operation.failure_kind(),
            PipelineError::Validation(_)
            | PipelineError::ItemNotFound(_)
            | PipelineError::Config(_)
            | PipelineError::QueueClosed => FailureKind::Validation,
        }
    }

    fn client_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => msg.clone(),
            PipelineError::Collaborator { operation, source } => match operation {
                Operation::Upload => format!("Upload failed: {}", source),
                _ => format!("Processing failed during {}: {}", operation, source),
            },
            PipelineError::Timeout { operation, seconds } => {
                format!("{} did not finish within {} seconds", operation, seconds)
            }
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self.failure_kind() {
            FailureKind::Validation => LogLevel::Debug,
            FailureKind::BestEffort => LogLevel::Warn,
            FailureKind::Transform | FailureKind::Upload => LogLevel::Error,
        }
    }
}

/// Error recorded on a cancelled queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub kind: FailureKind,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    pub message: String,
}

impl Display for ItemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
