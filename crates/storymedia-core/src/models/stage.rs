use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Pipeline state of a queue item.
///
/// ```text
/// Pending -> Preparing -> PendingTranscoding -> {Transcoding|Trimming|Muting|Cropping}
///                                            -> {Transcoded|Trimmed|Muted|Cropped} -> Uploading
/// Pending -> Preparing -> Uploading
/// Uploading -> Uploaded -> Finished
/// any non-terminal -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Pending,
    Preparing,
    PendingTranscoding,
    Transcoding,
    Trimming,
    Muting,
    Cropping,
    Transcoded,
    Trimmed,
    Muted,
    Cropped,
    Uploading,
    Uploaded,
    Finished,
    Cancelled,
}

impl ItemStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStage::Finished | ItemStage::Cancelled)
    }

    /// Stages that hold the global transcode lock.
    pub fn is_transcoding_class(self) -> bool {
        matches!(
            self,
            ItemStage::Transcoding | ItemStage::Trimming | ItemStage::Muting | ItemStage::Cropping
        )
    }

    /// Stages whose item is waiting for its upload after a transform.
    pub fn is_transform_done(self) -> bool {
        matches!(
            self,
            ItemStage::Transcoded | ItemStage::Trimmed | ItemStage::Muted | ItemStage::Cropped
        )
    }

    /// Non-pending, non-terminal work that has not produced an upload yet.
    pub fn is_in_progress(self) -> bool {
        !matches!(
            self,
            ItemStage::Pending | ItemStage::Uploaded | ItemStage::Finished | ItemStage::Cancelled
        )
    }

    /// Completion stage for a transcoding-class stage.
    pub fn completed(self) -> Option<ItemStage> {
        match self {
            ItemStage::Transcoding => Some(ItemStage::Transcoded),
            ItemStage::Trimming => Some(ItemStage::Trimmed),
            ItemStage::Muting => Some(ItemStage::Muted),
            ItemStage::Cropping => Some(ItemStage::Cropped),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: ItemStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ItemStage::Cancelled {
            return true;
        }
        match self {
            ItemStage::Pending => next == ItemStage::Preparing,
            ItemStage::Preparing => {
                matches!(next, ItemStage::PendingTranscoding | ItemStage::Uploading)
            }
            ItemStage::PendingTranscoding => next.is_transcoding_class(),
            ItemStage::Transcoding
            | ItemStage::Trimming
            | ItemStage::Muting
            | ItemStage::Cropping => self.completed() == Some(next),
            ItemStage::Transcoded | ItemStage::Trimmed | ItemStage::Muted | ItemStage::Cropped => {
                next == ItemStage::Uploading
            }
            ItemStage::Uploading => next == ItemStage::Uploaded,
            ItemStage::Uploaded => next == ItemStage::Finished,
            ItemStage::Finished | ItemStage::Cancelled => false,
        }
    }
}

impl Display for ItemStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ItemStage::Pending => "pending",
            ItemStage::Preparing => "preparing",
            ItemStage::PendingTranscoding => "pending_transcoding",
            ItemStage::Transcoding => "transcoding",
            ItemStage::Trimming => "trimming",
            ItemStage::Muting => "muting",
            ItemStage::Cropping => "cropping",
            ItemStage::Transcoded => "transcoded",
            ItemStage::Trimmed => "trimmed",
            ItemStage::Muted => "muted",
            ItemStage::Cropped => "cropped",
            ItemStage::Uploading => "uploading",
            ItemStage::Uploaded => "uploaded",
            ItemStage::Finished => "finished",
            ItemStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
