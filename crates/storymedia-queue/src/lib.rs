//! Storymedia Queue
//!
//! In-process pipeline that takes local media files from selection to an
//! uploaded remote resource. Items move through stages held in a single
//! [`QueueStore`]; the scheduler claims pending work, serializes every
//! transcode-class operation behind one lock and runs uploads concurrently.
//!
//! ```text
//! Pending -> Preparing -> Uploading -> Uploaded -> Finished
//!               \-> PendingTranscoding -> Transcoding | Trimming | Muting | Cropping
//!                   -> Transcoded | Trimmed | Muted | Cropped -> Uploading
//! any non-terminal stage -> Cancelled
//! ```

pub mod context;
mod drivers;
pub mod item;
pub mod listener;
pub mod query;
pub mod queue;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use context::Collaborators;
pub use item::{AddItemRequest, ItemPatch, QueueItem, ResourceUpdate};
pub use listener::UploadListener;
pub use queue::MediaQueue;
pub use scheduler::{plan_pass, PassPlan};
pub use state::QueueState;
pub use store::QueueStore;
pub use view::QueueView;
