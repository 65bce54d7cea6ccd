pub mod file;
pub mod ids;
pub mod resource;
pub mod stage;
pub mod transform;

pub use file::LocalFile;
pub use ids::{BatchId, ItemId};
pub use resource::{ResourceDescriptor, ResourceId, ResourceKind};
pub use stage::ItemStage;
pub use transform::{AdditionalData, CropParams, MediaSource, TransformFlags, TrimRange};
