//! Storymedia Media Processing Library
//!
//! Collaborator contracts for the upload pipeline (transformer, introspector,
//! uploader, optimization policy) plus local implementations of them and the
//! pre-enqueue validator.

pub mod traits;
pub mod upload;
pub mod validator;

#[cfg(feature = "image")]
pub mod metadata;

#[cfg(feature = "video")]
pub mod video;

// Re-export commonly used types
pub use traits::{
    LocalResource, MediaTransformer, MimeAllowListPolicy, OptimizationPolicy, ResourceFlagPolicy,
    ResourceIntrospector,
};
pub use upload::{UploadMetadata, Uploader};
pub use validator::{MediaValidator, ValidationError};

#[cfg(feature = "image")]
pub use metadata::{image_dimensions, is_animated_gif, LocalResourceIntrospector};

#[cfg(feature = "video")]
pub use video::FfmpegTransformer;
