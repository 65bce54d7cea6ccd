//! Video processing module

pub mod ffmpeg;

pub use ffmpeg::FfmpegTransformer;
