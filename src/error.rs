//! Error types for framereel

use crate::{Codec, Container};
use thiserror::Error;

/// Result type alias for framereel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for framereel operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid required settings
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Output file already exists or input is missing
    #[error("Path conflict: {0}")]
    PathConflict(String),

    /// Codec is not available on this system
    #[error("Codec unavailable: {0}")]
    CodecUnavailable(String),

    /// Container and codec combination is not supported
    #[error("Container {container:?} does not support codec {codec:?}")]
    ContainerCodecMismatch { container: Container, codec: Codec },

    /// Encoder or container could not be configured
    #[error("Session initialization failed: {0}")]
    SessionInit(String),

    /// Operation issued in the wrong session state
    #[error("Invalid session state: {0}")]
    SessionState(String),

    /// Operation issued after the session was finalized
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Pixel buffer pool cannot produce a buffer yet
    #[error("Pixel buffer pool unavailable: {0}")]
    PoolUnavailable(String),

    /// Sample could not be drawn into a pooled buffer
    #[error("Rasterize error: {0}")]
    Rasterize(String),

    /// Presentation timestamp does not exceed the previous one
    #[error("Non-monotonic timestamp: {0}")]
    NonMonotonicTimestamp(String),

    /// Frame source never became ready or failed to capture
    #[error("Frame source error: {0}")]
    FrameSource(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Muxing error
    #[error("Muxing error: {0}")]
    Mux(String),

    /// FFmpeg process error
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),
}
