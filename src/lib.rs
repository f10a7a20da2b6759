//! framereel - Frame-sequence video capture library
//!
//! Drives an external frame source over a range of frame indices and encodes
//! the captured bitmaps into a single video-only MP4 or WebM file with
//! strictly increasing presentation timestamps. The main entry point is
//! [`capture`], which validates the settings, starts an encoding session and
//! pumps every frame in the configured range through a serial encode worker.

pub mod encoder;
pub mod error;
pub mod muxer;
pub mod pool;
pub mod raster;
pub mod sequencer;
pub mod session;
pub mod source;
pub mod timestamp;

mod capture;

pub use capture::{capture, CaptureStats};
pub use error::{Error, Result};

use std::path::Path;

/// Video codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// AV1 codec (using rav1e)
    Av1,
    /// H.264 codec (using an ffmpeg subprocess)
    H264,
}

/// Container format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// MP4 container (H.264 only)
    Mp4,
    /// WebM container (AV1 only)
    WebM,
}

impl Container {
    /// Check if the container supports the given codec
    pub fn supports_codec(&self, codec: Codec) -> bool {
        match (self, codec) {
            (Container::Mp4, Codec::H264) => true,
            (Container::Mp4, Codec::Av1) => false,
            (Container::WebM, Codec::Av1) => true,
            (Container::WebM, Codec::H264) => false,
        }
    }
}

/// Settings for a capture run
///
/// Every field is required; there are no defaults. `start_frame` may exceed
/// `end_frame`, in which case the run encodes zero frames but still produces
/// a finalized container.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Frames per second; also the track timescale
    pub frame_rate: u32,
    /// First frame index to capture (inclusive)
    pub start_frame: i64,
    /// Last frame index to capture (inclusive)
    pub end_frame: i64,
    /// Locator of the content the frame source renders; must exist
    pub input_path: String,
    /// Composition name the caller forwards to the frame source
    pub composition: String,
    /// Output file path; must not exist
    pub output_path: String,
    /// Container format
    pub container: Container,
    /// Video codec
    pub codec: Codec,
    /// Quality (0-100, where 100 is highest quality)
    pub quality: u8,
    /// Path to ffmpeg executable (for H.264)
    pub ffmpeg_path: Option<String>,
}

impl CaptureSettings {
    /// Validate the settings eagerly, before any resource is allocated
    /// or the frame source is touched.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(
                "output width and height must be non-zero".to_string(),
            ));
        }
        if self.frame_rate == 0 {
            return Err(Error::Config("frame rate must be non-zero".to_string()));
        }
        if self.composition.is_empty() {
            return Err(Error::Config(
                "composition name must not be empty".to_string(),
            ));
        }
        if !self.container.supports_codec(self.codec) {
            return Err(Error::ContainerCodecMismatch {
                container: self.container,
                codec: self.codec,
            });
        }
        if Path::new(&self.output_path).exists() {
            return Err(Error::PathConflict(format!(
                "output file already exists: {}",
                self.output_path
            )));
        }
        if !Path::new(&self.input_path).exists() {
            return Err(Error::PathConflict(format!(
                "input does not exist: {}",
                self.input_path
            )));
        }
        Ok(())
    }
}

/// Check if a codec is available on the current system
pub fn available(codec: Codec, ffmpeg_path: Option<&str>) -> Result<()> {
    match codec {
        Codec::Av1 => {
            #[cfg(feature = "av1")]
            {
                Ok(())
            }
            #[cfg(not(feature = "av1"))]
            {
                let _ = ffmpeg_path;
                Err(Error::CodecUnavailable(
                    "AV1 support not compiled in".to_string(),
                ))
            }
        }
        Codec::H264 => encoder::h264::check_available(ffmpeg_path),
    }
}
