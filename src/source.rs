//! External frame source interface
//!
//! The frame source is a black box that renders content addressed by frame
//! index. The sequencer asks it to prepare a frame, polls it for readiness
//! and then captures the rendered bitmap.

use crate::{Error, Result};

/// Pixel layout of a captured sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, straight alpha
    Rgba8,
    /// 8-bit BGRA, straight alpha
    Bgra8,
}

/// Immutable raw bitmap produced for one frame index
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Sample width in pixels
    pub width: u32,
    /// Sample height in pixels
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Pixel data (width * height * 4 bytes)
    pub data: Vec<u8>,
}

impl FrameSample {
    /// Check that the data length matches the declared geometry
    pub fn check(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(Error::Rasterize(format!(
                "sample geometry {}x{} does not match {} bytes of pixel data",
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// External producer of rendered bitmap samples, addressed by frame index
pub trait FrameSource {
    /// Ask the source to prepare the given frame
    fn request_frame(&mut self, index: i64) -> Result<()>;

    /// Whether the requested frame is ready to capture
    fn is_ready(&mut self) -> Result<bool>;

    /// Capture the current rendered bitmap; fails if the source is not ready
    fn capture_sample(&mut self) -> Result<FrameSample>;
}
