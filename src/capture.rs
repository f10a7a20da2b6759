//! Top-level capture pipeline

use crate::sequencer::FrameSequencer;
use crate::session::EncodingSession;
use crate::source::FrameSource;
use crate::{CaptureSettings, Result};
use log::info;

/// Summary of a completed capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Number of frames appended to the output
    pub frames_encoded: u64,
}

/// Capture the configured frame range from `source` into a video file.
///
/// Settings are validated before any resource is allocated or the source is
/// touched. The call returns once the container is fully written and closed;
/// on error no further frames are emitted and an already-open output file is
/// not guaranteed to be valid.
pub fn capture(source: &mut dyn FrameSource, settings: &CaptureSettings) -> Result<CaptureStats> {
    settings.validate()?;

    let mut session = EncodingSession::new(settings);
    session.start()?;

    let sequencer = FrameSequencer::new(
        settings.start_frame,
        settings.end_frame,
        settings.frame_rate,
    );
    let frames_encoded = sequencer.run(source, session)?;

    info!(
        "capture finished: {} frames -> {}",
        frames_encoded, settings.output_path
    );
    Ok(CaptureStats { frames_encoded })
}
