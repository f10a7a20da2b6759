//! Integration tests for the frame sequencer and finalize handshake

mod common;

use common::*;
use framereel::sequencer::FrameSequencer;
use framereel::session::EncodingSession;
use framereel::{Codec, Container, Error};
use std::time::Duration;
use tempfile::TempDir;

/// A source that never becomes ready trips the readiness timeout and the run
/// aborts without writing a container
#[test]
#[cfg(feature = "av1")]
fn test_ready_timeout_surfaces_frame_source_error() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path(), "out.webm", Container::WebM, Codec::Av1);

    let mut session = EncodingSession::new(&settings);
    session.start().unwrap();

    let sequencer =
        FrameSequencer::new(0, 2, 30).with_ready_timeout(Duration::from_millis(50));
    let result = sequencer.run(&mut NeverReadySource, session);

    assert!(matches!(result, Err(Error::FrameSource(_))));
    // No finish marker was queued, so no container was written
    assert!(!std::path::Path::new(&settings.output_path).exists());
}

/// An inverted range finalizes immediately with zero frames
#[test]
#[cfg(feature = "av1")]
fn test_inverted_range_yields_empty_output() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path(), "out.webm", Container::WebM, Codec::Av1);

    let mut session = EncodingSession::new(&settings);
    session.start().unwrap();

    let mut source = ScriptedSource::new(64, 64);
    let encoded = FrameSequencer::new(9, 3, 30).run(&mut source, session).unwrap();

    assert_eq!(encoded, 0);
    assert!(source.requested.is_empty());
    assert!(verify_webm_header(&settings.output_path));
}

/// A queue depth of one still preserves order; the pump just blocks more
#[test]
#[cfg(feature = "av1")]
fn test_minimal_queue_depth_preserves_order() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path(), "out.webm", Container::WebM, Codec::Av1);

    let mut session = EncodingSession::new(&settings);
    session.start().unwrap();

    let mut source = ScriptedSource::new(64, 64);
    source.capture_delays_ms = vec![0, 15, 1, 8];

    let encoded = FrameSequencer::new(0, 5, 30)
        .with_queue_depth(1)
        .run(&mut source, session)
        .unwrap();

    assert_eq!(encoded, 6);
    assert_eq!(source.requested, vec![0, 1, 2, 3, 4, 5]);

    let timecodes = webm_block_timecodes(&settings.output_path);
    let expected: Vec<i64> = (0..6).map(|i| i * 1000 / 30).collect();
    assert_eq!(timecodes, expected);
}

/// A failing frame source mid-range aborts the run with its error
#[test]
#[cfg(feature = "av1")]
fn test_source_failure_mid_range_aborts() {
    init_logging();

    struct FailingSource {
        inner: ScriptedSource,
        fail_at: i64,
    }

    impl framereel::source::FrameSource for FailingSource {
        fn request_frame(&mut self, index: i64) -> framereel::Result<()> {
            if index == self.fail_at {
                return Err(Error::FrameSource(format!(
                    "renderer crashed at frame {}",
                    index
                )));
            }
            self.inner.request_frame(index)
        }

        fn is_ready(&mut self) -> framereel::Result<bool> {
            self.inner.is_ready()
        }

        fn capture_sample(&mut self) -> framereel::Result<framereel::source::FrameSample> {
            self.inner.capture_sample()
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path(), "out.webm", Container::WebM, Codec::Av1);

    let mut session = EncodingSession::new(&settings);
    session.start().unwrap();

    let mut source = FailingSource {
        inner: ScriptedSource::new(64, 64),
        fail_at: 2,
    };

    let result = FrameSequencer::new(0, 5, 30).run(&mut source, session);
    assert!(matches!(result, Err(Error::FrameSource(_))));
    // Frames past the failure were never requested
    assert_eq!(source.inner.requested, vec![0, 1]);
}
