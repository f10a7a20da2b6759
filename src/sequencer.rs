//! Frame capture sequencing and the serial encode worker
//!
//! The sequencer is the driving loop: it walks the frame range, waits for the
//! external source to render each frame, and hands the captured sample to a
//! single worker thread over a bounded FIFO queue. Submission order equals
//! frame-index order and the worker consumes in FIFO order, so append order
//! equals frame order; that is the whole ordering guarantee. The bounded
//! queue makes the loop block instead of queueing samples without limit when
//! the encoder lags.

use crate::raster::rasterize;
use crate::session::EncodingSession;
use crate::source::{FrameSample, FrameSource};
use crate::timestamp::PresentationTimestamp;
use crate::{Error, Result};
use log::{debug, warn};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work queue depth before the driving loop blocks
const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Interval between frame-source readiness polls
const READY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long to wait for the frame source before giving up on a frame
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// One unit of encode work, consumed in FIFO order by the serial worker
enum WorkItem {
    Encode {
        sample: FrameSample,
        at: PresentationTimestamp,
    },
    Finish,
}

/// Drives the capture-encode loop over an inclusive frame range
pub struct FrameSequencer {
    start_frame: i64,
    end_frame: i64,
    frame_rate: u32,
    queue_depth: usize,
    ready_timeout: Duration,
}

impl FrameSequencer {
    pub fn new(start_frame: i64, end_frame: i64, frame_rate: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            frame_rate,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Override the work queue depth (minimum 1)
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Override how long to wait for frame-source readiness
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Pump every frame in the range through the session and finalize it.
    ///
    /// The session must already be started; after this call it is owned by
    /// the worker and nothing else touches it. Returns the number of frames
    /// encoded once the container is fully written and closed. An empty range
    /// (`start_frame > end_frame`) finalizes immediately with zero frames.
    pub fn run(&self, source: &mut dyn FrameSource, session: EncodingSession) -> Result<u64> {
        let (tx, rx) = sync_channel(self.queue_depth);
        let coordinator = FinalizeCoordinator {
            tx,
            worker: spawn_worker(session, rx),
        };

        for index in self.start_frame..=self.end_frame {
            let sample = match self.acquire(source, index) {
                Ok(sample) => sample,
                Err(e) => return coordinator.abort(e),
            };

            let at = PresentationTimestamp::of_frame(index, self.frame_rate);
            if !coordinator.submit(sample, at) {
                // The worker is gone; its own error surfaces from the join
                warn!("encode worker stopped early before frame {}", index);
                break;
            }
            debug!("submitted frame {} at {}/{}", index, at.value, at.timescale);
        }

        coordinator.complete()
    }

    /// Request one frame from the source and wait for it to be captured
    fn acquire(&self, source: &mut dyn FrameSource, index: i64) -> Result<FrameSample> {
        source.request_frame(index)?;

        let deadline = Instant::now() + self.ready_timeout;
        while !source.is_ready()? {
            if Instant::now() >= deadline {
                return Err(Error::FrameSource(format!(
                    "frame {} not ready after {:?}",
                    index, self.ready_timeout
                )));
            }
            thread::sleep(READY_POLL_INTERVAL);
        }

        source.capture_sample()
    }
}

/// Drains all outstanding encode work and closes the session exactly once
struct FinalizeCoordinator {
    tx: SyncSender<WorkItem>,
    worker: JoinHandle<Result<u64>>,
}

impl FinalizeCoordinator {
    /// Queue one frame; blocks while the queue is full. Returns false once
    /// the worker has gone away.
    fn submit(&self, sample: FrameSample, at: PresentationTimestamp) -> bool {
        self.tx.send(WorkItem::Encode { sample, at }).is_ok()
    }

    /// Enqueue the finish marker behind every pending append, then wait for
    /// the worker to drain the queue and close the session.
    fn complete(self) -> Result<u64> {
        let FinalizeCoordinator { tx, worker } = self;
        // A send failure means the worker already died; the join reports why
        let _ = tx.send(WorkItem::Finish);
        drop(tx);
        join_worker(worker)
    }

    /// Stop without finalizing: the worker exits after the items it already
    /// accepted, no finish marker is queued, and the pump failure is reported.
    fn abort(self, cause: Error) -> Result<u64> {
        let FinalizeCoordinator { tx, worker } = self;
        drop(tx);
        if let Err(worker_err) = join_worker(worker) {
            warn!("encode worker also failed during abort: {}", worker_err);
        }
        Err(cause)
    }
}

/// The serial worker: rasterize and append in strict FIFO order, finish on
/// the marker. The session is owned here from start to close.
fn spawn_worker(mut session: EncodingSession, rx: Receiver<WorkItem>) -> JoinHandle<Result<u64>> {
    thread::spawn(move || {
        while let Ok(item) = rx.recv() {
            match item {
                WorkItem::Encode { sample, at } => {
                    let mut buffer = session.acquire_buffer()?;
                    rasterize(&sample, &mut buffer)?;
                    session.append(buffer, at)?;
                }
                WorkItem::Finish => return session.finish(),
            }
        }

        // The queue was dropped without a finish marker: aborted run,
        // no container is written
        Ok(session.frames_appended())
    })
}

fn join_worker(worker: JoinHandle<Result<u64>>) -> Result<u64> {
    match worker.join() {
        Ok(result) => result,
        Err(_) => Err(Error::Encode("encode worker panicked".to_string())),
    }
}
