//! Encoding session state machine
//!
//! The session owns the encoder, the pixel buffer pool and the buffered
//! packet list from `start()` until the container is finalized. Packets are
//! muxed at finish time because codec configuration data (SPS/PPS for H.264)
//! only exists after encoding.

use crate::encoder::{create_encoder, Encoder, EncoderConfig, Frame, Packet};
use crate::muxer::{create_muxer, MuxerConfig};
use crate::pool::{PixelBufferPool, PooledBuffer};
use crate::timestamp::PresentationTimestamp;
use crate::{CaptureSettings, Codec, Container, Error, Result};
use log::{debug, info};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    Started,
    Finalizing,
    Closed,
    Failed,
}

/// Lifecycle owner of the output container and encoder track
///
/// `Created -> Started -> (append)* -> Finalizing -> Closed`, with a terminal
/// `Failed` state on any encode or mux error. All appends must come from a
/// single caller in timestamp order; the session re-checks monotonicity and
/// rejects violations without failing the stream.
pub struct EncodingSession {
    state: SessionState,
    width: u32,
    height: u32,
    frame_rate: u32,
    quality: u8,
    codec: Codec,
    container: Container,
    output_path: String,
    ffmpeg_path: Option<String>,
    encoder: Option<Box<dyn Encoder>>,
    pool: Option<PixelBufferPool>,
    packets: Vec<Packet>,
    last_pts: Option<PresentationTimestamp>,
    appended: u64,
}

impl EncodingSession {
    /// Create a session in the `Created` state; no resource is allocated yet
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            state: SessionState::Created,
            width: settings.width,
            height: settings.height,
            frame_rate: settings.frame_rate,
            quality: settings.quality,
            codec: settings.codec,
            container: settings.container,
            output_path: settings.output_path.clone(),
            ffmpeg_path: settings.ffmpeg_path.clone(),
            encoder: None,
            pool: None,
            packets: Vec::new(),
            last_pts: None,
            appended: 0,
        }
    }

    /// Configure the encoder and buffer pool and begin accepting appends
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Created => {}
            SessionState::Closed => {
                return Err(Error::SessionClosed("start after finish".to_string()))
            }
            _ => {
                return Err(Error::SessionState(
                    "start is only valid once, on a fresh session".to_string(),
                ))
            }
        }

        if self.width == 0 || self.height == 0 {
            return Err(Error::SessionInit(
                "output geometry is missing from the configuration".to_string(),
            ));
        }
        if self.frame_rate == 0 {
            return Err(Error::SessionInit(
                "frame rate is missing from the configuration".to_string(),
            ));
        }
        if Path::new(&self.output_path).exists() {
            return Err(Error::SessionInit(format!(
                "output file already exists: {}",
                self.output_path
            )));
        }
        if !self.container.supports_codec(self.codec) {
            return Err(Error::ContainerCodecMismatch {
                container: self.container,
                codec: self.codec,
            });
        }

        let encoder_config = EncoderConfig {
            width: self.width,
            height: self.height,
            fps: self.frame_rate,
            quality: self.quality,
        };

        match create_encoder(self.codec, encoder_config, self.ffmpeg_path.as_deref()) {
            Ok(encoder) => self.encoder = Some(encoder),
            Err(e) => return self.fail(e),
        }

        self.pool = Some(PixelBufferPool::new(self.width, self.height));
        self.state = SessionState::Started;

        info!(
            "encoding session started: {}x{} @{}fps ({:?}/{:?}) -> {}",
            self.width, self.height, self.frame_rate, self.codec, self.container, self.output_path
        );
        Ok(())
    }

    /// Obtain a pooled buffer matching the configured geometry.
    ///
    /// Only available once the session is started, because the pool geometry
    /// is fixed by the encoder configuration.
    pub fn acquire_buffer(&self) -> Result<PooledBuffer> {
        match &self.pool {
            Some(pool) => Ok(pool.acquire()),
            None => Err(Error::PoolUnavailable(
                "session has not been started".to_string(),
            )),
        }
    }

    /// Append a rasterized buffer at the given presentation time.
    ///
    /// The buffer is consumed; its storage returns to the pool after the
    /// encoder has read it.
    pub fn append(&mut self, buffer: PooledBuffer, at: PresentationTimestamp) -> Result<()> {
        match self.state {
            SessionState::Started => {}
            SessionState::Created => {
                return Err(Error::SessionState("append before start".to_string()))
            }
            SessionState::Finalizing | SessionState::Closed => {
                return Err(Error::SessionClosed("append after finish".to_string()))
            }
            SessionState::Failed => {
                return Err(Error::SessionState("session has failed".to_string()))
            }
        }

        if let Some(last) = self.last_pts {
            if !at.is_after(&last) {
                return Err(Error::NonMonotonicTimestamp(format!(
                    "{}/{} does not exceed the previous timestamp {}/{}",
                    at.value, at.timescale, last.value, last.timescale
                )));
            }
        }

        let encoder = match self.encoder.as_mut() {
            Some(encoder) => encoder,
            None => return self.fail(Error::SessionState("encoder is gone".to_string())),
        };

        let frame = Frame {
            width: buffer.width(),
            height: buffer.height(),
            data: buffer.detach(),
            pts: at.rescale(self.frame_rate),
        };

        match encoder.encode(&frame) {
            Ok(packets) => self.packets.extend(packets),
            Err(e) => return self.fail(e),
        }

        // The encoder has consumed the frame; recycle its storage
        if let Some(pool) = &self.pool {
            pool.release(frame.data);
        }

        self.last_pts = Some(at);
        self.appended += 1;
        debug!("appended frame at {}/{}", at.value, at.timescale);
        Ok(())
    }

    /// Flush the encoder, write the container and close it.
    ///
    /// Returns the number of frames appended. Zero appends still produce a
    /// finalized, structurally valid file with an empty track.
    pub fn finish(&mut self) -> Result<u64> {
        match self.state {
            SessionState::Started => {}
            SessionState::Created => {
                return Err(Error::SessionState("finish before start".to_string()))
            }
            SessionState::Finalizing | SessionState::Closed => {
                return Err(Error::SessionClosed("finish after finish".to_string()))
            }
            SessionState::Failed => {
                return Err(Error::SessionState("session has failed".to_string()))
            }
        }

        self.state = SessionState::Finalizing;

        let mut encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => return self.fail(Error::SessionState("encoder is gone".to_string())),
        };

        match encoder.flush() {
            Ok(packets) => self.packets.extend(packets),
            Err(e) => return self.fail(e),
        }

        let muxer_config = MuxerConfig {
            width: self.width,
            height: self.height,
            fps: self.frame_rate,
            codec: self.codec,
            codec_config: encoder.codec_config(),
            pps: encoder.pps(),
        };

        let mut muxer = match create_muxer(self.container, &self.output_path, muxer_config) {
            Ok(muxer) => muxer,
            Err(e) => return self.fail(e),
        };

        let packets = std::mem::take(&mut self.packets);
        for packet in &packets {
            if let Err(e) = muxer.write_packet(packet) {
                return self.fail(e);
            }
        }

        if let Err(e) = muxer.finalize() {
            return self.fail(e);
        }

        self.state = SessionState::Closed;
        info!(
            "finalized {} frames ({} packets) to {}",
            self.appended,
            packets.len(),
            self.output_path
        );
        Ok(self.appended)
    }

    /// Number of frames appended so far
    pub fn frames_appended(&self) -> u64 {
        self.appended
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.state = SessionState::Failed;
        Err(err)
    }
}
