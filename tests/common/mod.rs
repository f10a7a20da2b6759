//! Common test utilities

#![allow(dead_code)]

use framereel::source::{FrameSample, FrameSource, PixelFormat};
use framereel::{CaptureSettings, Codec, Container, Error, Result};
use std::path::Path;
use std::time::Duration;

/// Initialize logging for a test binary; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build settings around a temp directory, creating the input file
pub fn test_settings(
    dir: &Path,
    output_name: &str,
    container: Container,
    codec: Codec,
) -> CaptureSettings {
    let input = dir.join("input.html");
    std::fs::write(&input, "<html></html>").unwrap();

    CaptureSettings {
        width: 64,
        height: 64,
        frame_rate: 30,
        start_frame: 0,
        end_frame: 2,
        input_path: input.to_string_lossy().to_string(),
        composition: "Main".to_string(),
        output_path: dir.join(output_name).to_string_lossy().to_string(),
        container,
        codec,
        quality: 50,
        ffmpeg_path: None,
    }
}

/// Generate a deterministic sample whose content depends on the frame index
pub fn frame_sample(width: u32, height: u32, format: PixelFormat, index: i64) -> FrameSample {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x as i64 * 3 + index * 7) as u8;
            let g = (y as i64 * 5 + index * 11) as u8;
            let b = (index * 29) as u8;
            match format {
                PixelFormat::Rgba8 => data.extend_from_slice(&[r, g, b, 255]),
                PixelFormat::Bgra8 => data.extend_from_slice(&[b, g, r, 255]),
            }
        }
    }
    FrameSample {
        width,
        height,
        format,
        data,
    }
}

/// Frame source that renders deterministic gradients, with optional
/// readiness flicker and per-frame capture delays to exercise ordering
pub struct ScriptedSource {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// `is_ready` returns false this many times after each request
    pub ready_polls: u32,
    /// Artificial delay before each capture, cycled per frame
    pub capture_delays_ms: Vec<u64>,
    /// Every index requested so far
    pub requested: Vec<i64>,
    polls_left: u32,
    current: Option<i64>,
    captured: usize,
}

impl ScriptedSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            ready_polls: 0,
            capture_delays_ms: Vec::new(),
            requested: Vec::new(),
            polls_left: 0,
            current: None,
            captured: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn request_frame(&mut self, index: i64) -> Result<()> {
        self.requested.push(index);
        self.current = Some(index);
        self.polls_left = self.ready_polls;
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool> {
        if self.polls_left > 0 {
            self.polls_left -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn capture_sample(&mut self) -> Result<FrameSample> {
        let index = self
            .current
            .ok_or_else(|| Error::FrameSource("no frame requested".to_string()))?;

        if !self.capture_delays_ms.is_empty() {
            let delay = self.capture_delays_ms[self.captured % self.capture_delays_ms.len()];
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.captured += 1;

        Ok(frame_sample(self.width, self.height, self.format, index))
    }
}

/// Frame source that never becomes ready
pub struct NeverReadySource;

impl FrameSource for NeverReadySource {
    fn request_frame(&mut self, _index: i64) -> Result<()> {
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn capture_sample(&mut self) -> Result<FrameSample> {
        Err(Error::FrameSource("source is not ready".to_string()))
    }
}

/// Verify that a file exists and has non-zero size
pub fn verify_file_exists_with_size<P: AsRef<Path>>(path: P) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

/// Parse WebM header to verify it's a valid WebM file
pub fn verify_webm_header<P: AsRef<Path>>(path: P) -> bool {
    use std::io::Read;

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut header = [0u8; 4];
    if file.read_exact(&mut header).is_err() {
        return false;
    }

    // WebM starts with EBML header: 0x1A 0x45 0xDF 0xA3
    header == [0x1A, 0x45, 0xDF, 0xA3]
}

/// Parse MP4 header to verify it's a valid MP4 file
pub fn verify_mp4_header<P: AsRef<Path>>(path: P) -> bool {
    use std::io::Read;

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut header = [0u8; 12];
    if file.read_exact(&mut header).is_err() {
        return false;
    }

    // MP4 files have 'ftyp' box at offset 4
    &header[4..8] == b"ftyp"
}

/// Walk a generated WebM file and collect the absolute timecode (in ms) of
/// every SimpleBlock, in file order
pub fn webm_block_timecodes<P: AsRef<Path>>(path: P) -> Vec<i64> {
    let data = std::fs::read(path).expect("failed to read webm file");
    let mut timecodes = Vec::new();
    let mut cluster_base = 0i64;
    let mut pos = 0usize;

    while pos < data.len() {
        let (id, id_len) = read_ebml_id(&data, pos);
        pos += id_len;
        let (size, size_len, unknown) = read_ebml_size(&data, pos);
        pos += size_len;

        match id {
            // Segment and Cluster are written with unknown size; descend
            0x18538067 | 0x1F43B675 => continue,
            // Cluster Timestamp
            0xE7 => {
                cluster_base = read_uint(&data[pos..pos + size]) as i64;
                pos += size;
            }
            // SimpleBlock: track varint, i16 relative timecode, flags, data
            0xA3 => {
                let relative = i16::from_be_bytes([data[pos + 1], data[pos + 2]]) as i64;
                timecodes.push(cluster_base + relative);
                pos += size;
            }
            _ => {
                assert!(!unknown, "unexpected unknown-size element {:#x}", id);
                pos += size;
            }
        }
    }

    timecodes
}

fn read_ebml_id(data: &[u8], pos: usize) -> (u32, usize) {
    let first = data[pos];
    let len = if first & 0x80 != 0 {
        1
    } else if first & 0x40 != 0 {
        2
    } else if first & 0x20 != 0 {
        3
    } else {
        4
    };

    let mut id = 0u32;
    for i in 0..len {
        id = (id << 8) | data[pos + i] as u32;
    }
    (id, len)
}

fn read_ebml_size(data: &[u8], pos: usize) -> (usize, usize, bool) {
    let first = data[pos];
    let mut len = 1usize;
    let mut mask = 0x80u8;
    while mask != 0 && first & mask == 0 {
        len += 1;
        mask >>= 1;
    }

    let mut value = (first & mask.wrapping_sub(1)) as u64;
    for i in 1..len {
        value = (value << 8) | data[pos + i] as u64;
    }

    let unknown = value == (1u64 << (7 * len as u32)) - 1;
    (value as usize, len, unknown)
}

fn read_uint(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
