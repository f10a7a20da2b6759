//! WebM container muxer

use super::{Muxer, MuxerConfig};
use crate::encoder::Packet;
use crate::{Codec, Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// WebM muxer using simple EBML writing
///
/// Block timecodes are derived from packet timestamps, so a stream whose
/// first frame index is non-zero starts at the matching non-zero time.
pub struct WebmMuxer {
    writer: BufWriter<File>,
    config: MuxerConfig,
    cluster_start: u64,
    timecode: u64,
    cluster_open: bool,
}

impl WebmMuxer {
    pub fn new<P: AsRef<Path>>(output_path: P, config: MuxerConfig) -> Result<Self> {
        // WebM only supports AV1 (and VP8/VP9, but we only implement AV1)
        if config.codec != Codec::Av1 {
            return Err(Error::Mux(
                "WebM container only supports AV1 codec".to_string(),
            ));
        }

        let file = File::create(output_path.as_ref()).map_err(Error::Io)?;
        let writer = BufWriter::new(file);

        let mut muxer = Self {
            writer,
            config,
            cluster_start: 0,
            timecode: 0,
            cluster_open: false,
        };

        muxer.write_header()?;

        Ok(muxer)
    }

    fn write_header(&mut self) -> Result<()> {
        // EBML Header
        self.write_ebml_element(0x1A45DFA3, &self.create_ebml_header())?;

        // Segment (unknown size)
        self.write_ebml_id(0x18538067)?;
        self.write_ebml_size_unknown()?;

        // Segment Info
        self.write_ebml_element(0x1549A966, &self.create_segment_info())?;

        // Tracks
        self.write_ebml_element(0x1654AE6B, &self.create_tracks())?;

        Ok(())
    }

    fn create_ebml_header(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // EBMLVersion = 1
        data.extend(encode_ebml_element(0x4286, &[1]));
        // EBMLReadVersion = 1
        data.extend(encode_ebml_element(0x42F7, &[1]));
        // EBMLMaxIDLength = 4
        data.extend(encode_ebml_element(0x42F2, &[4]));
        // EBMLMaxSizeLength = 8
        data.extend(encode_ebml_element(0x42F3, &[8]));
        // DocType = "webm"
        data.extend(encode_ebml_element(0x4282, b"webm"));
        // DocTypeVersion = 4
        data.extend(encode_ebml_element(0x4287, &[4]));
        // DocTypeReadVersion = 2
        data.extend(encode_ebml_element(0x4285, &[2]));

        data
    }

    fn create_segment_info(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // TimestampScale = 1000000 (1ms)
        data.extend(encode_ebml_element(0x2AD7B1, &encode_uint(1_000_000)));
        // MuxingApp
        data.extend(encode_ebml_element(0x4D80, b"framereel"));
        // WritingApp
        data.extend(encode_ebml_element(0x5741, b"framereel"));

        data
    }

    fn create_tracks(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // TrackEntry
        let track_entry = self.create_track_entry();
        data.extend(encode_ebml_element(0xAE, &track_entry));

        data
    }

    fn create_track_entry(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // TrackNumber = 1
        data.extend(encode_ebml_element(0xD7, &[1]));
        // TrackUID = 1
        data.extend(encode_ebml_element(0x73C5, &encode_uint(1)));
        // TrackType = 1 (video)
        data.extend(encode_ebml_element(0x83, &[1]));
        // CodecID = "V_AV1"
        data.extend(encode_ebml_element(0x86, b"V_AV1"));
        // Video settings
        data.extend(encode_ebml_element(0xE0, &self.create_video_settings()));

        data
    }

    fn create_video_settings(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // PixelWidth
        data.extend(encode_ebml_element(
            0xB0,
            &encode_uint(self.config.width as u64),
        ));
        // PixelHeight
        data.extend(encode_ebml_element(
            0xBA,
            &encode_uint(self.config.height as u64),
        ));

        data
    }

    fn start_cluster(&mut self) -> Result<()> {
        if self.cluster_open {
            return Ok(());
        }

        // Cluster (unknown size for streaming)
        self.write_ebml_id(0x1F43B675)?;
        self.write_ebml_size_unknown()?;

        // Timestamp
        let timestamp_data = encode_ebml_element(0xE7, &encode_uint(self.timecode));
        self.writer.write_all(&timestamp_data).map_err(Error::Io)?;

        self.cluster_start = self.timecode;
        self.cluster_open = true;

        Ok(())
    }

    fn write_simple_block(&mut self, packet: &Packet) -> Result<()> {
        let relative_timecode = (self.timecode - self.cluster_start) as i16;

        let mut block_data = Vec::new();

        // Track number (EBML coded, track 1)
        block_data.push(0x81);

        // Relative timecode (big-endian i16)
        block_data.push((relative_timecode >> 8) as u8);
        block_data.push((relative_timecode & 0xFF) as u8);

        // Flags: keyframe if applicable
        let flags = if packet.is_keyframe { 0x80 } else { 0x00 };
        block_data.push(flags);

        // Frame data
        block_data.extend(&packet.data);

        // SimpleBlock element
        self.write_ebml_element(0xA3, &block_data)?;

        Ok(())
    }

    fn write_ebml_id(&mut self, id: u32) -> Result<()> {
        let bytes = encode_ebml_id(id);
        self.writer.write_all(&bytes).map_err(Error::Io)
    }

    fn write_ebml_size_unknown(&mut self) -> Result<()> {
        // Unknown size marker for streaming
        self.writer
            .write_all(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
            .map_err(Error::Io)
    }

    fn write_ebml_element(&mut self, id: u32, data: &[u8]) -> Result<()> {
        let bytes = encode_ebml_element(id, data);
        self.writer.write_all(&bytes).map_err(Error::Io)
    }
}

impl Muxer for WebmMuxer {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.timecode = packet.pts.max(0) as u64 * 1000 / self.config.fps as u64;

        // Start a new cluster if needed (e.g., on keyframe or every few seconds)
        if !self.cluster_open || (packet.is_keyframe && self.timecode > self.cluster_start) {
            self.cluster_open = false;
            self.start_cluster()?;
        }

        self.write_simple_block(packet)?;

        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

// EBML encoding helpers

/// Encode an EBML element ID.
///
/// Well-formed IDs carry their class marker in their own leading bits, so the
/// minimal big-endian byte form is already the wire encoding.
fn encode_ebml_id(id: u32) -> Vec<u8> {
    let len = match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    id.to_be_bytes()[4 - len..].to_vec()
}

/// Encode an EBML size varint: the leading byte's marker bit gives the length
fn encode_ebml_size(size: u64) -> Vec<u8> {
    for len in 1..8usize {
        // All-ones payloads are reserved for "unknown size"
        if size < (1u64 << (7 * len)) - 1 {
            let mut bytes = size.to_be_bytes()[8 - len..].to_vec();
            bytes[0] |= 0x80 >> (len - 1);
            return bytes;
        }
    }

    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&size.to_be_bytes()[1..]);
    bytes
}

fn encode_ebml_element(id: u32, data: &[u8]) -> Vec<u8> {
    let mut result = encode_ebml_id(id);
    result.extend(encode_ebml_size(data.len() as u64));
    result.extend(data);
    result
}

/// Minimal big-endian unsigned integer payload
fn encode_uint(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    bytes[skip..].to_vec()
}
