//! MP4 container muxer

use super::{Muxer, MuxerConfig};
use crate::encoder::Packet;
use crate::{Codec, Error, Result};
use mp4::{Mp4Config, Mp4Writer, TrackConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// MP4 muxer (H.264 only)
///
/// The video track's timescale is the configured frame rate, so a sample's
/// start time is its absolute frame index.
pub struct Mp4Muxer {
    writer: Mp4Writer<BufWriter<File>>,
    track_id: u32,
}

impl Mp4Muxer {
    pub fn new<P: AsRef<Path>>(output_path: P, config: MuxerConfig) -> Result<Self> {
        // The mp4 crate only muxes H.264; AV1 goes into WebM
        if config.codec != Codec::H264 {
            return Err(Error::Mux(
                "MP4 container only supports the H.264 codec. Use WebM for AV1.".to_string(),
            ));
        }

        // The encoder supplies parameter sets even for an empty stream
        // (synthesized from the configured geometry); without them the
        // track cannot be described
        let sps = config.codec_config.clone().unwrap_or_default();
        let pps = config.pps.clone().unwrap_or_default();
        if sps.len() < 4 || pps.is_empty() {
            return Err(Error::Mux(
                "H.264 stream carries no parameter sets; cannot describe an MP4 track".to_string(),
            ));
        }

        let file = File::create(output_path.as_ref()).map_err(Error::Io)?;
        let writer = BufWriter::new(file);

        let mp4_config = Mp4Config {
            major_brand: str_to_brand("isom"),
            minor_version: 512,
            compatible_brands: vec![
                str_to_brand("isom"),
                str_to_brand("iso2"),
                str_to_brand("avc1"),
                str_to_brand("mp41"),
            ],
            timescale: 1000, // milliseconds
        };

        let mut mp4_writer = Mp4Writer::write_start(writer, &mp4_config)
            .map_err(|e| Error::Mux(format!("Failed to create MP4 writer: {}", e)))?;

        let track_config = TrackConfig {
            track_type: mp4::TrackType::Video,
            timescale: config.fps,
            language: String::from("und"),
            media_conf: mp4::MediaConfig::AvcConfig(mp4::AvcConfig {
                width: config.width as u16,
                height: config.height as u16,
                seq_param_set: sps,
                pic_param_set: pps,
            }),
        };

        mp4_writer
            .add_track(&track_config)
            .map_err(|e| Error::Mux(format!("Failed to add track: {}", e)))?;

        // Track ID is always 1 for single track
        let track_id = 1;

        Ok(Self {
            writer: mp4_writer,
            track_id,
        })
    }
}

impl Muxer for Mp4Muxer {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let sample = mp4::Mp4Sample {
            start_time: packet.pts.max(0) as u64,
            duration: 1,
            rendering_offset: 0,
            is_sync: packet.is_keyframe,
            bytes: mp4::Bytes::copy_from_slice(&packet.data),
        };

        self.writer
            .write_sample(self.track_id, &sample)
            .map_err(|e| Error::Mux(format!("Failed to write sample: {}", e)))?;

        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.writer
            .write_end()
            .map_err(|e| Error::Mux(format!("Failed to finalize MP4: {}", e)))?;

        Ok(())
    }
}

fn str_to_brand(s: &str) -> mp4::FourCC {
    let bytes = s.as_bytes();
    mp4::FourCC {
        value: [
            bytes.first().copied().unwrap_or(0),
            bytes.get(1).copied().unwrap_or(0),
            bytes.get(2).copied().unwrap_or(0),
            bytes.get(3).copied().unwrap_or(0),
        ],
    }
}
