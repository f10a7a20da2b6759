//! H.264 encoder using an ffmpeg external process
//!
//! Raw RGBA frames are piped into ffmpeg's stdin; the Annex B bitstream is
//! drained from stdout by a dedicated reader thread so neither side of the
//! pipe can stall the other. Packets become available at flush time, split
//! into length-prefixed NAL units with the parameter sets pulled out for the
//! muxer.

use super::{Encoder, EncoderConfig, Frame, Packet};
use crate::{Error, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

/// FFmpeg-based H.264 encoder
pub struct FfmpegEncoder {
    process: Child,
    config: EncoderConfig,
    submitted_pts: Vec<i64>,
    reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig, ffmpeg_path: Option<&str>) -> Result<Self> {
        let ffmpeg = find_ffmpeg(ffmpeg_path)?;

        // Map quality (0-100) to CRF (51-0)
        let crf = ((100 - config.quality.min(100)) as u32 * 51) / 100;

        let mut process = Command::new(&ffmpeg)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", config.width, config.height),
                "-r",
                &config.fps.to_string(),
                "-i",
                "pipe:0",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                // No B-frames: coded order must equal submission order,
                // since timestamps are matched to slices positionally
                "-bf",
                "0",
                "-crf",
                &crf.to_string(),
                "-pix_fmt",
                "yuv420p",
                "-f",
                "h264",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Ffmpeg(format!("Failed to start ffmpeg: {}", e)))?;

        let mut stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Ffmpeg("FFmpeg stdout not available".to_string()))?;

        let reader = thread::spawn(move || {
            let mut output = Vec::new();
            stdout.read_to_end(&mut output)?;
            Ok(output)
        });

        Ok(Self {
            process,
            config,
            submitted_pts: Vec::new(),
            reader: Some(reader),
            sps: None,
            pps: None,
        })
    }

    /// Split an Annex B stream into packets, stashing SPS/PPS on the way
    fn parse_bitstream(&mut self, data: &[u8]) -> Vec<Packet> {
        let mut packets = Vec::new();
        let mut slice_count = 0usize;
        let mut start = 0;

        while let Some((nal_start, start_code_len)) = find_start_code(data, start) {
            let payload_start = nal_start + start_code_len;
            let nal_end = find_start_code(data, payload_start)
                .map(|(pos, _)| pos)
                .unwrap_or(data.len());

            let nal = &data[payload_start..nal_end];
            if !nal.is_empty() {
                match nal[0] & 0x1F {
                    7 => {
                        self.sps.get_or_insert_with(|| nal.to_vec());
                    }
                    8 => {
                        self.pps.get_or_insert_with(|| nal.to_vec());
                    }
                    nal_type @ 1..=5 => {
                        let pts = self
                            .submitted_pts
                            .get(slice_count)
                            .copied()
                            .unwrap_or(slice_count as i64);

                        // Length-prefix the NAL for AVCC sample data
                        let mut sample = Vec::with_capacity(nal.len() + 4);
                        sample.extend_from_slice(&(nal.len() as u32).to_be_bytes());
                        sample.extend_from_slice(nal);

                        packets.push(Packet {
                            data: sample,
                            pts,
                            dts: pts,
                            is_keyframe: nal_type == 5,
                        });
                        slice_count += 1;
                    }
                    // SEI, AUD and friends carry no sample data
                    _ => {}
                }
            }

            start = nal_end;
        }

        packets
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Vec<Packet>> {
        let stdin = self
            .process
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Ffmpeg("FFmpeg stdin not available".to_string()))?;

        stdin
            .write_all(&frame.data)
            .map_err(|e| Error::Ffmpeg(format!("Failed to write frame: {}", e)))?;

        self.submitted_pts.push(frame.pts);

        // x264 buffers lookahead internally; the full bitstream is parsed at flush
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<Packet>> {
        // Close stdin to signal end of input
        drop(self.process.stdin.take());

        let output = match self.reader.take() {
            Some(reader) => reader
                .join()
                .map_err(|_| Error::Ffmpeg("FFmpeg reader thread panicked".to_string()))?
                .map_err(|e| Error::Ffmpeg(format!("Failed to read output: {}", e)))?,
            None => Vec::new(),
        };

        let status = self
            .process
            .wait()
            .map_err(|e| Error::Ffmpeg(format!("FFmpeg process error: {}", e)))?;

        if !status.success() && !self.submitted_pts.is_empty() {
            return Err(Error::Ffmpeg(format!("FFmpeg exited with {}", status)));
        }

        Ok(self.parse_bitstream(&output))
    }

    fn codec_config(&self) -> Option<Vec<u8>> {
        // A stream with no frames carries no SPS; describe the track from
        // the configured geometry instead so an empty run still muxes
        self.sps
            .clone()
            .or_else(|| Some(build_sps(self.config.width, self.config.height)))
    }

    fn pps(&self) -> Option<Vec<u8>> {
        self.pps.clone().or_else(|| Some(build_pps()))
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Kill the process if it's still running
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Find H.264 start code (0x00 0x00 0x01 or 0x00 0x00 0x00 0x01) in data
fn find_start_code(data: &[u8], start: usize) -> Option<(usize, usize)> {
    if start + 3 > data.len() {
        return None;
    }

    for i in start..data.len() - 2 {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                return Some((i, 3));
            }
            if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                return Some((i, 4));
            }
        }
    }

    None
}

/// Find ffmpeg executable
fn find_ffmpeg(custom_path: Option<&str>) -> Result<String> {
    if let Some(path) = custom_path {
        if std::path::Path::new(path).exists() {
            return Ok(path.to_string());
        }
        return Err(Error::Ffmpeg(format!("FFmpeg not found at: {}", path)));
    }

    let paths = ["ffmpeg", "/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"];

    for path in paths {
        if Command::new(path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            return Ok(path.to_string());
        }
    }

    Err(Error::CodecUnavailable(
        "FFmpeg not found in PATH".to_string(),
    ))
}

/// Build a baseline-profile SPS NAL describing the configured geometry.
///
/// Used when the stream itself produced none (zero frames encoded), so the
/// MP4 track can still be described.
fn build_sps(width: u32, height: u32) -> Vec<u8> {
    let mb_width = width.div_ceil(16);
    let mb_height = height.div_ceil(16);
    // Crop units are 2 px for 4:2:0 frame coding
    let crop_right = (mb_width * 16 - width) / 2;
    let crop_bottom = (mb_height * 16 - height) / 2;

    let mut bits = BitWriter::new();
    bits.put_bits(0x67, 8); // NAL header: nal_ref_idc 3, type 7 (SPS)
    bits.put_bits(66, 8); // profile_idc: baseline
    bits.put_bits(0xC0, 8); // constraint_set0/1 flags
    bits.put_bits(40, 8); // level_idc: 4.0
    bits.put_ue(0); // seq_parameter_set_id
    bits.put_ue(0); // log2_max_frame_num_minus4
    bits.put_ue(2); // pic_order_cnt_type
    bits.put_ue(1); // max_num_ref_frames
    bits.put_bit(false); // gaps_in_frame_num_value_allowed_flag
    bits.put_ue(mb_width - 1); // pic_width_in_mbs_minus1
    bits.put_ue(mb_height - 1); // pic_height_in_map_units_minus1
    bits.put_bit(true); // frame_mbs_only_flag
    bits.put_bit(true); // direct_8x8_inference_flag
    let cropped = crop_right > 0 || crop_bottom > 0;
    bits.put_bit(cropped); // frame_cropping_flag
    if cropped {
        bits.put_ue(0); // frame_crop_left_offset
        bits.put_ue(crop_right); // frame_crop_right_offset
        bits.put_ue(0); // frame_crop_top_offset
        bits.put_ue(crop_bottom); // frame_crop_bottom_offset
    }
    bits.put_bit(false); // vui_parameters_present_flag
    bits.finish()
}

/// Build the PPS NAL matching [`build_sps`]
fn build_pps() -> Vec<u8> {
    let mut bits = BitWriter::new();
    bits.put_bits(0x68, 8); // NAL header: nal_ref_idc 3, type 8 (PPS)
    bits.put_ue(0); // pic_parameter_set_id
    bits.put_ue(0); // seq_parameter_set_id
    bits.put_bit(false); // entropy_coding_mode_flag (CAVLC)
    bits.put_bit(false); // bottom_field_pic_order_in_frame_present_flag
    bits.put_ue(0); // num_slice_groups_minus1
    bits.put_ue(0); // num_ref_idx_l0_default_active_minus1
    bits.put_ue(0); // num_ref_idx_l1_default_active_minus1
    bits.put_bit(false); // weighted_pred_flag
    bits.put_bits(0, 2); // weighted_bipred_idc
    bits.put_se(0); // pic_init_qp_minus26
    bits.put_se(0); // pic_init_qs_minus26
    bits.put_se(0); // chroma_qp_index_offset
    bits.put_bit(false); // deblocking_filter_control_present_flag
    bits.put_bit(false); // constrained_intra_pred_flag
    bits.put_bit(false); // redundant_pic_cnt_present_flag
    bits.finish()
}

/// MSB-first bitstream writer with Exp-Golomb coding for RBSP payloads
struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    used: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cur: 0,
            used: 0,
        }
    }

    fn put_bit(&mut self, bit: bool) {
        self.cur = (self.cur << 1) | bit as u8;
        self.used += 1;
        if self.used == 8 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.used = 0;
        }
    }

    fn put_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.put_bit((value >> i) & 1 == 1);
        }
    }

    /// Unsigned Exp-Golomb
    fn put_ue(&mut self, value: u32) {
        let leading = 31 - (value + 1).leading_zeros();
        self.put_bits(0, leading);
        self.put_bits(value + 1, leading + 1);
    }

    /// Signed Exp-Golomb
    fn put_se(&mut self, value: i32) {
        let code = if value > 0 {
            value as u32 * 2 - 1
        } else {
            value.unsigned_abs() * 2
        };
        self.put_ue(code);
    }

    /// Append the RBSP stop bit, byte-align and insert emulation prevention
    fn finish(mut self) -> Vec<u8> {
        self.put_bit(true);
        while self.used != 0 {
            self.put_bit(false);
        }

        // 0x000000..0x000003 must not appear in the encoded payload
        let mut out = Vec::with_capacity(self.bytes.len() + 2);
        let mut zeros = 0;
        for &byte in &self.bytes {
            if zeros >= 2 && byte <= 0x03 {
                out.push(0x03);
                zeros = 0;
            }
            out.push(byte);
            zeros = if byte == 0 { zeros + 1 } else { 0 };
        }
        out
    }
}

/// Check if ffmpeg with H.264 support is available
pub fn check_available(ffmpeg_path: Option<&str>) -> Result<()> {
    let ffmpeg = find_ffmpeg(ffmpeg_path)?;

    let output = Command::new(&ffmpeg)
        .args(["-encoders"])
        .output()
        .map_err(|e| Error::Ffmpeg(format!("Failed to run ffmpeg: {}", e)))?;

    let encoders = String::from_utf8_lossy(&output.stdout);
    if encoders.contains("libx264") {
        Ok(())
    } else {
        Err(Error::CodecUnavailable(
            "FFmpeg does not have libx264 support".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_start_code() {
        let data = [0x00, 0x00, 0x01, 0xAA, 0x00, 0x00, 0x00, 0x01, 0xBB];
        assert_eq!(find_start_code(&data, 0), Some((0, 3)));
        assert_eq!(find_start_code(&data, 3), Some((4, 4)));
        assert_eq!(find_start_code(&data, 8), None);
    }

    #[test]
    fn test_exp_golomb_coding() {
        // ue(0) ue(1) ue(2) = 1 010 011, stop bit 1 fills the byte
        let mut bits = BitWriter::new();
        bits.put_ue(0);
        bits.put_ue(1);
        bits.put_ue(2);
        assert_eq!(bits.finish(), vec![0xA7]);
    }

    #[test]
    fn test_generated_sps_describes_geometry() {
        let sps = build_sps(1920, 1080);
        assert_eq!(sps[0], 0x67); // SPS NAL header
        assert_eq!(sps[1], 66); // baseline profile
        assert_eq!(sps[3], 40); // level 4.0
        assert!(sps.len() >= 4);

        // 1080 is not macroblock-aligned, 1088 is; geometry changes the SPS
        assert_ne!(build_sps(1920, 1088), sps);
    }

    #[test]
    fn test_generated_pps_header() {
        let pps = build_pps();
        assert_eq!(pps[0], 0x68); // PPS NAL header
        assert!(!pps.is_empty());
    }
}
