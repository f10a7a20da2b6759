//! Frame rasterization into pooled buffers

use crate::pool::PooledBuffer;
use crate::source::{FrameSample, PixelFormat};
use crate::{Error, Result};
use image::{imageops::FilterType, DynamicImage, RgbaImage};

/// Draw a captured sample into a pooled buffer.
///
/// The sample is normalized to RGBA with premultiplied alpha and stretched to
/// exactly fill the buffer geometry. No aspect preservation, no letterboxing.
pub fn rasterize(sample: &FrameSample, target: &mut PooledBuffer) -> Result<()> {
    sample.check()?;

    let mut rgba = sample.data.clone();
    if sample.format == PixelFormat::Bgra8 {
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    premultiply_alpha(&mut rgba);

    let image = RgbaImage::from_raw(sample.width, sample.height, rgba).ok_or_else(|| {
        Error::Rasterize("sample cannot be decoded into a drawable image".to_string())
    })?;

    let (target_width, target_height) = (target.width(), target.height());
    let drawn = if sample.width == target_width && sample.height == target_height {
        image
    } else {
        DynamicImage::ImageRgba8(image)
            .resize_exact(target_width, target_height, FilterType::Lanczos3)
            .to_rgba8()
    };

    let out = target.data_mut();
    if out.len() != drawn.as_raw().len() {
        return Err(Error::Rasterize(format!(
            "buffer of {} bytes cannot hold a {}x{} frame",
            out.len(),
            target_width,
            target_height
        )));
    }
    out.copy_from_slice(drawn.as_raw());

    Ok(())
}

fn premultiply_alpha(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha == 255 {
            continue;
        }
        for channel in 0..3 {
            px[channel] = ((px[channel] as u16 * alpha + 127) / 255) as u8;
        }
    }
}
