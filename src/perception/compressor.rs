/// Adaptive JPEG compression for frames kept in agent memory.
///
/// Instead of a fixed quality setting, the quality is binary-searched so the
/// re-encoded image lands at or below a byte budget derived from the input size.
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, Rgb, RgbImage};

use crate::config::CompressionConfig;
use crate::errors::{SeeShotError, SeeShotResult};
use crate::perception::types::{CompressedFrame, Frame};

/// Highest quality used; above this JPEG size grows with no visible gain.
pub const MAX_QUALITY: u8 = 95;
pub const MIN_QUALITY: u8 = 1;
/// Upper bound on encodes performed by the quality search.
pub const MAX_PROBES: u32 = 8;

/// Re-encode `raw` (any format `image` can decode) as JPEG no larger than
/// `target_size_percent`% of `raw.len()`, after downscaling each side to
/// `scale_percent`%.
///
/// When even quality 1 cannot meet the budget, the quality-1 encoding is returned.
pub fn compress(raw: &[u8], target_size_percent: u8, scale_percent: u8) -> SeeShotResult<Vec<u8>> {
    for (name, value) in [("target_size_percent", target_size_percent), ("scale_percent", scale_percent)] {
        if !(1..=100).contains(&value) {
            return Err(SeeShotError::Config(format!("{name} must be within 1..=100, got {value}")));
        }
    }

    let target_bytes = raw.len() * target_size_percent as usize / 100;

    let img = image::load_from_memory(raw)
        .map_err(|e| SeeShotError::Perception(format!("compress load: {e}")))?;
    let img = if scale_percent < 100 {
        let w = scaled_dim(img.width(), scale_percent);
        let h = scaled_dim(img.height(), scale_percent);
        img.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = flatten_onto_white(&img);

    let best_effort = encode_jpeg(&rgb, MAX_QUALITY)?;
    if target_size_percent == 100 || best_effort.len() <= target_bytes {
        tracing::debug!(
            input = raw.len(),
            output = best_effort.len(),
            quality = MAX_QUALITY,
            "compression target met without search"
        );
        return Ok(best_effort);
    }

    let (mut lo, mut hi) = (MIN_QUALITY as i32, MAX_QUALITY as i32);
    let mut best: Option<(u8, Vec<u8>)> = None;
    let mut probes = 0;
    while lo <= hi && probes < MAX_PROBES {
        let quality = ((lo + hi) / 2) as u8;
        probes += 1;
        let encoded = encode_jpeg(&rgb, quality)?;
        if encoded.len() <= target_bytes {
            best = Some((quality, encoded));
            lo = quality as i32 + 1;
        } else {
            hi = quality as i32 - 1;
        }
    }

    match best {
        Some((quality, encoded)) => {
            tracing::debug!(
                input = raw.len(),
                output = encoded.len(),
                target = target_bytes,
                quality,
                probes,
                "compression target met"
            );
            Ok(encoded)
        }
        None => {
            let encoded = encode_jpeg(&rgb, MIN_QUALITY)?;
            tracing::warn!(
                input = raw.len(),
                output = encoded.len(),
                target = target_bytes,
                probes,
                "compression target unreachable, using lowest quality"
            );
            Ok(encoded)
        }
    }
}

/// Compress a captured frame with the configured targets.
pub fn compress_frame(frame: &Frame, cfg: &CompressionConfig) -> SeeShotResult<CompressedFrame> {
    compress(&frame.image_bytes, cfg.target_size_percent, cfg.scale_percent).map(CompressedFrame::new)
}

fn scaled_dim(dim: u32, percent: u8) -> u32 {
    ((dim as u64 * percent as u64) / 100).max(1) as u32
}

/// Drop any alpha channel by compositing onto an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let alpha = p[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        out.put_pixel(x, y, Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
    }
    out
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> SeeShotResult<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| SeeShotError::Perception(format!("JPEG encode q{quality}: {e}")))?;
    Ok(out)
}
