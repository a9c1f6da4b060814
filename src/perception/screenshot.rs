use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, RgbaImage};

use crate::config::CaptureConfig;
use crate::errors::{SeeShotError, SeeShotResult};
use crate::perception::types::{Frame, ScreenshotMeta};

/// Produces one encoded frame per call. Capture is not cancellable.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> SeeShotResult<Frame>;
}

/// Captures a local monitor through `xcap` and encodes it as JPEG.
pub struct XcapFrameSource {
    monitor_index: Option<usize>,
    jpeg_quality: u8,
    seq: AtomicU64,
}

impl XcapFrameSource {
    pub fn new(cfg: &CaptureConfig) -> Self {
        Self {
            monitor_index: cfg.monitor_index,
            jpeg_quality: cfg.jpeg_quality,
            seq: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FrameSource for XcapFrameSource {
    async fn capture(&self) -> SeeShotResult<Frame> {
        let monitor_index = self.monitor_index;
        let quality = self.jpeg_quality;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let (bytes, meta) = tokio::task::spawn_blocking(move || capture_monitor(monitor_index, quality))
            .await
            .map_err(|e| SeeShotError::Perception(format!("capture join: {e}")))??;

        tracing::debug!(
            bytes = bytes.len(),
            w = meta.physical_width,
            h = meta.physical_height,
            "frame captured"
        );
        let source_id = format!("monitor{}#{seq}", meta.monitor_index);
        Ok(Frame::new(bytes, meta, source_id))
    }
}

fn capture_monitor(monitor_index: Option<usize>, quality: u8) -> SeeShotResult<(Vec<u8>, ScreenshotMeta)> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| SeeShotError::Perception(format!("list monitors: {e}")))?;

    let index = match monitor_index {
        Some(i) => i,
        None => monitors.iter().position(|m| m.is_primary()).unwrap_or(0),
    };
    let monitor = monitors
        .get(index)
        .ok_or_else(|| SeeShotError::Perception(format!("monitor {index} not found")))?;

    let shot = monitor
        .capture_image()
        .map_err(|e| SeeShotError::Perception(format!("capture monitor {index}: {e}")))?;
    let (w, h) = (shot.width(), shot.height());
    let rgba = RgbaImage::from_raw(w, h, shot.into_raw())
        .ok_or_else(|| SeeShotError::Perception("capture buffer size mismatch".into()))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
        .map_err(|e| SeeShotError::Perception(format!("JPEG encode: {e}")))?;

    let meta = ScreenshotMeta {
        monitor_index: index as u32,
        scale_factor: monitor.scale_factor() as f64,
        physical_width: w,
        physical_height: h,
    };
    Ok((out, meta))
}
