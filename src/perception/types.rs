use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::llm::types::{ContentPart, ImageUrl};

/// A pixel position in frame / screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotMeta {
    pub monitor_index: u32,
    pub scale_factor: f64,
    pub physical_width: u32,
    pub physical_height: u32,
}

impl ScreenshotMeta {
    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.physical_width, self.physical_height)
    }
}

/// One captured, encoded screen image. Cheap to clone; the bytes are shared.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image_bytes: Arc<[u8]>,
    pub meta: ScreenshotMeta,
    /// Identifies where the frame came from (monitor name + sequence number).
    pub source_id: String,
}

impl Frame {
    pub fn new(image_bytes: Vec<u8>, meta: ScreenshotMeta, source_id: impl Into<String>) -> Self {
        Self {
            image_bytes: image_bytes.into(),
            meta,
            source_id: source_id.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.image_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_bytes.is_empty()
    }

    pub fn to_content_part(&self) -> ContentPart {
        image_part(&self.image_bytes)
    }
}

/// A reduced-size JPEG copy of a [`Frame`], kept in agent memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedFrame {
    pub bytes: Vec<u8>,
}

impl CompressedFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_content_part(&self) -> ContentPart {
        image_part(&self.bytes)
    }
}

fn image_part(bytes: &[u8]) -> ContentPart {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:image/jpeg;base64,{b64}"),
        },
    }
}
