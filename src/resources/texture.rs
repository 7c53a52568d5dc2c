use image::{ImageFormat, load_from_memory_with_format};

use crate::error::{EngineError, Result};

/// Decoded RGBA8 pixels, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawImage {
    /// A `width` x `height` image filled with one colour.
    pub fn filled(width: u32, height: u32, colour: [u8; 4]) -> Self {
        let rgba = colour
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Whether the pixel data really is `width * height` RGBA texels.
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == self.width as usize * self.height as usize * 4
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &self.rgba[start..start + stride]
    }

    /// Shrink to at most `max_width` texels wide, keeping the aspect ratio.
    pub fn fit_width(self, max_width: u32) -> Self {
        if self.width <= max_width {
            return self;
        }
        let height = ((self.height as u64 * max_width as u64) / self.width as u64).max(1) as u32;
        let Some(buffer) = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
        else {
            return self;
        };
        let resized =
            image::imageops::resize(&buffer, max_width, height, image::imageops::FilterType::Triangle);
        Self {
            width: max_width,
            height,
            rgba: resized.into_raw(),
        }
    }
}

/// Which decoder handles a blob of image bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    /// Let the `image` crate guess from the content.
    Unknown,
}

impl ImageKind {
    const PNG_MAGIC: &'static [u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: &'static [u8] = &[0xFF, 0xD8, 0xFF];

    /// Pick a decoder from the leading bytes, falling back to the file extension.
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        if bytes.starts_with(Self::PNG_MAGIC) {
            return Self::Png;
        }
        if bytes.starts_with(Self::JPEG_MAGIC) {
            return Self::Jpeg;
        }
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("png") => Self::Png,
            Some("jpg") | Some("jpeg") => Self::Jpeg,
            _ => Self::Unknown,
        }
    }

    pub fn decode(self, name: &str, bytes: &[u8]) -> Result<RawImage> {
        let decoded = match self {
            Self::Png => load_from_memory_with_format(bytes, ImageFormat::Png),
            Self::Jpeg => load_from_memory_with_format(bytes, ImageFormat::Jpeg),
            Self::Unknown => image::load_from_memory(bytes),
        };
        let img = decoded.map_err(|e| EngineError::AssetDecode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        Ok(RawImage {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// Detect the image kind of `bytes` and decode them.
pub fn decode_image(name: &str, bytes: &[u8]) -> Result<RawImage> {
    ImageKind::detect(name, bytes).decode(name, bytes)
}
