//! Texture atlas packing.
//!
//! Every texture a mesh samples is packed into one shared RGBA image so the whole scene can
//! be drawn with a single texture binding. Names are registered while meshes load, long
//! before any pixels exist; until [`TextureAtlas::build`] runs they all resolve to a 1x1
//! placeholder.
//!
//! Packing is row based: images are placed left to right in registration order and a new
//! row starts whenever the next image would cross the maximum width. Names whose image
//! could not be found or decoded get their own white 1x1 cell below the image rows, so a
//! missing texture renders flat white instead of sampling a neighbour.

use std::collections::HashMap;

use instant::Instant;

use crate::resources::{
    AssetSource,
    texture::{RawImage, decode_image},
};

const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Where one named texture lives inside the atlas, in texels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtlasRect {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }
    }
}

/// A texel rectangle normalized to `0..1` atlas coordinates: `uv * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

#[derive(Debug)]
pub struct TextureAtlas {
    entries: Vec<AtlasRect>,
    slots: HashMap<String, usize>,
    max_width: u32,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureAtlas {
    pub fn new(max_width: u32) -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
            max_width: max_width.max(1),
            width: 1,
            height: 1,
            pixels: WHITE.to_vec(),
        }
    }

    /// Reserve a rectangle for `name`. Registering a name twice keeps the first entry.
    pub fn register(&mut self, name: &str) {
        if self.slots.contains_key(name) {
            return;
        }
        log::debug!("registered texture placeholder for `{name}`");
        self.slots.insert(name.to_string(), self.entries.len());
        self.entries.push(AtlasRect::placeholder(name));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn rect(&self, name: &str) -> Option<&AtlasRect> {
        self.slots.get(name).map(|&slot| &self.entries[slot])
    }

    /// Atlas dimensions in texels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// RGBA8 pixels of the whole atlas, `width * height * 4` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Normalized placement of `name`; unknown names map onto the 1x1 texel at the origin.
    pub fn uv_rect(&self, name: &str) -> UvRect {
        let placeholder;
        let rect = match self.rect(name) {
            Some(rect) => rect,
            None => {
                placeholder = AtlasRect::placeholder(name);
                &placeholder
            }
        };
        let (w, h) = (self.width as f32, self.height as f32);
        UvRect {
            offset: [rect.x as f32 / w, rect.y as f32 / h],
            scale: [rect.width as f32 / w, rect.height as f32 / h],
        }
    }

    /// Locate, decode and pack the image of every registered name.
    ///
    /// Images that cannot be found or decoded are logged and packed as white placeholders;
    /// this never fails.
    pub fn build(&mut self, source: &dyn AssetSource) {
        let started = Instant::now();
        let listing = source.names();
        let mut images = HashMap::new();
        for name in self.names() {
            let Some(path) = locate_texture(source, &listing, name) else {
                log::warn!("no image found for texture `{name}`");
                continue;
            };
            let decoded = source.read(&path).and_then(|bytes| decode_image(&path, &bytes));
            match decoded {
                Ok(image) => {
                    images.insert(name.to_string(), image);
                }
                Err(e) => log::warn!("texture `{name}` falls back to a placeholder: {e}"),
            }
        }
        self.build_from_images(images);
        log::info!(
            "built {}x{} atlas for {} texture(s) in {:?}",
            self.width,
            self.height,
            self.entries.len(),
            started.elapsed()
        );
    }

    /// Pack already decoded images. Registered names without an entry in `images` become
    /// placeholders; images for unregistered names are ignored.
    pub fn build_from_images(&mut self, mut images: HashMap<String, RawImage>) {
        images.retain(|name, image| {
            let keep = image.is_consistent();
            if !keep {
                log::warn!(
                    "skipping texture `{}`: {} bytes do not cover {}x{} RGBA texels",
                    name,
                    image.rgba.len(),
                    image.width,
                    image.height
                );
            }
            keep
        });

        let mut placed = Vec::new();
        let mut missing = Vec::new();
        for (slot, entry) in self.entries.iter().enumerate() {
            match images.remove(&entry.name) {
                Some(image) => placed.push((slot, image.fit_width(self.max_width))),
                None => missing.push(slot),
            }
        }

        if placed.is_empty() {
            self.build_flat();
            return;
        }

        let mut packer = RowPacker::new(self.max_width);
        let image_positions: Vec<(u32, u32)> = placed
            .iter()
            .map(|(_, image)| packer.place(image.width, image.height))
            .collect();
        // Placeholders never share a row with real images.
        packer.finish_row();
        let placeholder_positions: Vec<(u32, u32)> =
            missing.iter().map(|_| packer.place(1, 1)).collect();
        packer.finish_row();

        self.width = packer.width.max(1);
        self.height = packer.height.max(1);
        self.pixels = vec![0; self.width as usize * self.height as usize * 4];

        for ((slot, image), (x, y)) in placed.iter().zip(image_positions) {
            self.blit(image, x, y);
            let entry = &mut self.entries[*slot];
            entry.x = x;
            entry.y = y;
            entry.width = image.width;
            entry.height = image.height;
        }
        for (&slot, (x, y)) in missing.iter().zip(placeholder_positions) {
            self.blit(&RawImage::filled(1, 1, WHITE), x, y);
            let entry = &mut self.entries[slot];
            entry.x = x;
            entry.y = y;
            entry.width = 1;
            entry.height = 1;
        }
        if !missing.is_empty() {
            log::info!("reserved {} placeholder texel(s) for missing textures", missing.len());
        }
    }

    /// Nothing decoded: one white texel that every name samples.
    fn build_flat(&mut self) {
        log::warn!("no texture decoded, atlas degrades to flat white");
        self.width = 1;
        self.height = 1;
        self.pixels = WHITE.to_vec();
        for entry in self.entries.iter_mut() {
            *entry = AtlasRect::placeholder(&entry.name);
        }
    }

    fn blit(&mut self, image: &RawImage, x: u32, y: u32) {
        let atlas_stride = self.width as usize * 4;
        let row_len = image.width as usize * 4;
        for row in 0..image.height {
            let start = (y + row) as usize * atlas_stride + x as usize * 4;
            self.pixels[start..start + row_len].copy_from_slice(image.row(row));
        }
    }
}

/// Left-to-right, top-to-bottom shelf packing.
struct RowPacker {
    max_width: u32,
    x: u32,
    y: u32,
    row_height: u32,
    width: u32,
    height: u32,
}

impl RowPacker {
    fn new(max_width: u32) -> Self {
        Self {
            max_width,
            x: 0,
            y: 0,
            row_height: 0,
            width: 0,
            height: 0,
        }
    }

    fn place(&mut self, width: u32, height: u32) -> (u32, u32) {
        if self.x > 0 && self.x + width > self.max_width {
            self.finish_row();
        }
        let position = (self.x, self.y);
        self.x += width;
        self.row_height = self.row_height.max(height);
        self.width = self.width.max(self.x);
        self.height = self.height.max(self.y + self.row_height);
        position
    }

    fn finish_row(&mut self) {
        self.y += self.row_height;
        self.x = 0;
        self.row_height = 0;
    }
}

const TEXTURE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Find the asset holding the image for texture `name`: the exact name, then the usual
/// texture paths, then any listed file whose stem matches case-insensitively.
fn locate_texture(source: &dyn AssetSource, listing: &[String], name: &str) -> Option<String> {
    let mut candidates = vec![name.to_string()];
    for ext in TEXTURE_EXTENSIONS {
        candidates.push(format!("textures/{name}.{ext}"));
    }
    for ext in TEXTURE_EXTENSIONS {
        candidates.push(format!("{name}.{ext}"));
    }
    if let Some(found) = candidates.into_iter().find(|c| source.contains(c)) {
        return Some(found);
    }

    let wanted = std::path::Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    listing
        .iter()
        .find(|candidate| {
            let path = std::path::Path::new(candidate.as_str());
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEXTURE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            let stem = path.file_stem().and_then(|s| s.to_str());
            is_image && stem.is_some_and(|s| s.eq_ignore_ascii_case(wanted))
        })
        .cloned()
}
