//! GPU textures.
//!
//! This module provides [`Texture`], a wrapper around the WGPU texture resources the
//! batching core uploads: the shared texture atlas and the per-instance transform texture.

use crate::data_structures::atlas::TextureAtlas;

/// A GPU texture with a view and optional sampler.
///
/// Colour data (the atlas) comes with a sampler. Data textures such as the transform
/// texture are read with `textureLoad` and have none.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
    pub size: wgpu::Extent3d,
    pub format: wgpu::TextureFormat,
}

impl Texture {
    pub const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Upload the packed atlas. Call again after every [`TextureAtlas::build`].
    pub fn from_atlas(device: &wgpu::Device, queue: &wgpu::Queue, atlas: &TextureAtlas) -> Self {
        let (width, height) = atlas.size();
        let mut texture = Self::create(
            device,
            width,
            height,
            Self::ATLAS_FORMAT,
            Some("texture atlas"),
        );
        texture.write(queue, atlas.pixels(), width * 4, height);
        texture.sampler = Some(create_atlas_sampler(device));
        texture
    }

    /// An uninitialized `width` x `height` texture that can be bound and written to.
    pub fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: None,
            size,
            format,
        }
    }

    /// Overwrite the top `rows` rows, starting at the origin.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8], bytes_per_row: u32, rows: u32) {
        if rows == 0 || data.is_empty() {
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(rows),
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: rows,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

/// Nearest filtering clamped to the edge, so samples never bleed into a neighbouring
/// atlas entry.
pub fn create_atlas_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture atlas sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
