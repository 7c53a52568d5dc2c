//! Binary glTF (`.glb`) meshes.
//!
//! The container is split by hand so a truncated file or a missing chunk can be reported by
//! name. The JSON document is then handed to the `gltf` crate, whose accessor reader takes
//! care of component types, strides and normalized integers.

use gltf::{buffer::Source as BufferSource, image::Source as ImageSource, mesh::Mode};

use crate::{
    data_structures::model::MeshData,
    error::{EngineError, Result},
    resources::mesh::MeshBuilder,
};

pub const GLB_MAGIC: &[u8; 4] = b"glTF";
const HEADER_LEN: usize = 12;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.starts_with(GLB_MAGIC)
}

struct Chunks<'a> {
    json: &'a [u8],
    bin: &'a [u8],
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn split_chunks<'a>(name: &str, bytes: &'a [u8]) -> Result<Chunks<'a>> {
    let malformed = |reason: String| EngineError::Format(format!("{name}: {reason}"));
    if bytes.len() < HEADER_LEN {
        return Err(malformed(format!("{} bytes is too short for a GLB header", bytes.len())));
    }
    if !is_glb(bytes) {
        return Err(malformed("missing `glTF` magic".to_string()));
    }
    let version = read_u32(bytes, 4);
    if version != 2 {
        return Err(malformed(format!("unsupported GLB version {version}")));
    }
    let length = read_u32(bytes, 8) as usize;
    if length > bytes.len() {
        return Err(malformed(format!(
            "header declares {length} bytes but only {} are present",
            bytes.len()
        )));
    }

    let mut json = None;
    let mut bin = None;
    let mut offset = HEADER_LEN;
    while offset + 8 <= length {
        let chunk_len = read_u32(bytes, offset) as usize;
        let chunk_type = read_u32(bytes, offset + 4);
        let start = offset + 8;
        let end = start
            .checked_add(chunk_len)
            .filter(|&end| end <= length)
            .ok_or_else(|| malformed(format!("chunk at byte {offset} runs past the end")))?;
        match chunk_type {
            CHUNK_JSON if json.is_none() => json = Some(&bytes[start..end]),
            CHUNK_BIN if bin.is_none() => bin = Some(&bytes[start..end]),
            other => log::debug!("{name}: skipping GLB chunk of type {other:#010x}"),
        }
        offset = end.next_multiple_of(4);
    }

    Ok(Chunks {
        json: json.ok_or_else(|| malformed("GLB has no JSON chunk".to_string()))?,
        bin: bin.ok_or_else(|| malformed("GLB has no BIN chunk".to_string()))?,
    })
}

/// Parse a GLB container into one mesh holding every triangle primitive of every mesh.
///
/// Primitives are bucketed by the texture their material samples. Texture coordinates are
/// used as stored since glTF already puts the origin at the top left.
pub fn parse_glb(name: &str, bytes: &[u8]) -> Result<MeshData> {
    let chunks = split_chunks(name, bytes)?;
    let document = gltf::Gltf::from_slice(chunks.json)
        .map_err(|e| EngineError::Format(format!("{name}: invalid glTF document: {e}")))?;
    let bin = chunks.bin;

    let mut builder = MeshBuilder::new(name);
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let mode = primitive.mode();
            if !matches!(mode, Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan) {
                log::warn!(
                    "{name}: skipping {mode:?} primitive {} of mesh {}",
                    primitive.index(),
                    mesh.index()
                );
                continue;
            }

            let reader = primitive.reader(move |buffer| match buffer.source() {
                BufferSource::Bin => Some(bin),
                BufferSource::Uri(_) => None,
            });
            let Some(positions) = reader.read_positions() else {
                log::warn!(
                    "{name}: primitive {} of mesh {} has no positions",
                    primitive.index(),
                    mesh.index()
                );
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().collect())
                .unwrap_or_default();
            let order: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let texture = texture_name(name, &primitive.material());
            builder.use_material(&texture, &texture);
            builder.reset_dedup();

            let mut corners = Vec::with_capacity(order.len());
            for i in order {
                let i = i as usize;
                if i >= positions.len() {
                    return Err(EngineError::Format(format!(
                        "{name}: index {i} out of range for {} positions",
                        positions.len()
                    )));
                }
                let uv = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
                corners.push(builder.vertex([i as i64, -1, -1], || (positions[i], uv)));
            }
            emit_triangles(&mut builder, mode, &corners);
        }
    }
    Ok(builder.build())
}

fn emit_triangles(builder: &mut MeshBuilder, mode: Mode, corners: &[u32]) {
    match mode {
        Mode::TriangleStrip => {
            for (i, w) in corners.windows(3).enumerate() {
                // Every other strip triangle flips to keep the winding consistent.
                if i % 2 == 0 {
                    builder.triangle(w[0], w[1], w[2]);
                } else {
                    builder.triangle(w[1], w[0], w[2]);
                }
            }
        }
        Mode::TriangleFan => {
            if let Some((&pivot, rest)) = corners.split_first() {
                for pair in rest.windows(2) {
                    builder.triangle(pivot, pair[0], pair[1]);
                }
            }
        }
        _ => {
            for tri in corners.chunks_exact(3) {
                builder.triangle(tri[0], tri[1], tri[2]);
            }
        }
    }
}

/// Atlas name for what `material` samples: the base colour texture's name, its image's name
/// or URI stem, then the material's own name, then one made up from its index.
fn texture_name(mesh_name: &str, material: &gltf::Material<'_>) -> String {
    let from_texture = material
        .pbr_metallic_roughness()
        .base_color_texture()
        .and_then(|info| {
            let texture = info.texture();
            let image = texture.source();
            texture
                .name()
                .or_else(|| image.name())
                .map(str::to_string)
                .or_else(|| match image.source() {
                    ImageSource::Uri { uri, .. } => std::path::Path::new(uri)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string),
                    ImageSource::View { .. } => None,
                })
        });
    from_texture
        .or_else(|| material.name().map(str::to_string))
        .unwrap_or_else(|| match material.index() {
            Some(index) => format!("{mesh_name}_mat_{index}"),
            // Primitives without a material use the glTF default one.
            None => mesh_name.to_string(),
        })
}
