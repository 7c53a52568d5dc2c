use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
};

use crate::{
    data_structures::model::{MeshData, SubRange},
    error::{EngineError, Result},
};

/**
 * Dedup key of one face corner: `(position, texcoord, normal)` indices into the source
 * lists, `-1` for a component the corner does not reference.
 */
pub type CornerKey = [i64; 3];

/**
 * Accumulates deduplicated, triangulated geometry for one mesh.
 *
 * Both loaders feed it corners and polygons. Triangles are bucketed per material, and the
 * buckets are concatenated in first-seen order by [`MeshBuilder::build`], which turns each
 * of them into one [`SubRange`].
 */
pub struct MeshBuilder {
    name: String,
    vertices: Vec<f32>,
    dedup: HashMap<CornerKey, u32>,
    buckets: Vec<Bucket>,
    current: usize,
    has_materials: bool,
}

struct Bucket {
    material: String,
    texture: String,
    indices: Vec<u32>,
}

impl MeshBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            dedup: HashMap::new(),
            // Faces before any material switch are grouped under the mesh's own name.
            buckets: vec![Bucket {
                material: name.to_string(),
                texture: name.to_string(),
                indices: Vec::new(),
            }],
            current: 0,
            has_materials: false,
        }
    }

    /// Output index of the corner `key`. `make` runs only for the first occurrence.
    pub fn vertex<F>(&mut self, key: CornerKey, make: F) -> u32
    where
        F: FnOnce() -> ([f32; 3], [f32; 2]),
    {
        if let Some(&index) = self.dedup.get(&key) {
            return index;
        }
        let (position, uv) = make();
        let index = (self.vertices.len() / 5) as u32;
        self.vertices.extend_from_slice(&position);
        self.vertices.extend_from_slice(&uv);
        self.dedup.insert(key, index);
        index
    }

    /// Forget previously seen corners. Vertices already emitted stay.
    pub fn reset_dedup(&mut self) {
        self.dedup.clear();
    }

    /// Route following triangles into the bucket of `material`.
    pub fn use_material(&mut self, material: &str, texture: &str) {
        self.has_materials = true;
        self.current = match self.buckets.iter().position(|b| b.material == material) {
            Some(existing) => existing,
            None => {
                self.buckets.push(Bucket {
                    material: material.to_string(),
                    texture: texture.to_string(),
                    indices: Vec::new(),
                });
                self.buckets.len() - 1
            }
        };
    }

    pub fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.buckets[self.current].indices.extend_from_slice(&[a, b, c]);
    }

    /// Fan-triangulate a polygon around its first corner: `[0,1,2], [0,2,3], ...`.
    pub fn polygon(&mut self, corners: &[u32]) -> Result<()> {
        if corners.len() < 3 {
            return Err(EngineError::Format(format!(
                "{}: face with {} corner(s), need at least 3",
                self.name,
                corners.len()
            )));
        }
        for pair in corners[1..].windows(2) {
            self.triangle(corners[0], pair[0], pair[1]);
        }
        Ok(())
    }

    pub fn build(self) -> MeshData {
        let mut indices = Vec::new();
        let mut sub_ranges = Vec::new();
        for bucket in self.buckets.into_iter().filter(|b| !b.indices.is_empty()) {
            sub_ranges.push(SubRange {
                index_offset: indices.len() as u32,
                index_count: bucket.indices.len() as u32,
                material: bucket.material,
                texture: bucket.texture,
            });
            indices.extend(bucket.indices);
        }
        if !self.has_materials {
            sub_ranges.clear();
        }
        MeshData {
            vertices: self.vertices,
            indices,
            sub_ranges,
            material_libs: Vec::new(),
        }
    }
}

/// Parse Wavefront OBJ text into deduplicated, triangulated geometry.
///
/// Only positions and texture coordinates end up in the output. Normals are validated but
/// otherwise only take part in deduplication. V is flipped to the top-left origin the atlas
/// uses.
pub fn parse_obj(name: &str, text: &str) -> Result<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    let mut normal_count = 0usize;
    let mut material_libs = Vec::new();
    let mut builder = MeshBuilder::new(name);

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "v" => {
                let [x, y, z] = parse_floats::<3>(name, line_no, &mut tokens, 3)?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(name, line_no, &mut tokens, 1)?;
                texcoords.push([u, v]);
            }
            "vn" => {
                parse_floats::<3>(name, line_no, &mut tokens, 3)?;
                normal_count += 1;
            }
            "f" => {
                let mut corners = Vec::new();
                for corner in tokens {
                    let key = parse_corner(
                        name,
                        line_no,
                        corner,
                        [positions.len(), texcoords.len(), normal_count],
                    )?;
                    let index = builder.vertex(key, || {
                        let position = positions[key[0] as usize];
                        let uv = match key[1] {
                            -1 => [0.0, 0.0],
                            t => {
                                let [u, v] = texcoords[t as usize];
                                [u, 1.0 - v]
                            }
                        };
                        (position, uv)
                    });
                    corners.push(index);
                }
                builder.polygon(&corners).map_err(|e| match e {
                    EngineError::Format(reason) => {
                        EngineError::Format(format!("{reason} (line {line_no})"))
                    }
                    other => other,
                })?;
            }
            "usemtl" => {
                let material = tokens.collect::<Vec<_>>().join(" ");
                if material.is_empty() {
                    log::warn!("{name}:{line_no}: `usemtl` without a name, ignoring");
                } else {
                    builder.use_material(&material, &material);
                }
            }
            "mtllib" => material_libs.extend(tokens.map(str::to_string)),
            // Groups, objects, smoothing and comments do not affect the geometry.
            _ => {}
        }
    }

    let mut mesh = builder.build();
    mesh.material_libs = material_libs;
    Ok(mesh)
}

/// Parse up to `N` floats, requiring at least `required` of them. Missing optional
/// components are `0.0`.
fn parse_floats<const N: usize>(
    name: &str,
    line_no: usize,
    tokens: &mut std::str::SplitWhitespace<'_>,
    required: usize,
) -> Result<[f32; N]> {
    let mut values = [0.0; N];
    for (i, value) in values.iter_mut().enumerate() {
        match tokens.next() {
            Some(token) => {
                *value = token.parse().map_err(|_| {
                    EngineError::Format(format!("{name}:{line_no}: `{token}` is not a number"))
                })?;
            }
            None if i < required => {
                return Err(EngineError::Format(format!(
                    "{name}:{line_no}: expected {required} component(s), found {i}"
                )));
            }
            None => break,
        }
    }
    Ok(values)
}

/// Resolve `p`, `p/t`, `p//n` or `p/t/n` against the current list lengths.
fn parse_corner(name: &str, line_no: usize, corner: &str, lens: [usize; 3]) -> Result<CornerKey> {
    let mut key = [-1i64; 3];
    let mut parts = corner.split('/');
    for (slot, len) in lens.into_iter().enumerate() {
        let part = parts.next().unwrap_or("");
        if part.is_empty() {
            if slot == 0 {
                return Err(EngineError::Format(format!(
                    "{name}:{line_no}: corner `{corner}` has no position"
                )));
            }
            continue;
        }
        let reference: i64 = part.parse().map_err(|_| {
            EngineError::Format(format!("{name}:{line_no}: `{corner}` is not a valid corner"))
        })?;
        let resolved = match reference {
            r if r > 0 => r - 1,
            r if r < 0 => len as i64 + r,
            _ => -1,
        };
        if resolved < 0 || resolved >= len as i64 {
            return Err(EngineError::Format(format!(
                "{name}:{line_no}: reference {reference} in `{corner}` is out of range ({len} defined)"
            )));
        }
        key[slot] = resolved;
    }
    if parts.next().is_some() {
        return Err(EngineError::Format(format!(
            "{name}:{line_no}: corner `{corner}` has too many components"
        )));
    }
    Ok(key)
}

/**
 * Point each sub-range at the diffuse map of its material, as declared by an MTL file.
 *
 * Materials without a `map_Kd` keep their name as texture. Returns how many sub-ranges
 * were remapped.
 */
pub fn apply_material_library(mesh: &mut MeshData, mtl: &[u8]) -> Result<usize> {
    let (materials, _) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl)))
        .map_err(|e| EngineError::Format(format!("material library: {e}")))?;

    let mut remapped = 0;
    for sub in mesh.sub_ranges.iter_mut() {
        let diffuse = materials
            .iter()
            .find(|m| m.name == sub.material)
            .and_then(|m| m.diffuse_texture.as_deref());
        let Some(path) = diffuse else {
            continue;
        };
        let stem = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path);
        sub.texture = stem.to_string();
        remapped += 1;
    }
    Ok(remapped)
}
