#![allow(dead_code)]

use std::io::Cursor;

use herd_engine::{MemoryAssets, MeshData};

/// Four corners, one quad face, no texture coordinates.
pub const QUAD_OBJ: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";

pub const TRIANGLE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

/// Faces before the first `usemtl`, then two materials with `red` used twice.
pub const PANEL_OBJ: &str = "\
mtllib panel.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3
usemtl red
f 1 3 4
usemtl blue
f 1 2 4
usemtl red
f 2 3 4
";

pub const PANEL_MTL: &str = "\
newmtl red
Kd 1.0 0.0 0.0
map_Kd textures/Red_Bricks.png

newmtl blue
Kd 0.0 0.0 1.0
";

pub fn quad() -> MeshData {
    herd_engine::resources::mesh::parse_obj("quad", QUAD_OBJ).expect("quad parses")
}

pub fn triangle() -> MeshData {
    herd_engine::resources::mesh::parse_obj("tri", TRIANGLE_OBJ).expect("triangle parses")
}

/// A mesh with `n` unconnected triangles, `3 * n` vertices.
pub fn triangles(n: usize) -> MeshData {
    let mut text = String::new();
    for i in 0..n {
        let x = i as f32;
        text.push_str(&format!("v {x} 0 0\nv {x} 1 0\nv {x} 0 1\n"));
    }
    for i in 0..n {
        let base = i * 3 + 1;
        text.push_str(&format!("f {} {} {}\n", base, base + 1, base + 2));
    }
    herd_engine::resources::mesh::parse_obj("strip", &text).expect("triangles parse")
}

/// PNG bytes of a `width` x `height` image in one colour.
pub fn png(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(colour));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encodes");
    bytes
}

/// Wrap a glTF JSON document and a binary buffer into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

/// Binary buffer of [`QUAD_GLTF`]: positions, texture coordinates, `u16` indices.
pub fn quad_bin() -> Vec<u8> {
    let positions: [[f32; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let uvs: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let mut bin = Vec::new();
    bin.extend_from_slice(bytemuck::cast_slice(&positions));
    bin.extend_from_slice(bytemuck::cast_slice(&uvs));
    bin.extend_from_slice(bytemuck::cast_slice(&indices));
    bin
}

/// Two primitives sharing the quad positions: an indexed triangle list whose material
/// samples `textures/Bricks.png`, and a non-indexed fan with an unnamed material.
pub const QUAD_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [{ "byteLength": 92 }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 48 },
    { "buffer": 0, "byteOffset": 48, "byteLength": 32 },
    { "buffer": 0, "byteOffset": 80, "byteLength": 12 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC2" },
    { "bufferView": 2, "componentType": 5123, "count": 6, "type": "SCALAR" }
  ],
  "images": [{ "uri": "textures/Bricks.png" }],
  "textures": [{ "source": 0 }],
  "materials": [
    { "name": "brick", "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } },
    { "pbrMetallicRoughness": {} }
  ],
  "meshes": [{
    "primitives": [
      { "attributes": { "POSITION": 0, "TEXCOORD_0": 1 }, "indices": 2, "material": 0 },
      { "attributes": { "POSITION": 0 }, "material": 1, "mode": 6 }
    ]
  }]
}"#;

pub fn quad_glb() -> Vec<u8> {
    glb(QUAD_GLTF, &quad_bin())
}

/// In-memory assets holding the quad, the panel with its material library and textures.
pub fn assets() -> MemoryAssets {
    let mut assets = MemoryAssets::new();
    assets.insert("models/quad.obj", QUAD_OBJ);
    assets.insert("models/panel.obj", PANEL_OBJ);
    assets.insert("models/panel.mtl", PANEL_MTL);
    assets.insert("models/tile.glb", quad_glb());
    assets.insert("textures/quad.png", png(2, 2, [255, 0, 0, 255]));
    assets.insert("textures/Red_Bricks.png", png(4, 2, [200, 40, 40, 255]));
    assets
}
