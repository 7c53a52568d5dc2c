//! This module contains all logic for getting meshes and images out of asset bytes.
//!
//! Parsing is synchronous and works on whatever an [`AssetSource`] hands out. Fetching the
//! bytes in the first place is the only async part: [`load_binary`] reads them from disk or,
//! on the web, over HTTP, and [`MemoryAssets::preload`] gathers a whole set up front.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    data_structures::model::MeshData,
    error::{EngineError, Result},
};

pub mod glb;
pub mod mesh;
pub mod texture;

/// Where the loaders read asset bytes from. Names are `/`-separated relative paths.
pub trait AssetSource {
    /// The bytes of `name`, or [`EngineError::AssetNotFound`].
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Every name this source can read, used for fuzzy lookups.
    fn names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// Assets held in memory, typically filled by [`MemoryAssets::preload`] at startup.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fetch all `names` concurrently through [`load_binary`].
    pub async fn preload(names: &[&str]) -> anyhow::Result<Self> {
        let loads = names.iter().map(|name| load_binary(name));
        Self::collect(names, futures::future::join_all(loads).await)
    }

    /// Like [`MemoryAssets::preload`] but relative to `root` instead of `./assets`.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn preload_from(root: &Path, names: &[&str]) -> anyhow::Result<Self> {
        let loads = names.iter().map(|name| load_binary_from(root, name));
        Self::collect(names, futures::future::join_all(loads).await)
    }

    fn collect(names: &[&str], loaded: Vec<anyhow::Result<Vec<u8>>>) -> anyhow::Result<Self> {
        let mut assets = Self::new();
        for (name, bytes) in names.iter().zip(loaded) {
            assets.insert(*name, bytes?);
        }
        log::debug!("preloaded {} asset(s)", assets.len());
        Ok(assets)
    }
}

impl AssetSource for MemoryAssets {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        names
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// Assets read synchronously from a directory tree.
#[derive(Clone, Debug)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssets {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(EngineError::AssetNotFound(name.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        list_files(&self.root, "", &mut names);
        names.sort();
        names
    }

    fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

fn list_files(dir: &Path, prefix: &str, out: &mut Vec<String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot list {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            file_name
        } else {
            format!("{prefix}/{file_name}")
        };
        let path = entry.path();
        if path.is_dir() {
            list_files(&path, &relative, out);
        } else {
            out.push(relative);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("window has no origin"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

/// Read one asset: from `./assets` natively, from `<origin>/assets` on the web.
pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()
            .with_context(|| format!("failed to fetch asset {file_name}"))?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = load_binary_from(Path::new("./assets"), file_name).await?;

    Ok(data)
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_binary_from(root: &Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = root.join(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read asset {}", path.display()))
}

/// Parse mesh bytes, picking the format from the content.
pub fn parse_mesh(name: &str, bytes: &[u8]) -> Result<MeshData> {
    if glb::is_glb(bytes) {
        return glb::parse_glb(name, bytes);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| EngineError::Format(format!("{name}: neither GLB nor UTF-8 OBJ text: {e}")))?;
    mesh::parse_obj(name, text)
}

/// Locate, parse and texture the mesh `name`.
///
/// Tries `name` itself, then `models/<name>.obj`, `models/<name>.glb`, `<name>.obj` and
/// `<name>.glb`. Material libraries the OBJ references are looked up next to it; a missing
/// or broken one only costs the texture mapping.
pub fn load_mesh(source: &dyn AssetSource, name: &str) -> Result<MeshData> {
    let candidates = [
        name.to_string(),
        format!("models/{name}.obj"),
        format!("models/{name}.glb"),
        format!("{name}.obj"),
        format!("{name}.glb"),
    ];
    let path = candidates
        .into_iter()
        .find(|c| source.contains(c))
        .ok_or_else(|| EngineError::AssetNotFound(name.to_string()))?;

    let mut mesh = parse_mesh(name, &source.read(&path)?)?;

    let dir = Path::new(&path).parent().and_then(|p| p.to_str()).unwrap_or("");
    for lib in mesh.material_libs.clone() {
        let lib_path = if dir.is_empty() {
            lib.clone()
        } else {
            format!("{dir}/{lib}")
        };
        let found = [lib_path, lib.clone()].into_iter().find(|c| source.contains(c));
        let Some(found) = found else {
            log::warn!("{name}: material library `{lib}` not found, using material names");
            continue;
        };
        match source
            .read(&found)
            .and_then(|bytes| mesh::apply_material_library(&mut mesh, &bytes))
        {
            Ok(remapped) => log::debug!("{name}: `{lib}` mapped {remapped} sub-range(s)"),
            Err(e) => log::warn!("{name}: ignoring material library `{lib}`: {e}"),
        }
    }
    Ok(mesh)
}
