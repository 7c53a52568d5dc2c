use crate::{
    config::EngineConfig,
    data_structures::{
        atlas::TextureAtlas,
        instance::Instance,
        model::MeshData,
        registry::ModelRegistry,
        transforms::{EncodedTransforms, InstanceKey, TransformStore},
    },
    error::{EngineError, Result},
    render::DrawCommand,
    resources::{self, AssetSource},
};

/// A live game object as the batching core sees it: one instance of one mesh.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub mesh: String,
    pub key: InstanceKey,
}

/// Owns the mesh registry, the transform store and the texture atlas, and keeps the first
/// two in lockstep.
///
/// Create one per process and hand `&mut` access to the game loop. The GPU side
/// ([`GpuBuffers`](crate::render::GpuBuffers) and friends) lives with the host, which owns
/// the device.
#[derive(Debug)]
pub struct Context {
    pub config: EngineConfig,
    registry: ModelRegistry,
    transforms: TransformStore,
    atlas: TextureAtlas,
}

impl Context {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: ModelRegistry::new(&config),
            transforms: TransformStore::new(config.transform_encoding),
            atlas: TextureAtlas::new(config.max_atlas_width),
            config,
        }
    }

    /// Register already parsed geometry and reserve atlas entries for its textures.
    pub fn load_mesh(&mut self, name: &str, mesh: &MeshData) -> Result<()> {
        if self.registry.contains(name) {
            log::debug!("mesh `{name}` already loaded");
            return Ok(());
        }
        self.registry.load_mesh(name, mesh)?;
        for texture in mesh.texture_names(name) {
            self.atlas.register(texture);
        }
        Ok(())
    }

    /// Locate and parse `name` in `source`, then register it. Already loaded meshes are not
    /// read again.
    pub fn load_mesh_from(&mut self, source: &dyn AssetSource, name: &str) -> Result<()> {
        if self.registry.contains(name) {
            return Ok(());
        }
        let mesh = resources::load_mesh(source, name)?;
        self.load_mesh(name, &mesh)
    }

    /// Add an instance of `mesh` placed at `transform`.
    pub fn spawn(&mut self, mesh: &str, transform: Instance) -> Result<InstanceHandle> {
        self.registry.add_instances(mesh, 1)?;
        let key = self.transforms.add_instance(mesh, transform);
        Ok(InstanceHandle {
            mesh: mesh.to_string(),
            key,
        })
    }

    /// Remove the instance behind `handle`. Returns `false` when it was already gone.
    pub fn despawn(&mut self, handle: &InstanceHandle) -> Result<bool> {
        let live = self.registry.instance_count(&handle.mesh)?;
        if self.transforms.transform(&handle.mesh, handle.key).is_none() {
            log::warn!("{handle:?} despawned twice");
            return Ok(false);
        }
        if live == 0 {
            log::error!("mesh `{}` tracks a transform without instances", handle.mesh);
            return Err(EngineError::InsufficientInstances {
                name: handle.mesh.clone(),
                requested: 1,
                available: 0,
            });
        }
        self.transforms.remove_instance(&handle.mesh, handle.key);
        self.registry.remove_instances(&handle.mesh, 1)?;
        Ok(true)
    }

    pub fn set_transform(&mut self, handle: &InstanceHandle, transform: Instance) -> bool {
        self.transforms
            .set_transform(&handle.mesh, handle.key, transform)
    }

    pub fn transform(&self, handle: &InstanceHandle) -> Option<&Instance> {
        self.transforms.transform(&handle.mesh, handle.key)
    }

    /// Decode and pack every texture registered so far.
    pub fn build_atlas(&mut self, source: &dyn AssetSource) {
        self.atlas.build(source);
    }

    /// Flatten the transforms of all live instances for this frame.
    pub fn flush(&self) -> Result<EncodedTransforms> {
        self.transforms.flush(&self.registry)
    }

    pub fn draw_commands(&self) -> impl Iterator<Item = DrawCommand<'_>> {
        self.registry.draw_commands()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn transforms(&self) -> &TransformStore {
        &self.transforms
    }

    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
