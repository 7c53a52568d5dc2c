#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
async fn device() -> Option<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    {
        Ok(adapter) => adapter,
        Err(e) => {
            log::warn!("skipping GPU test, no adapter: {e}");
            return None;
        }
    };
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("gpu upload test device"),
            ..Default::default()
        })
        .await
        .ok()?;
    Some((adapter, device, queue))
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn should_mirror_growing_buffers() {
    use herd_engine::{
        Context, EngineConfig, Instance,
        render::{GpuBuffers, supports_float_transforms},
    };

    herd_engine::init_logger();
    let Some((adapter, device, queue)) = device().await else {
        return;
    };
    let mut ctx = Context::new(EngineConfig::for_limits(&device.limits()));
    ctx.load_mesh("quad", &common::quad()).unwrap();
    ctx.spawn("quad", Instance::new()).unwrap();

    let mut gpu = GpuBuffers::new(&device, ctx.registry());
    let initial = gpu.vertex.capacity();

    ctx.load_mesh("strip", &common::triangles(40)).unwrap();
    for _ in 0..50 {
        ctx.spawn("strip", Instance::new()).unwrap();
    }
    gpu.sync(&device, &queue, ctx.registry());

    let registry = ctx.registry();
    assert!(gpu.vertex.capacity() > initial);
    assert!(gpu.vertex.capacity() >= registry.vertices().as_bytes().len() as u64);
    assert!(gpu.index.capacity() >= registry.indices().as_bytes().len() as u64);
    assert!(gpu.duplicated.capacity() >= registry.duplicated_indices().as_bytes().len() as u64);
    assert!(gpu.instance_ids.capacity() >= 51 * 4);

    // Only decides the encoding, both answers are valid.
    let _ = supports_float_transforms(&adapter);
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn should_grow_the_transform_texture() {
    use herd_engine::{
        Context, EngineConfig, Instance, TransformEncoding,
        data_structures::texture::Texture,
        render::TransformTexture,
    };

    let Some((_, device, queue)) = device().await else {
        return;
    };
    let config = EngineConfig::default().with_transform_encoding(TransformEncoding::byte_default());
    let mut ctx = Context::new(config);
    ctx.load_mesh("quad", &common::quad()).unwrap();
    for _ in 0..5 {
        ctx.spawn("quad", Instance::new()).unwrap();
    }

    let mut transforms = TransformTexture::new(&device, TransformEncoding::byte_default(), 1);
    transforms.upload(&device, &queue, &ctx.flush().unwrap());
    assert_eq!(transforms.rows(), 8);
    assert_eq!(transforms.texture().format, wgpu::TextureFormat::Rgba8Unorm);
    assert_eq!(transforms.texture().width(), 4);

    ctx.build_atlas(&common::assets());
    let atlas = Texture::from_atlas(&device, &queue, ctx.atlas());
    assert_eq!((atlas.width(), atlas.height()), ctx.atlas().size());
    assert!(atlas.sampler.is_some());
}

#[cfg(feature = "integration-tests")]
const DRAW_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, @location(2) instance: u32) -> @builtin(position) vec4<f32> {
    let offset = vec2<f32>(f32(instance) * 0.1, 0.0);
    return vec4<f32>(vertex.position.xy * 0.5 + offset, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

#[cfg(feature = "integration-tests")]
fn draw_pipeline(device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
    use herd_engine::data_structures::{
        instance::InstanceId,
        model::{ModelVertex, Vertex},
    };

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("draw test shader"),
        source: wgpu::ShaderSource::Wgsl(DRAW_SHADER.into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("draw test pipeline"),
        layout: None,
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[ModelVertex::desc(), InstanceId::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

// Validation errors panic through wgpu's default uncaptured error handler.
#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn should_record_instanced_and_duplicated_draws() {
    use herd_engine::{
        Context, Instance,
        render::{GpuBuffers, draw_duplicated, draw_instanced},
    };

    let Some((_, device, queue)) = device().await else {
        return;
    };
    let assets = common::assets();
    let mut ctx = Context::default();
    ctx.load_mesh_from(&assets, "quad").unwrap();
    ctx.load_mesh_from(&assets, "panel").unwrap();
    ctx.load_mesh_from(&assets, "tile").unwrap();
    for mesh in ["quad", "quad", "panel", "panel"] {
        ctx.spawn(mesh, Instance::new()).unwrap();
    }
    let gpu = GpuBuffers::new(&device, ctx.registry());

    let format = wgpu::TextureFormat::Rgba8Unorm;
    let pipeline = draw_pipeline(&device, format);
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("draw test target"),
        size: wgpu::Extent3d {
            width: 16,
            height: 16,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("draw test encoder"),
    });
    let mut instanced = 0;
    let mut duplicated = 0;
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("draw test pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        draw_instanced(&mut pass, &gpu, ctx.registry(), |_, _, _| instanced += 1);
        draw_duplicated(&mut pass, &gpu, ctx.registry(), |_, _, _| duplicated += 1);
    }
    queue.submit(std::iter::once(encoder.finish()));
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(std::time::Duration::from_secs(3)),
        })
        .unwrap();

    // quad: one range. panel: three sub-ranges. tile has no instances.
    assert_eq!(instanced, 4);
    // quad: two copies. panel: two copies of three sub-ranges.
    assert_eq!(duplicated, 8);
}
