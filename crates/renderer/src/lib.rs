//! Renderer: wgpu context, one textured mesh, frame plan execution.
//! wgpu = 26.x, winit = 0.30.x

pub mod frame;

use std::sync::Arc;

use asset::{CompiledShaders, MeshData, TextureData, shader};
use bytemuck::{Pod, Zeroable};
use corelib::{SetupError, SetupResult};
use thiserror::Error;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits,
    LoadOp, MultisampleState, Operations, PipelineLayoutDescriptor, PowerPreference, PresentMode,
    PrimitiveState, Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp,
    Surface, SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, VertexState,
    util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

pub use frame::{FrameCommand, FrameParams, FramePlan, PlanError};
use frame::{AttributeState, BufferId, POSITION_BUFFER_LAYOUT};

/// MVP uniform block (group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct TransformUniform {
    mvp: [f32; 16],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const TRANSFORM_GROUP: u32 = 0;
const TEXTURE_GROUP: u32 = 1;

/// Everything uploaded once at startup.
pub struct SceneAssets<'a> {
    pub mesh: &'a MeshData,
    pub texture: &'a TextureData,
    pub shaders: &'a CompiledShaders,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("invalid frame plan: {0}")]
    Plan(#[from] PlanError),
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Program
    pipeline: RenderPipeline,
    transform_buf: Buffer,
    transform_bg: BindGroup,

    // Mesh
    positions: Buffer,
    texcoords: Buffer,
    vertex_count: u32,

    // Texture units, index = unit number. Each bind group keeps its texture alive.
    texture_units: Vec<BindGroup>,

    // Render targets
    sample_count: u32,
    msaa_view: Option<TextureView>,
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create the GPU context for `window` and upload the scene.
    ///
    /// `requested_samples` is clamped to 1 if the adapter cannot multisample
    /// the surface or depth format at that count.
    pub async fn new(
        window: Arc<Window>,
        assets: SceneAssets<'_>,
        requested_samples: u32,
    ) -> SetupResult<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor::default());
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| SetupError::Context(format!("create_surface failed: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SetupError::Context(format!("no suitable GPU adapter: {e}")))?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Model Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| SetupError::Context(format!("request_device failed: {e}")))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| SetupError::Context("surface reports no formats".into()))?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .iter()
                .copied()
                .find(|m| *m == wgpu::CompositeAlphaMode::Opaque)
                .or_else(|| caps.alpha_modes.first().copied())
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = pick_sample_count(&adapter, surface_format, requested_samples);
        log::info!("Surface {surface_format:?} {width}x{height}, {sample_count}x MSAA");

        let depth_view = create_depth_view(&device, &surface_config, sample_count);
        let msaa_view = create_msaa_view(&device, &surface_config, sample_count);

        // ==== Transform uniform ====
        let transform_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Transform BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<TransformUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let transform_init = TransformUniform {
            mvp: glam::Mat4::IDENTITY.to_cols_array(),
        };
        let transform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Transform UBO"),
            contents: bytemuck::bytes_of(&transform_init),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let transform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Transform BG"),
            layout: &transform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: transform_buf.as_entire_binding(),
            }],
        });

        // ==== Texture unit 0 ====
        let texture_bgl = create_texture_bgl(&device);
        let texture_bg = upload_texture(&device, &queue, &texture_bgl, assets.texture);

        // ==== Program ====
        let pipeline = create_pipeline(
            &device,
            assets.shaders,
            &[&transform_bgl, &texture_bgl],
            surface_format,
            sample_count,
        )
        .await?;

        // ==== Geometry ====
        let mesh = assets.mesh;
        let vertex_count = u32::try_from(mesh.vertex_count())
            .map_err(|_| SetupError::Context("mesh has too many vertices".into()))?;
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Positions VB"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: BufferUsages::VERTEX,
        });
        let texcoords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("TexCoords VB"),
            contents: bytemuck::cast_slice(&mesh.uvs),
            usage: BufferUsages::VERTEX,
        });
        log::info!(
            "Uploaded {} vertices ({} triangles)",
            vertex_count,
            vertex_count / 3
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            pipeline,
            transform_buf,
            transform_bg,
            positions,
            texcoords,
            vertex_count,
            texture_units: vec![texture_bg],
            sample_count,
            msaa_view,
            depth_view,
            width,
            height,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Resize: reconfigure surface & recreate depth/MSAA targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config, self.sample_count);
        self.msaa_view = create_msaa_view(&self.device, &self.surface_config, self.sample_count);
    }

    /// Replay `plan` against a single render pass and present the frame.
    pub fn render(&mut self, plan: &FramePlan) -> Result<(), RenderError> {
        plan.validate()?;
        let Some(&FrameCommand::Clear { color, depth }) = plan.commands().first() else {
            return Err(PlanError::MissingClear.into());
        };

        let frame = self.surface.get_current_texture()?;
        let frame_view = frame.texture.create_view(&TextureViewDescriptor::default());
        let (target, resolve_target) = match &self.msaa_view {
            Some(msaa) => (msaa, Some(&frame_view)),
            None => (&frame_view, None),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color {
                            r: color[0],
                            g: color[1],
                            b: color[2],
                            a: color[3],
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(depth),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut attributes = AttributeState::default();

            for (index, cmd) in plan.commands().iter().enumerate().skip(1) {
                match *cmd {
                    FrameCommand::Clear { .. } => {
                        return Err(PlanError::LateClear { index }.into());
                    }
                    FrameCommand::UseProgram => {
                        rpass.set_pipeline(&self.pipeline);
                        rpass.set_bind_group(TRANSFORM_GROUP, &self.transform_bg, &[]);
                    }
                    FrameCommand::UploadMvp(mvp) => {
                        // Staged writes land before the submitted pass executes.
                        let uniform = TransformUniform { mvp };
                        self.queue
                            .write_buffer(&self.transform_buf, 0, bytemuck::bytes_of(&uniform));
                    }
                    // Validated to match the following BindSampler.
                    FrameCommand::ActiveTexture { .. } => {}
                    FrameCommand::BindSampler { unit } => {
                        match self.texture_units.get(unit as usize) {
                            Some(bg) => rpass.set_bind_group(TEXTURE_GROUP, bg, &[]),
                            None => log::warn!("No texture bound to unit {unit}"),
                        }
                    }
                    FrameCommand::EnableAttribute(slot) => attributes.enable(slot),
                    FrameCommand::DisableAttribute(slot) => attributes.disable(slot),
                    FrameCommand::BindBuffer(id) => attributes.bind(id),
                    FrameCommand::AttributePointer { slot, layout } => {
                        attributes.describe(index, slot, layout)?;
                    }
                    FrameCommand::DrawTriangles { first, count } => {
                        for (slot, id) in attributes.draw_inputs(index)? {
                            rpass.set_vertex_buffer(slot.index(), self.buffer(id).slice(..));
                        }
                        rpass.draw(first..first + count, 0..1);
                    }
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    fn buffer(&self, id: BufferId) -> &Buffer {
        match id {
            BufferId::Positions => &self.positions,
            BufferId::TexCoords => &self.texcoords,
        }
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        log::info!("Releasing GPU resources");
    }
}

fn pick_sample_count(adapter: &wgpu::Adapter, color: TextureFormat, requested: u32) -> u32 {
    if requested <= 1 {
        return 1;
    }
    let supported = |format| {
        adapter
            .get_texture_format_features(format)
            .flags
            .sample_count_supported(requested)
    };
    if supported(color) && supported(DEPTH_FORMAT) {
        requested
    } else {
        log::warn!("{requested}x MSAA not supported for {color:?}; rendering without it");
        1
    }
}

/// Build both shader modules and link them into the pipeline, turning wgpu
/// validation failures into a setup error instead of a panic.
async fn create_pipeline(
    device: &Device,
    shaders: &CompiledShaders,
    layouts: &[&BindGroupLayout],
    surface_format: TextureFormat,
    sample_count: u32,
) -> SetupResult<RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Transform VS"),
        source: ShaderSource::Wgsl(shaders.vertex_source().into()),
    });
    let fragment = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Texture FS"),
        source: ShaderSource::Wgsl(shaders.fragment_source().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Model PipelineLayout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Model Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &vertex,
            entry_point: Some(shader::VERTEX_ENTRY),
            buffers: &[POSITION_BUFFER_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &fragment,
            entry_point: Some(shader::FRAGMENT_ENTRY),
            targets: &[Some(ColorTargetState {
                format: surface_format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState {
            count: sample_count,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    });

    match device.pop_error_scope().await {
        Some(err) => Err(SetupError::Shader(err.to_string())),
        None => Ok(pipeline),
    }
}

fn create_texture_bgl(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Texture BGL"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Upload RGBA8 pixels and wrap them with a sampler in a bind group.
fn upload_texture(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    data: &TextureData,
) -> BindGroup {
    let size = Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("Diffuse Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(data.bytes_per_row()),
            rows_per_image: Some(data.height),
        },
        size,
    );

    let view = texture.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Diffuse Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Unit 0"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });
    bind_group
}

fn target_size(sc: &SurfaceConfiguration) -> Extent3d {
    Extent3d {
        width: sc.width.max(1),
        height: sc.height.max(1),
        depth_or_array_layers: 1,
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration, sample_count: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: target_size(sc),
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

/// Multisampled colour target resolved into the swapchain image.
fn create_msaa_view(
    device: &Device,
    sc: &SurfaceConfiguration,
    sample_count: u32,
) -> Option<TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("MsaaColorTex"),
        size: target_size(sc),
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: sc.format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(tex.create_view(&TextureViewDescriptor::default()))
}
