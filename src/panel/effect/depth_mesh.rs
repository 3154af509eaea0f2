// SPDX-License-Identifier: GPL-3.0-only

//! Surface and sprite rendering of the depth grid
//!
//! One WGSL source drives two pipeline variants, since topology is fixed
//! per pipeline: a triangle-list surface path and an instanced
//! triangle-strip path that expands each depth pixel into a camera-facing
//! quad. `apply` picks the variant from the vertex mode and binds
//! everything a subsequent mesh draw needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::{debug, info};

use crate::errors::EffectError;
use crate::gpu::DeviceResources;
use crate::panel::effect::{
    DEPTH_BUFFER_FORMAT, DepthPointEffect, Effect, LightingParams, RENDER_TARGET_FORMAT, RampMode,
    VertexMode,
};
use crate::panel::texture::{PixelFormat, Texture};

const SURFACE_MODE_NONE: u32 = 0;
const SURFACE_MODE_DIRECT: u32 = 1;
const SURFACE_MODE_YUV: u32 = 2;

// layouts mirrored in depth_mesh.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CameraUniforms {
    wv: [[f32; 4]; 4],
    wvp: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameUniforms {
    width: f32,
    height: f32,
    min_z_mm: f32,
    max_z_mm: f32,
    texture_width: f32,
    texture_height: f32,
    vertex_mode: u32,
    ramp_mode: u32,
    surface_mode: u32,
    _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightingUniforms {
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
    light_dir: [f32; 4],
    enable_lighting: f32,
    specular_power: f32,
    ambient_only: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SpriteUniforms {
    proj: [[f32; 4]; 4],
    pixel_size_mm: f32,
    _pad: [f32; 3],
}

struct MeshEffectState {
    surface_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    lighting_buffer: wgpu::Buffer,
    sprite_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    // bound in the surface slot when no surface texture applies
    placeholder_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

/// Reconstructs and shades the depth grid in all vertex modes
pub struct DepthMeshEffect {
    width: u32,
    height: u32,
    min_z_mm: f32,
    max_z_mm: f32,
    pixel_size_mm: f32,
    state: Mutex<Option<MeshEffectState>>,
    loading_complete: AtomicBool,
}

fn unfilterable_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl DepthMeshEffect {
    /// Create the effect for a fixed frame size and valid depth range
    pub fn new(
        width: u32,
        height: u32,
        min_z_mm: f32,
        max_z_mm: f32,
        pixel_size_mm: f32,
    ) -> Self {
        Self {
            width,
            height,
            min_z_mm,
            max_z_mm,
            pixel_size_mm,
            state: Mutex::new(None),
            loading_complete: AtomicBool::new(false),
        }
    }

    /// Compile shaders and build the three pipeline variants
    pub async fn initialize(&self, resources: &DeviceResources) -> Result<(), EffectError> {
        let device = &resources.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth_mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("depth_mesh.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth_mesh_uniform_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                uniform_entry(2),
                uniform_entry(3),
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth_mesh_texture_layout"),
            entries: &[
                unfilterable_texture_entry(0),
                unfilterable_texture_entry(1),
                unfilterable_texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_mesh_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffer_layout = |step_mode| wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            }],
        };

        let make_pipeline = |label: &str,
                             entry_point: &str,
                             topology: wgpu::PrimitiveTopology,
                             step_mode: wgpu::VertexStepMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    buffers: &[vertex_buffer_layout(step_mode)],
                },
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_BUFFER_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: RENDER_TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
        };

        let surface_pipeline = make_pipeline(
            "depth_mesh_surface_pipeline",
            "vs_main",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::VertexStepMode::Vertex,
        );
        let sprite_pipeline = make_pipeline(
            "depth_mesh_sprite_pipeline",
            "vs_sprite",
            wgpu::PrimitiveTopology::TriangleStrip,
            wgpu::VertexStepMode::Instance,
        );

        let camera_buffer = create_uniform_buffer(
            device,
            "depth_mesh_camera_uniforms",
            std::mem::size_of::<CameraUniforms>(),
        );
        let frame_buffer = create_uniform_buffer(
            device,
            "depth_mesh_frame_uniforms",
            std::mem::size_of::<FrameUniforms>(),
        );
        let lighting_buffer = create_uniform_buffer(
            device,
            "depth_mesh_lighting_uniforms",
            std::mem::size_of::<LightingUniforms>(),
        );
        let sprite_buffer = create_uniform_buffer(
            device,
            "depth_mesh_sprite_uniforms",
            std::mem::size_of::<SpriteUniforms>(),
        );

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_mesh_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lighting_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: sprite_buffer.as_entire_binding(),
                },
            ],
        });

        let placeholder = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_mesh_placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        resources.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &placeholder,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("depth_mesh_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut slot = self
            .state
            .lock()
            .map_err(|_| EffectError::CreationFailed("state lock poisoned".into()))?;
        *slot = Some(MeshEffectState {
            surface_pipeline,
            sprite_pipeline,
            camera_buffer,
            frame_buffer,
            lighting_buffer,
            sprite_buffer,
            uniform_bind_group,
            texture_layout,
            placeholder_view,
            sampler,
            device: Arc::clone(&resources.device),
            queue: Arc::clone(&resources.queue),
        });
        drop(slot);
        self.loading_complete.store(true, Ordering::SeqCst);

        info!(
            width = self.width,
            height = self.height,
            "Depth mesh effect initialized"
        );
        Ok(())
    }

    /// Drop all device objects; the effect reports not-ready until the
    /// next `initialize`
    pub fn release(&self) {
        self.loading_complete.store(false, Ordering::SeqCst);
        let mut slot = self.state.lock().expect("effect state lock poisoned");
        if slot.take().is_some() {
            debug!("Depth mesh effect released");
        }
    }

    /// Bind the pipeline variant and resources for a vertex mode.
    ///
    /// Sprite modes fold the view transform per the mode: plain sprites
    /// view-transform the vertex and project with `proj`, while camera
    /// rotation mode leaves vertices in world space and projects with
    /// `proj * view`. A ramp mode overrides surface texturing; the ramp
    /// is borrowed from `point_effect`. Returns `false` while loading or
    /// when a required texture has no device backing.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        vertex_mode: VertexMode,
        ramp_mode: RampMode,
        view: Mat4,
        proj: Mat4,
        lighting: Option<&LightingParams>,
        surface_texture: Option<&Texture>,
        point_effect: Option<&DepthPointEffect>,
        depth_texture: &Texture,
        xy_texture: &Texture,
        uv_texture: &Texture,
    ) -> bool {
        if !self.loading_complete.load(Ordering::SeqCst) {
            return false;
        }
        let slot = self.state.lock().expect("effect state lock poisoned");
        let Some(state) = slot.as_ref() else {
            return false;
        };
        let (Some(depth_view), Some(xy_view), Some(uv_view)) = (
            depth_texture.shader_view(),
            xy_texture.shader_view(),
            uv_texture.shader_view(),
        ) else {
            return false;
        };

        let mut surface_mode = SURFACE_MODE_NONE;
        let mut texture_size = (1.0f32, 1.0f32);
        let surface_view = if ramp_mode != RampMode::None {
            match point_effect.and_then(|p| p.ramp_view(ramp_mode)) {
                Some(view) => view,
                None => return false,
            }
        } else if let Some(texture) = surface_texture {
            match texture.shader_view() {
                Some(view) => {
                    surface_mode = match texture.format() {
                        PixelFormat::Yuyv => SURFACE_MODE_YUV,
                        _ => SURFACE_MODE_DIRECT,
                    };
                    // frame pixel size, not the packed GPU texture size
                    texture_size = (texture.width() as f32, texture.height() as f32);
                    view
                }
                None => return false,
            }
        } else {
            state.placeholder_view.clone()
        };

        let (wv, sprite_proj) = match vertex_mode {
            VertexMode::PointSprite => (view, proj),
            VertexMode::PointSpriteWithCameraRotation => (Mat4::IDENTITY, proj * view),
            _ => (view, proj),
        };

        let camera = CameraUniforms {
            wv: wv.to_cols_array_2d(),
            wvp: (proj * view).to_cols_array_2d(),
        };
        let frame = FrameUniforms {
            width: self.width as f32,
            height: self.height as f32,
            min_z_mm: self.min_z_mm,
            max_z_mm: self.max_z_mm,
            texture_width: texture_size.0,
            texture_height: texture_size.1,
            vertex_mode: vertex_mode.shader_index(),
            ramp_mode: ramp_mode.shader_index(),
            surface_mode,
            _pad: [0; 3],
        };
        let light = lighting.copied().unwrap_or(LightingParams {
            enable_lighting: false,
            ..Default::default()
        });
        let lighting_uniforms = LightingUniforms {
            ambient: light.ambient.to_array(),
            diffuse: light.diffuse.to_array(),
            specular: light.specular.to_array(),
            light_dir: [light.direction.x, light.direction.y, light.direction.z, 0.0],
            enable_lighting: if light.enable_lighting { 1.0 } else { 0.0 },
            specular_power: light.specular_power,
            ambient_only: if light.is_ambient_only() { 1.0 } else { 0.0 },
            _pad: 0.0,
        };
        let sprite = SpriteUniforms {
            proj: sprite_proj.to_cols_array_2d(),
            pixel_size_mm: self.pixel_size_mm,
            _pad: [0.0; 3],
        };

        state
            .queue
            .write_buffer(&state.camera_buffer, 0, bytemuck::bytes_of(&camera));
        state
            .queue
            .write_buffer(&state.frame_buffer, 0, bytemuck::bytes_of(&frame));
        state.queue.write_buffer(
            &state.lighting_buffer,
            0,
            bytemuck::bytes_of(&lighting_uniforms),
        );
        state
            .queue
            .write_buffer(&state.sprite_buffer, 0, bytemuck::bytes_of(&sprite));

        let texture_bind_group = state.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_mesh_textures"),
            layout: &state.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&xy_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&uv_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&surface_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&state.sampler),
                },
            ],
        });

        let pipeline = if vertex_mode.is_sprite() {
            &state.sprite_pipeline
        } else {
            &state.surface_pipeline
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &state.uniform_bind_group, &[]);
        pass.set_bind_group(1, &texture_bind_group, &[]);
        true
    }
}

impl Effect for DepthMeshEffect {
    fn is_ready(&self) -> bool {
        self.loading_complete.load(Ordering::SeqCst)
    }
}
