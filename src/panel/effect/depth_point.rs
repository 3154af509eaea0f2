// SPDX-License-Identifier: GPL-3.0-only

//! Point rendering of the depth grid with depth-to-color ramps
//!
//! Owns the two built-in 256-entry ramp textures: an HSV hue wheel and a
//! descending grey scale. The ramp data is generated on the CPU so the
//! mapping from depth to ramp entry stays testable without a device, and
//! other effects borrow the ramp views for their own lookups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::{debug, info};

use crate::constants::RAMP_LEVELS;
use crate::errors::EffectError;
use crate::gpu::DeviceResources;
use crate::panel::effect::{DEPTH_BUFFER_FORMAT, Effect, RENDER_TARGET_FORMAT, RampMode};
use crate::panel::texture::Texture;

/// Normalized position of a depth sample inside the valid range, clamped
pub fn normalized_depth(depth_mm: f32, min_z_mm: f32, max_z_mm: f32) -> f32 {
    if max_z_mm <= min_z_mm {
        return 0.0;
    }
    ((depth_mm - min_z_mm) / (max_z_mm - min_z_mm)).clamp(0.0, 1.0)
}

/// Ramp entry selected for a depth sample
pub fn ramp_index(depth_mm: f32, min_z_mm: f32, max_z_mm: f32) -> usize {
    let t = normalized_depth(depth_mm, min_z_mm, max_z_mm);
    ((t * (RAMP_LEVELS - 1) as f32) as usize).min(RAMP_LEVELS - 1)
}

/// HSV hue wheel sample for a normalized input, S=1 V=1
pub fn hue_ramp_rgba(normalized: f32) -> [u8; 4] {
    let h = normalized.clamp(0.0, 1.0) * 6.0;
    let hi = h.floor();
    let f = h - hi;
    let p = 0u8;
    let q = ((1.0 - f) * 255.0) as u8;
    let t = (f * 255.0) as u8;
    let v = 255u8;
    match hi as u32 {
        0 => [v, t, p, 255],
        1 => [q, v, p, 255],
        2 => [p, v, t, 255],
        3 => [p, q, v, 255],
        4 => [t, p, v, 255],
        _ => [v, p, q, 255],
    }
}

/// Full color ramp as tightly packed RGBA bytes
pub fn color_ramp_data() -> Vec<u8> {
    let mut data = Vec::with_capacity(RAMP_LEVELS * 4);
    for i in 0..RAMP_LEVELS {
        data.extend_from_slice(&hue_ramp_rgba(i as f32 / RAMP_LEVELS as f32));
    }
    data
}

/// Descending grey ramp as tightly packed RGBA bytes; near depths render
/// bright and the far end fades to black
pub fn grey_ramp_data() -> Vec<u8> {
    let mut data = Vec::with_capacity(RAMP_LEVELS * 4);
    for i in 0..RAMP_LEVELS {
        let level = (RAMP_LEVELS - 1 - i) as u8;
        data.extend_from_slice(&[level, level, level, 255]);
    }
    data
}

// layout mirrored in depth_point.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PointUniforms {
    wvp: [[f32; 4]; 4],
    width: f32,
    height: f32,
    min_z_mm: f32,
    max_z_mm: f32,
    point_color: [f32; 4],
    ramp_mode: u32,
    _pad: [u32; 3],
}

struct PointEffectState {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    grey_ramp_view: wgpu::TextureView,
    color_ramp_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

/// Renders the depth grid as a point list colored by depth
pub struct DepthPointEffect {
    width: u32,
    height: u32,
    min_z_mm: f32,
    max_z_mm: f32,
    point_color: [f32; 4],
    state: Mutex<Option<PointEffectState>>,
    loading_complete: AtomicBool,
}

fn create_ramp_texture(
    resources: &DeviceResources,
    label: &str,
    data: &[u8],
) -> wgpu::TextureView {
    let texture = resources.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: RAMP_LEVELS as u32,
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
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(RAMP_LEVELS as u32 * 4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: RAMP_LEVELS as u32,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl DepthPointEffect {
    /// Create the effect for a fixed frame size and valid depth range
    pub fn new(width: u32, height: u32, min_z_mm: f32, max_z_mm: f32) -> Self {
        Self {
            width,
            height,
            min_z_mm,
            max_z_mm,
            point_color: [1.0, 1.0, 1.0, 1.0],
            state: Mutex::new(None),
            loading_complete: AtomicBool::new(false),
        }
    }

    /// Compile shaders and build the pipeline and ramp textures
    pub async fn initialize(&self, resources: &DeviceResources) -> Result<(), EffectError> {
        let device = &resources.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth_point_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("depth_point.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth_point_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth_point_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_point_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("depth_point_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_point"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
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
                entry_point: Some("fs_point"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: RENDER_TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("depth_point_uniforms"),
            size: std::mem::size_of::<PointUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_point_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let grey_ramp_view = create_ramp_texture(resources, "grey_ramp", &grey_ramp_data());
        let color_ramp_view = create_ramp_texture(resources, "color_ramp", &color_ramp_data());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ramp_sampler"),
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
        *slot = Some(PointEffectState {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            grey_ramp_view,
            color_ramp_view,
            sampler,
            device: Arc::clone(&resources.device),
            queue: Arc::clone(&resources.queue),
        });
        drop(slot);
        self.loading_complete.store(true, Ordering::SeqCst);

        info!(
            width = self.width,
            height = self.height,
            "Depth point effect initialized"
        );
        Ok(())
    }

    /// Drop all device objects; the effect reports not-ready until the
    /// next `initialize`
    pub fn release(&self) {
        self.loading_complete.store(false, Ordering::SeqCst);
        let mut slot = self.state.lock().expect("effect state lock poisoned");
        if slot.take().is_some() {
            debug!("Depth point effect released");
        }
    }

    /// Built-in ramp view for a mode, `None` for [`RampMode::None`] or
    /// before initialization
    pub fn ramp_view(&self, mode: RampMode) -> Option<wgpu::TextureView> {
        let slot = self.state.lock().expect("effect state lock poisoned");
        let state = slot.as_ref()?;
        match mode {
            RampMode::None => None,
            RampMode::Color => Some(state.color_ramp_view.clone()),
            RampMode::Grey => Some(state.grey_ramp_view.clone()),
        }
    }

    /// Bind the point pipeline onto a pass.
    ///
    /// Returns `false` while loading or when the depth or XY texture has
    /// no device backing, leaving the pass untouched.
    pub fn apply(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        ramp_mode: RampMode,
        view: Mat4,
        proj: Mat4,
        depth_texture: &Texture,
        xy_texture: &Texture,
    ) -> bool {
        if !self.loading_complete.load(Ordering::SeqCst) {
            return false;
        }
        let slot = self.state.lock().expect("effect state lock poisoned");
        let Some(state) = slot.as_ref() else {
            return false;
        };
        let (Some(depth_view), Some(xy_view)) = (depth_texture.shader_view(), xy_texture.shader_view())
        else {
            return false;
        };

        let ramp_view = match ramp_mode {
            RampMode::None => state.grey_ramp_view.clone(),
            RampMode::Color => state.color_ramp_view.clone(),
            RampMode::Grey => state.grey_ramp_view.clone(),
        };

        let uniforms = PointUniforms {
            wvp: (proj * view).to_cols_array_2d(),
            width: self.width as f32,
            height: self.height as f32,
            min_z_mm: self.min_z_mm,
            max_z_mm: self.max_z_mm,
            point_color: self.point_color,
            ramp_mode: ramp_mode.shader_index(),
            _pad: [0; 3],
        };
        state
            .queue
            .write_buffer(&state.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let texture_bind_group = state.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_point_textures"),
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
                    resource: wgpu::BindingResource::TextureView(&ramp_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&state.sampler),
                },
            ],
        });

        pass.set_pipeline(&state.pipeline);
        pass.set_bind_group(0, &state.uniform_bind_group, &[]);
        pass.set_bind_group(1, &texture_bind_group, &[]);
        true
    }
}

impl Effect for DepthPointEffect {
    fn is_ready(&self) -> bool {
        self.loading_complete.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_depth_clamps() {
        assert_eq!(normalized_depth(100.0, 500.0, 8000.0), 0.0);
        assert_eq!(normalized_depth(9000.0, 500.0, 8000.0), 1.0);
        let mid = normalized_depth(4250.0, 500.0, 8000.0);
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_index_is_deterministic_and_in_range() {
        let a = ramp_index(2000.0, 500.0, 8000.0);
        let b = ramp_index(2000.0, 500.0, 8000.0);
        assert_eq!(a, b);
        assert!(a < RAMP_LEVELS);
        assert_eq!(a, 51);
    }

    #[test]
    fn test_ramp_index_monotone_in_depth() {
        let mut last = 0;
        for depth in (500..=8000).step_by(250) {
            let index = ramp_index(depth as f32, 500.0, 8000.0);
            assert!(index >= last);
            last = index;
        }
        assert_eq!(last, RAMP_LEVELS - 1);
    }

    #[test]
    fn test_degenerate_range_pins_to_near() {
        assert_eq!(normalized_depth(3000.0, 4000.0, 4000.0), 0.0);
        assert_eq!(ramp_index(3000.0, 4000.0, 1000.0), 0);
    }

    #[test]
    fn test_grey_ramp_descends_from_white() {
        let data = grey_ramp_data();
        assert_eq!(data.len(), RAMP_LEVELS * 4);
        assert_eq!(&data[0..4], &[255, 255, 255, 255]);
        assert_eq!(&data[data.len() - 4..], &[0, 0, 0, 255]);
        for i in 1..RAMP_LEVELS {
            assert!(data[i * 4] <= data[(i - 1) * 4]);
        }
    }

    #[test]
    fn test_color_ramp_starts_red() {
        let data = color_ramp_data();
        assert_eq!(data.len(), RAMP_LEVELS * 4);
        assert_eq!(&data[0..4], &[255, 0, 0, 255]);
        for chunk in data.chunks_exact(4) {
            assert_eq!(chunk[3], 255);
        }
    }

    #[test]
    fn test_hue_ramp_sector_boundaries() {
        assert_eq!(hue_ramp_rgba(0.0), [255, 0, 0, 255]);
        assert_eq!(hue_ramp_rgba(1.0 / 3.0), [0, 255, 0, 255]);
        assert_eq!(hue_ramp_rgba(2.0 / 3.0), [0, 0, 255, 255]);
    }
}
