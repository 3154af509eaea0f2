// SPDX-License-Identifier: GPL-3.0-only

//! Fullscreen blit of a texture into the current viewport
//!
//! Draws one oversized triangle with culling disabled, so a pass viewport
//! is all it takes to place the image (full surface or picture-in-picture).
//! The fragment path is chosen from the source format: packed YUYV color
//! unpacks to RGB, single-channel intensity goes through a ramp lookup,
//! anything else passes through unchanged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};

use crate::errors::EffectError;
use crate::gpu::DeviceResources;
use crate::panel::effect::{Effect, RENDER_TARGET_FORMAT};
use crate::panel::texture::{PixelFormat, Texture};

// perceptual curve for raw infrared intensity
const INTENSITY_DISPLAY_GAMMA: f32 = 0.32;

/// Fragment path of one blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitMode {
    /// Sample the source directly
    Direct,
    /// Unpack YUYV pixel pairs to RGB
    Yuyv,
    /// Colorize single-channel intensity through a ramp
    IntensityRamp,
}

impl BlitMode {
    fn shader_index(self) -> u32 {
        match self {
            BlitMode::Direct => 0,
            BlitMode::Yuyv => 1,
            BlitMode::IntensityRamp => 2,
        }
    }

    /// Pick the fragment path for a source format
    pub fn for_source(format: PixelFormat, has_ramp: bool) -> Self {
        match format {
            PixelFormat::Yuyv => BlitMode::Yuyv,
            PixelFormat::R16Unorm if has_ramp => BlitMode::IntensityRamp,
            _ => BlitMode::Direct,
        }
    }
}

// layout mirrored in render_texture.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlitUniforms {
    mode: u32,
    src_width: f32,
    src_height: f32,
    intensity_gamma: f32,
}

struct BlitEffectState {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    placeholder_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    device: Arc<wgpu::Device>,
}

/// Draws a source texture over the current viewport
pub struct RenderTextureEffect {
    state: Mutex<Option<BlitEffectState>>,
    loading_complete: AtomicBool,
}

impl Default for RenderTextureEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTextureEffect {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
            loading_complete: AtomicBool::new(false),
        }
    }

    /// Compile the blit shader and build the pipeline
    pub async fn initialize(&self, resources: &DeviceResources) -> Result<(), EffectError> {
        let device = &resources.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("render_texture_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("render_texture.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render_texture_bind_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
            label: Some("render_texture_pipeline_layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("render_texture_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_blit"),
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

        let placeholder = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_texture_placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("render_texture_sampler"),
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
        *slot = Some(BlitEffectState {
            pipeline,
            bind_layout,
            placeholder_view,
            sampler,
            device: Arc::clone(&resources.device),
        });
        drop(slot);
        self.loading_complete.store(true, Ordering::SeqCst);

        info!("Render texture effect initialized");
        Ok(())
    }

    /// Drop all device objects; the effect reports not-ready until the
    /// next `initialize`
    pub fn release(&self) {
        self.loading_complete.store(false, Ordering::SeqCst);
        let mut slot = self.state.lock().expect("effect state lock poisoned");
        if slot.take().is_some() {
            debug!("Render texture effect released");
        }
    }

    /// Draw `source` over the current viewport of `pass`.
    ///
    /// Uniforms live in a per-call buffer so one frame can blit several
    /// sources through the same effect. Returns `false` while loading or
    /// when the source has no device backing.
    pub fn blit(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        source: &Texture,
        ramp: Option<&wgpu::TextureView>,
    ) -> bool {
        if !self.loading_complete.load(Ordering::SeqCst) {
            return false;
        }
        let slot = self.state.lock().expect("effect state lock poisoned");
        let Some(state) = slot.as_ref() else {
            return false;
        };
        let Some(source_view) = source.shader_view() else {
            return false;
        };

        let mode = BlitMode::for_source(source.format(), ramp.is_some());
        let uniforms = BlitUniforms {
            mode: mode.shader_index(),
            src_width: source.width() as f32,
            src_height: source.height() as f32,
            intensity_gamma: match mode {
                BlitMode::IntensityRamp => INTENSITY_DISPLAY_GAMMA,
                _ => 1.0,
            },
        };
        let uniform_buffer = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render_texture_uniforms"),
            size: std::mem::size_of::<BlitUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: true,
        });
        uniform_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::bytes_of(&uniforms));
        uniform_buffer.unmap();

        let ramp_view = ramp.cloned().unwrap_or_else(|| state.placeholder_view.clone());
        let bind_group = state.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("render_texture_bindings"),
            layout: &state.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source_view),
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
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        true
    }
}

impl Effect for RenderTextureEffect {
    fn is_ready(&self) -> bool {
        self.loading_complete.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blit_mode_from_source_format() {
        assert_eq!(
            BlitMode::for_source(PixelFormat::Yuyv, false),
            BlitMode::Yuyv
        );
        assert_eq!(
            BlitMode::for_source(PixelFormat::R16Unorm, true),
            BlitMode::IntensityRamp
        );
        assert_eq!(
            BlitMode::for_source(PixelFormat::R16Unorm, false),
            BlitMode::Direct
        );
        assert_eq!(
            BlitMode::for_source(PixelFormat::Rgba8Unorm, true),
            BlitMode::Direct
        );
    }

    #[test]
    fn test_not_ready_before_initialize() {
        let effect = RenderTextureEffect::new();
        assert!(!effect.is_ready());
    }
}
