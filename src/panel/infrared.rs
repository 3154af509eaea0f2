// SPDX-License-Identifier: GPL-3.0-only

//! Infrared frame colorization
//!
//! Keeps the raw 16-bit intensity frame in a source texture and renders it
//! through an ascending intensity ramp into an RGBA image texture. The
//! image is what the panel composites, either full frame (infrared mode)
//! or as the base layer of the color-and-infrared overlay.

use tracing::warn;

use crate::constants::{DEPTH_FRAME_HEIGHT, DEPTH_FRAME_PIXELS, DEPTH_FRAME_WIDTH, RAMP_LEVELS};
use crate::errors::ResourceError;
use crate::gpu::DeviceResources;
use crate::panel::effect::RenderTextureEffect;
use crate::panel::texture::{PixelFormat, Texture};

/// Intensity lookup ramp as tightly packed RGBA bytes; brightness rises
/// with intensity, zero intensity renders black
pub fn intensity_ramp_data() -> Vec<u8> {
    let mut data = Vec::with_capacity(RAMP_LEVELS * 4);
    for i in 0..RAMP_LEVELS {
        let level = i as u8;
        data.extend_from_slice(&[level, level, level, 255]);
    }
    data
}

/// Turns raw infrared frames into a display-ready image texture
pub struct InfraredRenderer {
    source: Texture,
    image: Texture,
    // unlike the depth grey ramp this one ascends; the display gamma is
    // applied in the blit shader before the lookup
    ramp: Texture,
}

impl Default for InfraredRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl InfraredRenderer {
    pub fn new() -> Self {
        let ramp = Texture::new(RAMP_LEVELS as u32, 1, PixelFormat::Rgba8Unorm, false);
        if let Some(mut guard) = ramp.lock() {
            let (bytes, _) = guard.access_buffer();
            bytes[..RAMP_LEVELS * 4].copy_from_slice(&intensity_ramp_data());
        }
        Self {
            source: Texture::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                PixelFormat::R16Unorm,
                false,
            ),
            image: Texture::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                PixelFormat::Rgba8Unorm,
                true,
            ),
            ramp,
        }
    }

    pub fn attach_device(&self, resources: &DeviceResources) -> Result<(), ResourceError> {
        self.source.attach_device(resources)?;
        self.ramp.attach_device(resources)?;
        self.image.attach_device(resources)
    }

    pub fn detach_device(&self) {
        self.image.detach_device();
        self.ramp.detach_device();
        self.source.detach_device();
    }

    /// The colorized image; valid after [`InfraredRenderer::colorize`] ran
    /// on the current device
    pub fn image(&self) -> &Texture {
        &self.image
    }

    /// Commit one infrared frame into the source texture.
    ///
    /// Rejects (no-op) any buffer whose length differs from the fixed
    /// infrared frame size.
    pub fn update_frame_image(&self, samples: &[u16]) -> bool {
        if samples.len() != DEPTH_FRAME_PIXELS {
            warn!(
                samples = samples.len(),
                expected = DEPTH_FRAME_PIXELS,
                "Rejected infrared update with wrong sample count"
            );
            return false;
        }
        let Some(mut guard) = self.source.lock() else {
            return false;
        };
        let (bytes, pitch) = guard.access_buffer();
        for y in 0..DEPTH_FRAME_HEIGHT as usize {
            let row = &samples[y * DEPTH_FRAME_WIDTH as usize..(y + 1) * DEPTH_FRAME_WIDTH as usize];
            let dst = &mut bytes[y * pitch..y * pitch + row.len() * 2];
            dst.copy_from_slice(bytemuck::cast_slice(row));
        }
        true
    }

    /// Render the source through the intensity ramp into the image
    /// texture.
    ///
    /// Returns `false` (transient skip) while the effect or textures have
    /// no device backing.
    pub fn colorize(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        effect: &RenderTextureEffect,
    ) -> bool {
        let Some(target_view) = self.image.shader_view() else {
            return false;
        };
        let Some(ramp_view) = self.ramp.shader_view() else {
            return false;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("infrared_colorize_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        effect.blit(&mut pass, &self.source, Some(&ramp_view))
    }
}
