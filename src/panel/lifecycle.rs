// SPDX-License-Identifier: GPL-3.0-only

//! Device and size dependent resource lifecycle
//!
//! Tracks the panel through {Uninitialized, DeviceReady, SizeReady,
//! DeviceLost}. Device creation and size changes are independent: a size
//! change recreates only the output target, depth buffer, and projection,
//! while device loss tears everything down in dependency order (views,
//! then textures, then the device) and the panel rebuilds from scratch.
//! Nothing renders until the state reaches `SizeReady`.

use glam::Mat4;
use tracing::{info, warn};

use crate::constants::{RENDER_FAR, RENDER_NEAR};
use crate::errors::ResourceError;
use crate::gpu::{DeviceResources, create_render_device};
use crate::panel::effect::DEPTH_BUFFER_FORMAT;
use crate::panel::texture::{PixelFormat, Texture};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    DeviceReady,
    SizeReady,
    DeviceLost,
}

/// Owns the device handle and every size-dependent resource of one panel
pub struct PanelResources {
    state: LifecycleState,
    device: Option<DeviceResources>,
    output: Option<Texture>,
    depth_buffer: Option<wgpu::TextureView>,
    logical_width: f32,
    logical_height: f32,
    composition_scale: f32,
    projection: Mat4,
    fov_y: f32,
}

impl PanelResources {
    pub fn new(fov_y: f32) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            device: None,
            output: None,
            depth_buffer: None,
            logical_width: 0.0,
            logical_height: 0.0,
            composition_scale: 1.0,
            projection: Mat4::IDENTITY,
            fov_y,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn device(&self) -> Option<&DeviceResources> {
        self.device.as_ref()
    }

    /// Output render target; present once `SizeReady`
    pub fn output(&self) -> Option<&Texture> {
        self.output.as_ref()
    }

    pub fn depth_buffer(&self) -> Option<&wgpu::TextureView> {
        self.depth_buffer.as_ref()
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Render target size in physical pixels
    pub fn render_size(&self) -> (u32, u32) {
        (
            ((self.logical_width * self.composition_scale) as u32).max(1),
            ((self.logical_height * self.composition_scale) as u32).max(1),
        )
    }

    pub fn is_size_ready(&self) -> bool {
        self.state == LifecycleState::SizeReady
    }

    /// Create the GPU device; size-dependent resources follow separately.
    ///
    /// Returns a clone of the device handles so the caller can attach its
    /// own device-dependent resources.
    pub async fn create_device_resources(&mut self) -> Result<DeviceResources, ResourceError> {
        let resources = create_render_device("depth_panel").await?;
        self.device = Some(resources.clone());
        self.state = LifecycleState::DeviceReady;
        info!(adapter = %resources.info.adapter_name, "Panel device resources created");
        if self.logical_width > 0.0 && self.logical_height > 0.0 {
            self.create_size_dependent_resources()?;
        }
        Ok(resources)
    }

    /// Record a new logical size and composition scale, recreating the
    /// size-dependent resources when a device exists.
    ///
    /// Device-level objects (textures, effects, buffers owned by the
    /// panel) are untouched.
    pub fn set_logical_size(
        &mut self,
        width: f32,
        height: f32,
        composition_scale: f32,
    ) -> Result<(), ResourceError> {
        self.logical_width = width.max(0.0);
        self.logical_height = height.max(0.0);
        self.composition_scale = if composition_scale > 0.0 {
            composition_scale
        } else {
            1.0
        };
        if self.device.is_some() && self.logical_width > 0.0 && self.logical_height > 0.0 {
            self.create_size_dependent_resources()?;
        }
        Ok(())
    }

    /// Build the output target, depth buffer, and projection for the
    /// current size
    pub fn create_size_dependent_resources(&mut self) -> Result<(), ResourceError> {
        let Some(device) = self.device.as_ref() else {
            return Err(ResourceError::AllocationFailed(
                "size-dependent resources require a device".into(),
            ));
        };
        let (width, height) = self.render_size();

        let output = Texture::new(width, height, PixelFormat::Rgba8Unorm, true);
        output.attach_device(device)?;

        let depth_texture = device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("panel_depth_buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_BUFFER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.projection = Mat4::perspective_lh(
            self.fov_y,
            width as f32 / height as f32,
            RENDER_NEAR,
            RENDER_FAR,
        );

        self.output = Some(output);
        self.depth_buffer = Some(depth_view);
        self.state = LifecycleState::SizeReady;
        info!(width = width, height = height, "Size-dependent resources created");
        Ok(())
    }

    /// Tear down everything device-dependent after a device loss.
    ///
    /// Views drop before textures, textures before the device. The panel
    /// must release its own device-dependent objects alongside and call
    /// [`PanelResources::create_device_resources`] to rebuild.
    pub fn handle_device_loss(&mut self) {
        warn!("GPU device lost, releasing device-dependent resources");
        self.depth_buffer = None;
        if let Some(output) = self.output.take() {
            output.detach_device();
        }
        self.device = None;
        self.state = LifecycleState::DeviceLost;
    }
}
