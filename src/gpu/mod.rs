// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for the rendering pipelines.
//!
//! This module provides helpers for creating the wgpu device and queue
//! shared by all textures, meshes, and effects of one panel.

use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::ResourceError;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

/// GPU device, queue, and adapter info shared by one panel's resources.
///
/// The device and queue handles are reference counted; textures and
/// effects keep their own clones so the panel can drop this struct on
/// device loss without invalidating in-flight work.
#[derive(Clone)]
pub struct DeviceResources {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

/// Create a wgpu device and queue for panel rendering.
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
///
/// # Returns
///
/// The shared [`DeviceResources`] or a fatal [`ResourceError`]
pub async fn create_render_device(label: &str) -> Result<DeviceResources, ResourceError> {
    info!(label = label, "Creating GPU device for panel rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| ResourceError::NoAdapter(format!("{}", e)))?;

    let adapter_info = adapter.get_info();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for rendering"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            // depth and infrared frames upload as R16Unorm textures
            required_features: wgpu::Features::TEXTURE_FORMAT_16BIT_NORM,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| ResourceError::DeviceCreationFailed(format!("{}", e)))?;

    debug!(backend = ?adapter_info.backend, "GPU device created");

    Ok(DeviceResources {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info: GpuDeviceInfo {
            adapter_name: adapter_info.name.clone(),
            backend: adapter_info.backend,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_render_device() {
        // This test requires a GPU, so it may be skipped in CI
        match pollster::block_on(create_render_device("test_device")) {
            Ok(resources) => {
                assert!(!resources.info.adapter_name.is_empty());
                drop(resources);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
