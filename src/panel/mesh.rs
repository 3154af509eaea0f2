// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-topology mesh buffer for the depth grid
//!
//! One vertex per depth pixel (2D pixel coordinates only; the 3D position
//! is computed in the vertex stage from the depth and XY textures) and a
//! static index buffer connecting each 2x2 pixel block into two triangles.
//! Vertex and index staging live on the CPU; commits upload to the GPU
//! buffers when a device is attached, and re-attach replays the last
//! committed contents.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::ResourceError;
use crate::gpu::DeviceResources;

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    queue: Arc<wgpu::Queue>,
}

/// Vertex/index buffer pair with a topology fixed at initialization
pub struct Mesh {
    num_vertices: u32,
    vertex_stride: usize,
    num_indices: u32,
    use_16bit_indices: bool,
    vertex_staging: Mutex<Vec<u8>>,
    index_staging: Mutex<Vec<u8>>,
    gpu: Mutex<Option<GpuMesh>>,
}

impl Mesh {
    /// Allocate staging for `num_vertices` of `vertex_stride` bytes and
    /// `num_indices` indices (16- or 32-bit, fixed for the mesh lifetime;
    /// zero indices means the mesh only draws unindexed).
    pub fn new(
        num_vertices: u32,
        vertex_stride: usize,
        num_indices: u32,
        use_16bit_indices: bool,
    ) -> Self {
        let index_size = if use_16bit_indices { 2 } else { 4 };
        Self {
            num_vertices,
            vertex_stride,
            num_indices,
            use_16bit_indices,
            vertex_staging: Mutex::new(vec![0u8; num_vertices as usize * vertex_stride]),
            index_staging: Mutex::new(vec![0u8; num_indices as usize * index_size]),
            gpu: Mutex::new(None),
        }
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    pub fn vertex_stride(&self) -> usize {
        self.vertex_stride
    }

    fn index_format(&self) -> wgpu::IndexFormat {
        if self.use_16bit_indices {
            wgpu::IndexFormat::Uint16
        } else {
            wgpu::IndexFormat::Uint32
        }
    }

    /// Create GPU buffers and upload the committed staging contents
    pub fn attach_device(&self, resources: &DeviceResources) -> Result<(), ResourceError> {
        let vertices = self
            .vertex_staging
            .lock()
            .map_err(|_| ResourceError::AllocationFailed("vertex staging poisoned".into()))?;
        let indices = self
            .index_staging
            .lock()
            .map_err(|_| ResourceError::AllocationFailed("index staging poisoned".into()))?;

        let vertex_buffer = resources.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh_vertex_buffer"),
            size: vertices.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        resources.queue.write_buffer(&vertex_buffer, 0, &vertices);

        let index_buffer = if self.num_indices > 0 {
            let buffer = resources.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mesh_index_buffer"),
                size: indices.len() as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            resources.queue.write_buffer(&buffer, 0, &indices);
            Some(buffer)
        } else {
            None
        };

        let mut slot = self.gpu.lock().expect("mesh gpu lock poisoned");
        *slot = Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            queue: Arc::clone(&resources.queue),
        });
        Ok(())
    }

    /// Drop the GPU buffers; staging stays committed
    pub fn detach_device(&self) {
        let mut slot = self.gpu.lock().expect("mesh gpu lock poisoned");
        *slot = None;
    }

    pub fn has_device(&self) -> bool {
        self.gpu.lock().expect("mesh gpu lock poisoned").is_some()
    }

    /// Lock the vertex staging for bulk writes; commits on guard drop
    pub fn lock_vertex_buffer(&self) -> Option<MeshWriteGuard<'_>> {
        let staging = self.vertex_staging.lock().ok()?;
        Some(MeshWriteGuard {
            mesh: self,
            staging,
            is_index: false,
        })
    }

    /// Lock the index staging; `None` when the mesh has no index buffer
    pub fn lock_index_buffer(&self) -> Option<MeshWriteGuard<'_>> {
        if self.num_indices == 0 {
            return None;
        }
        let staging = self.index_staging.lock().ok()?;
        Some(MeshWriteGuard {
            mesh: self,
            staging,
            is_index: true,
        })
    }

    /// Bind buffers and draw as a triangle list.
    ///
    /// The currently bound pipeline must use triangle-list topology; the
    /// effect that applied it selects the matching pipeline variant.
    /// Returns `false` when no GPU buffers exist (transient skip).
    pub fn render_triangle_list(&self, pass: &mut wgpu::RenderPass<'_>, use_index: bool) -> bool {
        self.draw(pass, use_index)
    }

    /// Bind buffers and draw as a line list (same contract as triangles)
    pub fn render_line_list(&self, pass: &mut wgpu::RenderPass<'_>, use_index: bool) -> bool {
        self.draw(pass, use_index)
    }

    /// Bind the vertex buffer and draw every vertex as a point
    pub fn render_point_list(&self, pass: &mut wgpu::RenderPass<'_>) -> bool {
        self.draw(pass, false)
    }

    /// Draw one camera-facing quad per vertex.
    ///
    /// The vertex buffer is bound as per-instance data; the bound sprite
    /// pipeline expands four corner vertices per instance.
    pub fn render_point_sprites(&self, pass: &mut wgpu::RenderPass<'_>) -> bool {
        let slot = self.gpu.lock().expect("mesh gpu lock poisoned");
        let Some(gpu) = slot.as_ref() else {
            return false;
        };
        pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
        pass.draw(0..4, 0..self.num_vertices);
        true
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, use_index: bool) -> bool {
        let slot = self.gpu.lock().expect("mesh gpu lock poisoned");
        let Some(gpu) = slot.as_ref() else {
            return false;
        };
        pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
        if use_index {
            let Some(index_buffer) = gpu.index_buffer.as_ref() else {
                return false;
            };
            pass.set_index_buffer(index_buffer.slice(..), self.index_format());
            pass.draw_indexed(0..self.num_indices, 0, 0..1);
        } else {
            pass.draw(0..self.num_vertices, 0..1);
        }
        true
    }
}

/// Bulk write session over vertex or index staging; commits on drop
pub struct MeshWriteGuard<'a> {
    mesh: &'a Mesh,
    staging: MutexGuard<'a, Vec<u8>>,
    is_index: bool,
}

impl MeshWriteGuard<'_> {
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    /// View the staging as mutable f32 values (vertex data)
    pub fn as_f32_mut(&mut self) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.staging)
    }

    /// View the staging as mutable u32 values (32-bit index data)
    pub fn as_u32_mut(&mut self) -> &mut [u32] {
        bytemuck::cast_slice_mut(&mut self.staging)
    }
}

impl Drop for MeshWriteGuard<'_> {
    fn drop(&mut self) {
        let slot = self.mesh.gpu.lock().expect("mesh gpu lock poisoned");
        if let Some(gpu) = slot.as_ref() {
            let buffer = if self.is_index {
                match gpu.index_buffer.as_ref() {
                    Some(b) => b,
                    None => return,
                }
            } else {
                &gpu.vertex_buffer
            };
            gpu.queue.write_buffer(buffer, 0, &self.staging);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_indices_lock_fails() {
        let mesh = Mesh::new(16, 8, 0, false);
        assert!(mesh.lock_index_buffer().is_none());
        assert!(mesh.lock_vertex_buffer().is_some());
    }

    #[test]
    fn test_vertex_staging_sized_by_stride() {
        let mesh = Mesh::new(4, 8, 6, false);
        let mut guard = mesh.lock_vertex_buffer().unwrap();
        assert_eq!(guard.bytes_mut().len(), 4 * 8);
        assert_eq!(guard.as_f32_mut().len(), 8);
    }

    #[test]
    fn test_index_staging_element_size() {
        let mesh32 = Mesh::new(4, 8, 6, false);
        assert_eq!(mesh32.lock_index_buffer().unwrap().bytes_mut().len(), 24);
        let mesh16 = Mesh::new(4, 8, 6, true);
        assert_eq!(mesh16.lock_index_buffer().unwrap().bytes_mut().len(), 12);
    }
}
