// SPDX-License-Identifier: GPL-3.0-only

//! GPU texture resource with locked write access
//!
//! Every texture keeps a CPU staging image next to the GPU texture. Writers
//! lock the staging image, fill it row by row honoring the returned pitch,
//! and the commit on unlock uploads staging to the GPU texture. The upload
//! is invisible to callers and is replayed when a device is re-attached
//! after device loss, so the "last committed" frame survives a rebuild.
//!
//! Writer access and render-time read access are serialized through one
//! reader/writer lock per texture: a draw holding a [`RenderLock`] blocks a
//! concurrent `lock()` from starting a write mid-render, while locks on
//! different textures never contend.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::errors::ResourceError;
use crate::gpu::DeviceResources;

/// Row pitch alignment of the staging image (matches GPU copy alignment)
pub const ROW_PITCH_ALIGNMENT: usize = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;

/// Pixel formats understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit normalized single channel (depth, infrared)
    R16Unorm,
    /// Two 32-bit floats per pixel (XY and UV tables)
    Rg32Float,
    /// 8-bit RGBA (ramps, render targets)
    Rgba8Unorm,
    /// Packed YUYV color; stored as one RGBA8 texel per horizontal pixel
    /// pair and unpacked in the shader
    Yuyv,
}

impl PixelFormat {
    /// Bytes per source pixel in the staging image
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::R16Unorm => 2,
            PixelFormat::Rg32Float => 8,
            PixelFormat::Rgba8Unorm => 4,
            PixelFormat::Yuyv => 2,
        }
    }

    /// The wgpu texture format backing this pixel format
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::R16Unorm => wgpu::TextureFormat::R16Unorm,
            PixelFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Yuyv => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    /// GPU texture width for a given source width (YUYV packs pixel pairs)
    pub fn texture_width(&self, width: u32) -> u32 {
        match self {
            PixelFormat::Yuyv => width / 2,
            _ => width,
        }
    }
}

struct StagingImage {
    bytes: Vec<u8>,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

/// A 2D image resource with a shader-visible view and locked CPU writes
pub struct Texture {
    width: u32,
    height: u32,
    format: PixelFormat,
    is_render_target: bool,
    row_pitch: usize,
    // lock order: staging before gpu, everywhere
    staging: RwLock<StagingImage>,
    gpu: Mutex<Option<GpuTexture>>,
}

fn align_row_pitch(tight: usize) -> usize {
    tight.div_ceil(ROW_PITCH_ALIGNMENT) * ROW_PITCH_ALIGNMENT
}

impl Texture {
    /// Create a texture resource.
    ///
    /// Render targets carry no staging image; they are written only by
    /// draw operations and `lock()` on them returns `None`.
    pub fn new(width: u32, height: u32, format: PixelFormat, is_render_target: bool) -> Self {
        let row_pitch = if is_render_target {
            0
        } else {
            align_row_pitch(width as usize * format.bytes_per_pixel())
        };
        let bytes = vec![0u8; row_pitch * height as usize];
        Self {
            width,
            height,
            format,
            is_render_target,
            row_pitch,
            staging: RwLock::new(StagingImage { bytes }),
            gpu: Mutex::new(None),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_render_target(&self) -> bool {
        self.is_render_target
    }

    /// Row pitch in bytes of the staging image
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Create the GPU texture and upload the last committed staging image.
    ///
    /// Called by the lifecycle manager on initial load and after device
    /// loss; safe to call again with a fresh device.
    pub fn attach_device(&self, resources: &DeviceResources) -> Result<(), ResourceError> {
        let staging = self
            .staging
            .read()
            .map_err(|_| ResourceError::AllocationFailed("staging lock poisoned".into()))?;

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if self.is_render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = resources.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("panel_texture"),
            size: wgpu::Extent3d {
                width: self.format.texture_width(self.width),
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format.texture_format(),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let gpu = GpuTexture {
            texture,
            view,
            device: Arc::clone(&resources.device),
            queue: Arc::clone(&resources.queue),
        };

        if !self.is_render_target {
            upload_staging(&gpu, &staging.bytes, self);
        }

        let mut slot = self.gpu.lock().expect("gpu slot lock poisoned");
        *slot = Some(gpu);
        Ok(())
    }

    /// Drop the GPU texture; the staging image stays committed
    pub fn detach_device(&self) {
        let mut slot = self.gpu.lock().expect("gpu slot lock poisoned");
        if slot.take().is_some() {
            debug!(
                width = self.width,
                height = self.height,
                "Released GPU texture"
            );
        }
    }

    /// Whether a GPU texture currently backs this resource
    pub fn has_device(&self) -> bool {
        self.gpu.lock().expect("gpu slot lock poisoned").is_some()
    }

    /// Shader-visible view of the texture, if a device is attached
    pub fn shader_view(&self) -> Option<wgpu::TextureView> {
        self.gpu
            .lock()
            .expect("gpu slot lock poisoned")
            .as_ref()
            .map(|g| g.view.clone())
    }

    /// Begin a bulk write session.
    ///
    /// Returns `None` for render targets. Blocks while another writer or a
    /// render lock holds the texture. The commit happens when the returned
    /// guard drops.
    pub fn lock(&self) -> Option<TextureWriteGuard<'_>> {
        if self.is_render_target {
            return None;
        }
        let staging = self.staging.write().expect("staging lock poisoned");
        Some(TextureWriteGuard {
            texture: self,
            staging,
        })
    }

    fn render_lock(&self) -> Option<RwLockReadGuard<'_, StagingImage>> {
        if self.is_render_target {
            // render targets are never lock-written, nothing to exclude
            return None;
        }
        Some(self.staging.read().expect("staging lock poisoned"))
    }

    /// Read the GPU texture contents back to CPU memory (tight rows).
    ///
    /// Copies through a staging buffer and waits for the map. Intended
    /// for verification and capture paths, not the per-frame loop.
    pub async fn read_back(&self) -> Result<Vec<u8>, String> {
        let (texture, device, queue) = {
            let slot = self
                .gpu
                .lock()
                .map_err(|_| "gpu slot lock poisoned".to_string())?;
            let gpu = slot.as_ref().ok_or("no device attached")?;
            (
                gpu.texture.clone(),
                Arc::clone(&gpu.device),
                Arc::clone(&gpu.queue),
            )
        };

        let texture_width = self.format.texture_width(self.width);
        let tight = self.width as usize * self.format.bytes_per_pixel();
        let padded = align_row_pitch(tight);
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture_readback"),
            size: (padded * self.height as usize) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture_readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded as u32),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: texture_width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| format!("device poll failed: {:?}", e))?;
        receiver
            .await
            .map_err(|_| "Failed to receive map result")?
            .map_err(|e| format!("Failed to map buffer: {:?}", e))?;

        let data = buffer_slice.get_mapped_range();
        let mut out = Vec::with_capacity(tight * self.height as usize);
        for row in 0..self.height as usize {
            out.extend_from_slice(&data[row * padded..row * padded + tight]);
        }
        drop(data);
        staging_buffer.unmap();
        Ok(out)
    }

    /// Snapshot of the committed staging bytes (tight rows, no pitch padding)
    pub fn committed_bytes(&self) -> Vec<u8> {
        let staging = self.staging.read().expect("staging lock poisoned");
        let tight = self.width as usize * self.format.bytes_per_pixel();
        let mut out = Vec::with_capacity(tight * self.height as usize);
        for y in 0..self.height as usize {
            let row = &staging.bytes[y * self.row_pitch..y * self.row_pitch + tight];
            out.extend_from_slice(row);
        }
        out
    }
}

fn upload_staging(gpu: &GpuTexture, bytes: &[u8], texture: &Texture) {
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &gpu.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(texture.row_pitch as u32),
            rows_per_image: Some(texture.height),
        },
        wgpu::Extent3d {
            width: texture.format.texture_width(texture.width),
            height: texture.height,
            depth_or_array_layers: 1,
        },
    );
}

/// Exclusive write session over a texture's staging image.
///
/// Commits to the GPU texture on drop. Access the bytes through
/// [`TextureWriteGuard::access_buffer`], which also returns the row pitch;
/// rows are padded, so writers must step by the pitch rather than the
/// tight width.
pub struct TextureWriteGuard<'a> {
    texture: &'a Texture,
    staging: RwLockWriteGuard<'a, StagingImage>,
}

impl TextureWriteGuard<'_> {
    /// Writable staging bytes and the row pitch in bytes
    pub fn access_buffer(&mut self) -> (&mut [u8], usize) {
        let pitch = self.texture.row_pitch;
        (&mut self.staging.bytes, pitch)
    }
}

impl Drop for TextureWriteGuard<'_> {
    fn drop(&mut self) {
        // commit: staging -> GPU texture, skipped when no device is attached
        let slot = self.texture.gpu.lock().expect("gpu slot lock poisoned");
        if let Some(gpu) = slot.as_ref() {
            upload_staging(gpu, &self.staging.bytes, self.texture);
        }
    }
}

/// RAII writer lock over an optional texture.
///
/// A `None` texture (or a render target) yields an inert guard instead of
/// a fault, mirroring the permissive contract of the drawing code.
pub struct TextureLock<'a> {
    guard: Option<TextureWriteGuard<'a>>,
}

impl<'a> TextureLock<'a> {
    pub fn new(texture: Option<&'a Texture>) -> Self {
        Self {
            guard: texture.and_then(|t| t.lock()),
        }
    }

    /// Writable bytes and row pitch, or `None` when the lock is inert
    pub fn access_buffer(&mut self) -> Option<(&mut [u8], usize)> {
        self.guard.as_mut().map(|g| g.access_buffer())
    }
}

/// RAII render-time lock over an optional texture.
///
/// Held for the duration of a draw that samples the texture; excludes
/// writers on the same texture but not renders or writes on other
/// textures. Render targets and `None` yield inert guards.
pub struct RenderLock<'a> {
    _guard: Option<RwLockReadGuard<'a, StagingImage>>,
}

impl<'a> RenderLock<'a> {
    pub fn new(texture: Option<&'a Texture>) -> Self {
        Self {
            _guard: texture.and_then(|t| t.render_lock()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_lock_fails_on_render_target() {
        let texture = Texture::new(16, 16, PixelFormat::Rgba8Unorm, true);
        assert!(texture.lock().is_none());
    }

    #[test]
    fn test_row_pitch_aligned() {
        let texture = Texture::new(512, 424, PixelFormat::R16Unorm, false);
        assert_eq!(texture.row_pitch() % ROW_PITCH_ALIGNMENT, 0);
        assert!(texture.row_pitch() >= 512 * 2);
    }

    #[test]
    fn test_write_read_round_trip_u16() {
        let texture = Texture::new(4, 2, PixelFormat::R16Unorm, false);
        {
            let mut guard = texture.lock().unwrap();
            let (bytes, pitch) = guard.access_buffer();
            for y in 0..2usize {
                for x in 0..4usize {
                    let value = (2000 + y * 4 + x) as u16;
                    let offset = y * pitch + x * 2;
                    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
        let committed = texture.committed_bytes();
        let first = u16::from_le_bytes([committed[0], committed[1]]);
        let last = u16::from_le_bytes([committed[14], committed[15]]);
        assert_eq!(first, 2000);
        assert_eq!(last, 2007);
    }

    #[test]
    fn test_writer_guards_mutually_exclusive_same_texture() {
        let texture = Arc::new(Texture::new(8, 8, PixelFormat::R16Unorm, false));
        let second_entered = Arc::new(AtomicBool::new(false));

        let guard = texture.lock().unwrap();
        let handle = {
            let texture = Arc::clone(&texture);
            let second_entered = Arc::clone(&second_entered);
            std::thread::spawn(move || {
                let _guard = texture.lock().unwrap();
                second_entered.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(
            !second_entered.load(Ordering::SeqCst),
            "second lock() must block until the first unlock"
        );
        drop(guard);
        handle.join().unwrap();
        assert!(second_entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_writer_guards_independent_across_textures() {
        let a = Texture::new(8, 8, PixelFormat::R16Unorm, false);
        let b = Texture::new(8, 8, PixelFormat::R16Unorm, false);
        let _guard_a = a.lock().unwrap();
        // must not block
        let guard_b = b.lock();
        assert!(guard_b.is_some());
    }

    #[test]
    fn test_render_lock_blocks_writer() {
        let texture = Arc::new(Texture::new(8, 8, PixelFormat::R16Unorm, false));
        let writer_entered = Arc::new(AtomicBool::new(false));

        let render = RenderLock::new(Some(&texture));
        let handle = {
            let texture = Arc::clone(&texture);
            let writer_entered = Arc::clone(&writer_entered);
            std::thread::spawn(move || {
                let _guard = texture.lock().unwrap();
                writer_entered.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!writer_entered.load(Ordering::SeqCst));
        drop(render);
        handle.join().unwrap();
    }

    #[test]
    fn test_null_locks_are_inert() {
        let mut lock = TextureLock::new(None);
        assert!(lock.access_buffer().is_none());
        let _render = RenderLock::new(None);
    }

    #[test]
    fn test_rejected_update_leaves_bytes_unchanged() {
        let texture = Texture::new(4, 1, PixelFormat::R16Unorm, false);
        {
            let mut guard = texture.lock().unwrap();
            let (bytes, _) = guard.access_buffer();
            bytes[0] = 0xAA;
        }
        let before = texture.committed_bytes();
        // a failed lock on a render target is the reject path; committed
        // bytes of this texture are untouched by somebody else's reject
        let rt = Texture::new(4, 1, PixelFormat::Rgba8Unorm, true);
        assert!(rt.lock().is_none());
        assert_eq!(texture.committed_bytes(), before);
    }
}
