// SPDX-License-Identifier: GPL-3.0-only

//! Depth map panel controller
//!
//! Owns the frame textures, the fixed-topology mesh, the effect set, and
//! the per-panel lifecycle state, and drives the update-then-render cycle.
//! Updates pull the latest frames from the attached sensor readers and
//! commit them through writer locks; renders map the panel mode to a
//! vertex/ramp pair and dispatch to the mesh or blit path. Everything
//! frame-related stays valid without a device, so a rebuilt device picks
//! up exactly the last committed data.

use std::sync::Arc;

use glam::Mat4;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::PanelConfig;
use crate::constants::{
    COLOR_FRAME_HEIGHT, COLOR_FRAME_WIDTH, DEPTH_FRAME_HEIGHT, DEPTH_FRAME_HFOV,
    DEPTH_FRAME_PIXELS, DEPTH_FRAME_VFOV, DEPTH_FRAME_WIDTH, DEPTH_INVALID_MM,
};
use crate::errors::PanelResult;
use crate::panel::effect::{
    DepthMeshEffect, DepthPointEffect, LightingParams, RampMode, RenderTextureEffect, VertexMode,
};
use crate::panel::infrared::InfraredRenderer;
use crate::panel::lifecycle::{LifecycleState, PanelResources};
use crate::panel::mesh::Mesh;
use crate::panel::texture::{PixelFormat, RenderLock, Texture};
use crate::sensor::{
    ColorFrame, ColorFrameReader, ColorFrameSource, CoordinateMapper, DepthFrameReader,
    DepthFrameSource, InfraredFrameReader, InfraredFrameSource,
};

/// Display mode of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelMode {
    /// Lit depth surface
    #[default]
    Depth,
    /// Depth surface textured with registered color
    ColorRegistration,
    /// Depth surface colorized through the hue ramp
    DepthRamp,
    /// Colorized infrared image
    InfraredOnly,
    /// Raw color stream
    ColorOnly,
    /// Infrared full frame with color picture-in-picture
    ColorAndInfraredComposite,
}

/// Panel property that changed, sent on the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelProperty {
    PanelMode,
    DepthSource,
    InfraredSource,
    ColorSource,
    CoordinateMapper,
}

/// Pixel-coordinate vertex data for a width x height grid, two floats per
/// vertex
pub fn grid_vertex_data(width: u32, height: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity((width * height * 2) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(x as f32);
            data.push(y as f32);
        }
    }
    data
}

/// Index data connecting each 2x2 pixel block into two triangles
pub fn grid_index_data(width: u32, height: u32) -> Vec<u32> {
    let mut data = Vec::with_capacity((6 * (width - 1) * (height - 1)) as usize);
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let i0 = y * width + x;
            let i1 = i0 + 1;
            let i2 = i0 + width + 1;
            let i3 = i0 + width;
            data.extend_from_slice(&[i0, i1, i2, i0, i2, i3]);
        }
    }
    data
}

/// Pinhole unprojection table from symmetric field-of-view constants.
///
/// Used until a coordinate mapper supplies calibrated intrinsics; the
/// center pixel unprojects to a ray pointing straight ahead.
pub fn default_xy_table(width: u32, height: u32, hfov: f32, vfov: f32) -> Vec<[f32; 2]> {
    let half_w = width as f32 / 2.0;
    let half_h = height as f32 / 2.0;
    let tan_h = (hfov / 2.0).tan();
    let tan_v = (vfov / 2.0).tan();
    let mut table = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            table.push([
                ((x as f32 - half_w + 0.5) / half_w) * tan_h,
                ((half_h - y as f32 - 0.5) / half_h) * tan_v,
            ]);
        }
    }
    table
}

/// Renders sensor depth/infrared/color streams in a selectable mode
pub struct DepthMapPanel {
    config: PanelConfig,
    resources: PanelResources,

    mode: PanelMode,
    vertex_mode: VertexMode,
    ramp_mode: RampMode,
    lighting: LightingParams,

    depth_texture: Texture,
    xy_texture: Texture,
    uv_texture: Texture,
    color_texture: Texture,
    mesh: Mesh,
    mesh_effect: DepthMeshEffect,
    point_effect: DepthPointEffect,
    blit_effect: RenderTextureEffect,
    ir_renderer: InfraredRenderer,

    // per-tick scratch, reused to avoid per-frame allocation
    uv_scratch: Vec<[f32; 2]>,

    mapper: Option<Arc<dyn CoordinateMapper>>,
    mapper_generation: u64,
    mapper_changed: bool,

    depth_source: Option<Arc<dyn DepthFrameSource>>,
    depth_reader: Option<Box<dyn DepthFrameReader>>,
    ir_source: Option<Arc<dyn InfraredFrameSource>>,
    ir_reader: Option<Box<dyn InfraredFrameReader>>,
    color_source: Option<Arc<dyn ColorFrameSource>>,
    color_reader: Option<Box<dyn ColorFrameReader>>,

    events: broadcast::Sender<PanelProperty>,
}

impl DepthMapPanel {
    pub fn new(config: PanelConfig) -> Self {
        let config = config.sanitized();

        let mesh = Mesh::new(
            DEPTH_FRAME_WIDTH * DEPTH_FRAME_HEIGHT,
            8,
            6 * (DEPTH_FRAME_WIDTH - 1) * (DEPTH_FRAME_HEIGHT - 1),
            false,
        );
        if let Some(mut guard) = mesh.lock_vertex_buffer() {
            guard
                .as_f32_mut()
                .copy_from_slice(&grid_vertex_data(DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT));
        }
        if let Some(mut guard) = mesh.lock_index_buffer() {
            guard
                .as_u32_mut()
                .copy_from_slice(&grid_index_data(DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT));
        }

        let (events, _) = broadcast::channel(16);
        let panel = Self {
            resources: PanelResources::new(config.fov_y),
            mode: PanelMode::Depth,
            vertex_mode: VertexMode::SurfaceWithNormal,
            ramp_mode: RampMode::None,
            lighting: LightingParams::default(),
            depth_texture: Texture::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                PixelFormat::R16Unorm,
                false,
            ),
            xy_texture: Texture::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                PixelFormat::Rg32Float,
                false,
            ),
            uv_texture: Texture::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                PixelFormat::Rg32Float,
                false,
            ),
            color_texture: Texture::new(
                COLOR_FRAME_WIDTH,
                COLOR_FRAME_HEIGHT,
                PixelFormat::Yuyv,
                false,
            ),
            mesh,
            mesh_effect: DepthMeshEffect::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                config.depth_min_mm,
                config.depth_max_mm,
                config.point_sprite_size_mm,
            ),
            point_effect: DepthPointEffect::new(
                DEPTH_FRAME_WIDTH,
                DEPTH_FRAME_HEIGHT,
                config.depth_min_mm,
                config.depth_max_mm,
            ),
            blit_effect: RenderTextureEffect::new(),
            ir_renderer: InfraredRenderer::new(),
            uv_scratch: vec![[0.0; 2]; DEPTH_FRAME_PIXELS],
            mapper: None,
            mapper_generation: 0,
            mapper_changed: false,
            depth_source: None,
            depth_reader: None,
            ir_source: None,
            ir_reader: None,
            color_source: None,
            color_reader: None,
            events,
            config,
        };

        panel.update_xy_table(&default_xy_table(
            DEPTH_FRAME_WIDTH,
            DEPTH_FRAME_HEIGHT,
            DEPTH_FRAME_HFOV,
            DEPTH_FRAME_VFOV,
        ));
        panel
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn panel_mode(&self) -> PanelMode {
        self.mode
    }

    pub fn vertex_mode(&self) -> VertexMode {
        self.vertex_mode
    }

    pub fn ramp_mode(&self) -> RampMode {
        self.ramp_mode
    }

    pub fn depth_texture(&self) -> &Texture {
        &self.depth_texture
    }

    pub fn xy_texture(&self) -> &Texture {
        &self.xy_texture
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.resources.state()
    }

    /// Notification channel for property changes
    pub fn subscribe(&self) -> broadcast::Receiver<PanelProperty> {
        self.events.subscribe()
    }

    fn notify(&self, property: PanelProperty) {
        // no receivers is fine
        let _ = self.events.send(property);
    }

    /// Select how the depth grid is expanded and colorized.
    ///
    /// UV-mapped surface texturing and ramp colorization are mutually
    /// exclusive; that combination is rejected without changing state.
    pub fn set_mode(&mut self, vertex_mode: VertexMode, ramp_mode: RampMode) -> bool {
        if vertex_mode == VertexMode::SurfaceWithUv && ramp_mode != RampMode::None {
            debug_assert!(false, "UV surface mode cannot use a ramp");
            warn!(?vertex_mode, ?ramp_mode, "Rejected invalid mode combination");
            return false;
        }
        self.vertex_mode = vertex_mode;
        self.ramp_mode = ramp_mode;
        true
    }

    pub fn set_panel_mode(&mut self, mode: PanelMode) {
        self.mode = mode;
        match mode {
            PanelMode::Depth => self.set_mode(VertexMode::SurfaceWithNormal, RampMode::None),
            PanelMode::ColorRegistration => self.set_mode(VertexMode::SurfaceWithUv, RampMode::None),
            PanelMode::DepthRamp => self.set_mode(VertexMode::SurfaceWithNormal, RampMode::Color),
            // blit modes draw without the mesh; vertex/ramp stay put
            _ => true,
        };
        debug!(?mode, "Panel mode changed");
        self.notify(PanelProperty::PanelMode);
    }

    pub fn set_depth_source(&mut self, source: Option<Arc<dyn DepthFrameSource>>) {
        self.depth_reader = source.as_ref().map(|s| s.open_reader());
        self.depth_source = source;
        self.notify(PanelProperty::DepthSource);
    }

    pub fn set_infrared_source(&mut self, source: Option<Arc<dyn InfraredFrameSource>>) {
        self.ir_reader = source.as_ref().map(|s| s.open_reader());
        self.ir_source = source;
        self.notify(PanelProperty::InfraredSource);
    }

    pub fn set_color_source(&mut self, source: Option<Arc<dyn ColorFrameSource>>) {
        self.color_reader = source.as_ref().map(|s| s.open_reader());
        self.color_source = source;
        self.notify(PanelProperty::ColorSource);
    }

    /// Attach the coordinate mapper; the XY table refreshes on the next
    /// update tick rather than immediately
    pub fn set_coordinate_mapper(&mut self, mapper: Option<Arc<dyn CoordinateMapper>>) {
        self.mapper_generation = mapper.as_ref().map_or(0, |m| m.mapping_generation());
        self.mapper_changed = mapper.is_some();
        self.mapper = mapper;
        self.notify(PanelProperty::CoordinateMapper);
    }

    pub fn set_logical_size(
        &mut self,
        width: f32,
        height: f32,
        composition_scale: f32,
    ) -> PanelResult<()> {
        self.resources
            .set_logical_size(width, height, composition_scale)?;
        Ok(())
    }

    /// Create the device and every device-dependent resource.
    ///
    /// Also the rebuild path after device loss; committed frame data and
    /// mesh topology replay onto the new device.
    pub async fn create_device_resources(&mut self) -> PanelResult<()> {
        let device = self.resources.create_device_resources().await?;
        self.depth_texture.attach_device(&device)?;
        self.xy_texture.attach_device(&device)?;
        self.uv_texture.attach_device(&device)?;
        self.color_texture.attach_device(&device)?;
        self.mesh.attach_device(&device)?;
        self.ir_renderer.attach_device(&device)?;
        self.mesh_effect.initialize(&device).await?;
        self.point_effect.initialize(&device).await?;
        self.blit_effect.initialize(&device).await?;
        info!("Panel device resources ready");
        Ok(())
    }

    /// Release every device-dependent object after a loss signal
    pub fn notify_device_lost(&mut self) {
        self.mesh_effect.release();
        self.point_effect.release();
        self.blit_effect.release();
        self.mesh.detach_device();
        self.ir_renderer.detach_device();
        self.depth_texture.detach_device();
        self.xy_texture.detach_device();
        self.uv_texture.detach_device();
        self.color_texture.detach_device();
        self.resources.handle_device_loss();
    }

    /// Commit one depth frame.
    ///
    /// Rejects (no-op) a sample count other than the fixed frame size,
    /// and any depth-only update while in XYZ point mode, which expects
    /// positions through [`DepthMapPanel::update_data_xyz`].
    pub fn update_data(&self, samples: &[u16]) -> bool {
        if samples.len() != DEPTH_FRAME_PIXELS {
            warn!(
                samples = samples.len(),
                expected = DEPTH_FRAME_PIXELS,
                "Rejected depth update with wrong sample count"
            );
            return false;
        }
        if self.vertex_mode == VertexMode::PointXyz {
            warn!("Rejected depth-only update in XYZ point mode");
            return false;
        }
        self.write_depth(samples)
    }

    /// Commit explicit camera-space positions.
    ///
    /// Depth goes to the depth texture; the XY table entries become
    /// (x/z, -y/z) so the vertex stage reconstructs the given position.
    /// Rejected (no-op) outside XYZ point mode, which is the only mode
    /// reading the table with these semantics.
    pub fn update_data_xyz(&self, x: &[f32], y: &[f32], z: &[u16]) -> bool {
        if x.len() != DEPTH_FRAME_PIXELS
            || y.len() != DEPTH_FRAME_PIXELS
            || z.len() != DEPTH_FRAME_PIXELS
        {
            warn!("Rejected XYZ update with wrong sample count");
            return false;
        }
        if self.vertex_mode != VertexMode::PointXyz {
            warn!("Rejected XYZ update outside XYZ point mode");
            return false;
        }
        if !self.write_depth(z) {
            return false;
        }
        let Some(mut guard) = self.xy_texture.lock() else {
            return false;
        };
        let (bytes, pitch) = guard.access_buffer();
        let width = DEPTH_FRAME_WIDTH as usize;
        for row in 0..DEPTH_FRAME_HEIGHT as usize {
            let dst: &mut [f32] =
                bytemuck::cast_slice_mut(&mut bytes[row * pitch..row * pitch + width * 8]);
            for col in 0..width {
                let i = row * width + col;
                if z[i] == DEPTH_INVALID_MM {
                    dst[col * 2] = 0.0;
                    dst[col * 2 + 1] = 0.0;
                } else {
                    let depth = z[i] as f32;
                    dst[col * 2] = x[i] / depth;
                    dst[col * 2 + 1] = -y[i] / depth;
                }
            }
        }
        true
    }

    /// Replace the XY unprojection table (fixed frame size contract)
    pub fn update_xy_table(&self, table: &[[f32; 2]]) -> bool {
        write_table(&self.xy_texture, table)
    }

    /// Replace the depth-to-color correspondence table (fixed frame size
    /// contract)
    pub fn update_uv_table(&self, table: &[[f32; 2]]) -> bool {
        write_table(&self.uv_texture, table)
    }

    fn write_depth(&self, samples: &[u16]) -> bool {
        let Some(mut guard) = self.depth_texture.lock() else {
            return false;
        };
        let (bytes, pitch) = guard.access_buffer();
        let width = DEPTH_FRAME_WIDTH as usize;
        for row in 0..DEPTH_FRAME_HEIGHT as usize {
            let src = &samples[row * width..(row + 1) * width];
            bytes[row * pitch..row * pitch + width * 2]
                .copy_from_slice(bytemuck::cast_slice(src));
        }
        true
    }

    fn update_color(&self, frame: &ColorFrame) -> bool {
        let description = frame.description();
        if description.width != COLOR_FRAME_WIDTH || description.height != COLOR_FRAME_HEIGHT {
            warn!(
                width = description.width,
                height = description.height,
                "Rejected color frame with unexpected dimensions"
            );
            return false;
        }
        let bytes = frame.lock_raw_image_buffer();
        let tight = COLOR_FRAME_WIDTH as usize * 2;
        if bytes.len() != tight * COLOR_FRAME_HEIGHT as usize {
            warn!(bytes = bytes.len(), "Rejected color frame with short buffer");
            return false;
        }
        let Some(mut guard) = self.color_texture.lock() else {
            return false;
        };
        let (dst, pitch) = guard.access_buffer();
        for row in 0..COLOR_FRAME_HEIGHT as usize {
            dst[row * pitch..row * pitch + tight]
                .copy_from_slice(&bytes[row * tight..(row + 1) * tight]);
        }
        true
    }

    /// One update tick: refresh the XY table if the mapper moved, then
    /// pull the latest frames the current mode needs
    pub fn update(&mut self) {
        if let Some(mapper) = self.mapper.as_ref() {
            let generation = mapper.mapping_generation();
            if generation != self.mapper_generation {
                self.mapper_generation = generation;
                self.mapper_changed = true;
            }
            if self.mapper_changed {
                let table = mapper.depth_frame_to_camera_space_table();
                if self.update_xy_table(&table) {
                    debug!(generation, "XY table refreshed from coordinate mapper");
                }
                self.mapper_changed = false;
            }
        }

        // ramp-only display needs no color or infrared pull
        if self.mode != PanelMode::DepthRamp {
            let color = self.color_reader.as_mut().and_then(|r| r.acquire_latest_frame());
            if let Some(frame) = color {
                self.update_color(&frame);
            }
            let infrared = self.ir_reader.as_mut().and_then(|r| r.acquire_latest_frame());
            if let Some(frame) = infrared {
                self.ir_renderer.update_frame_image(frame.lock_image_buffer());
            }
        }

        let depth = self.depth_reader.as_mut().and_then(|r| r.acquire_latest_frame());
        if let Some(frame) = depth {
            let samples = frame.samples();
            self.update_data(samples);
            if self.mode == PanelMode::ColorRegistration {
                if let Some(mapper) = self.mapper.as_ref() {
                    let mut uv = std::mem::take(&mut self.uv_scratch);
                    mapper.map_depth_frame_to_color_space(samples, &mut uv);
                    self.update_uv_table(&uv);
                    self.uv_scratch = uv;
                }
            }
        }
    }

    /// Render one frame into the panel output.
    ///
    /// `Ok(false)` is a transient skip (no device, size not ready, or an
    /// effect still loading); the frame is simply dropped.
    pub fn render(&mut self) -> PanelResult<bool> {
        if !self.resources.is_size_ready() {
            return Ok(false);
        }
        let Some(device) = self.resources.device() else {
            return Ok(false);
        };
        let Some(output_view) = self.resources.output().and_then(|o| o.shader_view()) else {
            return Ok(false);
        };
        let Some(depth_view) = self.resources.depth_buffer().cloned() else {
            return Ok(false);
        };

        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("panel_render"),
            });

        let drew = match self.mode {
            PanelMode::Depth => {
                self.draw_mesh(&mut encoder, &output_view, &depth_view, Some(&self.lighting), None)
            }
            PanelMode::ColorRegistration => self.draw_mesh(
                &mut encoder,
                &output_view,
                &depth_view,
                None,
                Some(&self.color_texture),
            ),
            PanelMode::DepthRamp => {
                self.draw_mesh(&mut encoder, &output_view, &depth_view, None, None)
            }
            PanelMode::InfraredOnly => {
                let colorized = self.ir_renderer.colorize(&mut encoder, &self.blit_effect);
                colorized
                    && self.blit(&mut encoder, &output_view, self.ir_renderer.image(), None, true)
            }
            PanelMode::ColorOnly => {
                self.blit(&mut encoder, &output_view, &self.color_texture, None, true)
            }
            PanelMode::ColorAndInfraredComposite => {
                let colorized = self.ir_renderer.colorize(&mut encoder, &self.blit_effect);
                let base = colorized
                    && self.blit(&mut encoder, &output_view, self.ir_renderer.image(), None, true);
                if base {
                    let (width, height) = self.resources.render_size();
                    let viewport = (
                        width as f32 / 2.0,
                        height as f32 / 2.0,
                        width as f32 / 2.0,
                        height as f32 / 2.0,
                    );
                    self.blit(
                        &mut encoder,
                        &output_view,
                        &self.color_texture,
                        Some(viewport),
                        false,
                    );
                }
                base
            }
        };

        device.queue.submit(Some(encoder.finish()));
        Ok(drew)
    }

    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: self.config.clear_color[0] as f64,
            g: self.config.clear_color[1] as f64,
            b: self.config.clear_color[2] as f64,
            a: self.config.clear_color[3] as f64,
        }
    }

    fn draw_mesh(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        lighting: Option<&LightingParams>,
        surface: Option<&Texture>,
    ) -> bool {
        // hold off writers on every sampled texture for the draw duration
        let _depth_guard = RenderLock::new(Some(&self.depth_texture));
        let _xy_guard = RenderLock::new(Some(&self.xy_texture));
        let _uv_guard = RenderLock::new(Some(&self.uv_texture));
        let _surface_guard = RenderLock::new(surface);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth_mesh_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        // plain point modes have their own effect; surfaces and sprites
        // share the mesh effect
        let applied = if self.vertex_mode.is_surface() || self.vertex_mode.is_sprite() {
            self.mesh_effect.apply(
                &mut pass,
                self.vertex_mode,
                self.ramp_mode,
                Mat4::IDENTITY,
                self.resources.projection(),
                lighting,
                surface,
                Some(&self.point_effect),
                &self.depth_texture,
                &self.xy_texture,
                &self.uv_texture,
            )
        } else {
            self.point_effect.apply(
                &mut pass,
                self.ramp_mode,
                Mat4::IDENTITY,
                self.resources.projection(),
                &self.depth_texture,
                &self.xy_texture,
            )
        };
        if !applied {
            return false;
        }

        if self.vertex_mode.is_sprite() {
            self.mesh.render_point_sprites(&mut pass)
        } else if self.vertex_mode.is_surface() {
            self.mesh.render_triangle_list(&mut pass, true)
        } else {
            self.mesh.render_point_list(&mut pass)
        }
    }

    fn blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        source: &Texture,
        viewport: Option<(f32, f32, f32, f32)>,
        clear: bool,
    ) -> bool {
        let _source_guard = RenderLock::new(Some(source));
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("panel_blit_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(self.clear_color())
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some((x, y, w, h)) = viewport {
            pass.set_viewport(x, y, w, h, 0.0, 1.0);
        }
        self.blit_effect.blit(&mut pass, source, None)
    }
}

fn write_table(texture: &Texture, table: &[[f32; 2]]) -> bool {
    if table.len() != DEPTH_FRAME_PIXELS {
        warn!(
            entries = table.len(),
            expected = DEPTH_FRAME_PIXELS,
            "Rejected table update with wrong entry count"
        );
        return false;
    }
    let Some(mut guard) = texture.lock() else {
        return false;
    };
    let (bytes, pitch) = guard.access_buffer();
    let width = DEPTH_FRAME_WIDTH as usize;
    for row in 0..DEPTH_FRAME_HEIGHT as usize {
        let src = &table[row * width..(row + 1) * width];
        bytes[row * pitch..row * pitch + width * 8].copy_from_slice(bytemuck::cast_slice(src));
    }
    true
}
