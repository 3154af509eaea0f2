// SPDX-License-Identifier: GPL-3.0-only

//! Shader effects for depth visualization
//!
//! Each effect owns its pipelines, uniform buffers, and bind group layouts.
//! Effects initialize asynchronously against a device; `apply` binds an
//! effect onto a render pass and returns `false` while shaders are still
//! loading or a required resource is missing, so a draw can skip a frame
//! instead of faulting.

pub mod depth_mesh;
pub mod depth_point;
pub mod render_texture;

pub use depth_mesh::DepthMeshEffect;
pub use depth_point::DepthPointEffect;
pub use render_texture::{BlitMode, RenderTextureEffect};

use glam::{Vec3, Vec4};

/// Color format of every panel render target
pub const RENDER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth buffer format used by the 3D passes
pub const DEPTH_BUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Common capability check across effects
pub trait Effect {
    /// Whether shader loading finished and the effect can be applied
    fn is_ready(&self) -> bool;
}

/// How the depth grid is expanded into primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexMode {
    /// One point per depth pixel
    Point,
    /// Triangulated surface
    Surface,
    /// Surface with per-vertex normals from neighboring depth samples
    SurfaceWithNormal,
    /// Surface textured through the color-correspondence UV table
    SurfaceWithUv,
    /// One point per sample from caller-supplied XYZ positions
    PointXyz,
    /// Camera-facing quad per depth pixel
    PointSprite,
    /// Sprites projected with the view rotation folded into the projection
    PointSpriteWithCameraRotation,
}

impl VertexMode {
    /// Index used in shader uniforms
    pub fn shader_index(self) -> u32 {
        match self {
            VertexMode::Point => 0,
            VertexMode::Surface => 1,
            VertexMode::SurfaceWithNormal => 2,
            VertexMode::SurfaceWithUv => 3,
            VertexMode::PointXyz => 4,
            VertexMode::PointSprite => 5,
            VertexMode::PointSpriteWithCameraRotation => 6,
        }
    }

    pub fn is_surface(self) -> bool {
        matches!(
            self,
            VertexMode::Surface | VertexMode::SurfaceWithNormal | VertexMode::SurfaceWithUv
        )
    }

    pub fn is_sprite(self) -> bool {
        matches!(
            self,
            VertexMode::PointSprite | VertexMode::PointSpriteWithCameraRotation
        )
    }
}

/// Depth-to-color ramp selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampMode {
    /// No ramp; surface texture or flat color instead
    #[default]
    None,
    /// HSV hue wheel over the valid depth range
    Color,
    /// Descending grey over the valid depth range
    Grey,
}

impl RampMode {
    pub fn shader_index(self) -> u32 {
        match self {
            RampMode::None => 0,
            RampMode::Color => 1,
            RampMode::Grey => 2,
        }
    }
}

/// Directional light parameters for the surface modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingParams {
    pub direction: Vec3,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub specular_power: f32,
    pub enable_lighting: bool,
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.5, 0.3, 1.5).normalize(),
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.5, 0.5, 0.5, 1.0),
            specular: Vec4::ZERO,
            specular_power: 1.0,
            enable_lighting: true,
        }
    }
}

impl LightingParams {
    /// True when only the ambient term contributes
    pub fn is_ambient_only(&self) -> bool {
        self.diffuse == Vec4::ZERO && self.specular == Vec4::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_mode_classification() {
        assert!(VertexMode::Surface.is_surface());
        assert!(VertexMode::SurfaceWithUv.is_surface());
        assert!(!VertexMode::Point.is_surface());
        assert!(VertexMode::PointSprite.is_sprite());
        assert!(VertexMode::PointSpriteWithCameraRotation.is_sprite());
        assert!(!VertexMode::PointXyz.is_sprite());
    }

    #[test]
    fn test_default_lighting_is_normalized() {
        let lighting = LightingParams::default();
        assert!((lighting.direction.length() - 1.0).abs() < 1e-6);
        assert!(!lighting.is_ambient_only());
    }
}
