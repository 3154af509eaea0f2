// SPDX-License-Identifier: GPL-3.0-only

//! Sensor geometry and depth-range constants - Single source of truth
//!
//! All frame dimensions, depth range, and field-of-view constants live here.
//! These values are used across the depth visualization pipeline.

/// Depth/infrared frame width in pixels
pub const DEPTH_FRAME_WIDTH: u32 = 512;
/// Depth/infrared frame height in pixels
pub const DEPTH_FRAME_HEIGHT: u32 = 424;

/// Total sample count of one depth or infrared frame
pub const DEPTH_FRAME_PIXELS: usize = (DEPTH_FRAME_WIDTH * DEPTH_FRAME_HEIGHT) as usize;

/// Color frame width in pixels
pub const COLOR_FRAME_WIDTH: u32 = 1920;
/// Color frame height in pixels
pub const COLOR_FRAME_HEIGHT: u32 = 1080;

/// Sensor depth range limits (millimeters)
pub const DEPTH_MIN_MM: f32 = 500.0;
pub const DEPTH_MAX_MM: f32 = 8000.0;

/// Invalid depth marker value
pub const DEPTH_INVALID_MM: u16 = 0;

/// Depth camera horizontal field of view (radians)
pub const DEPTH_FRAME_HFOV: f32 = std::f32::consts::PI * 70.6 / 180.0;
/// Depth camera vertical field of view (radians)
pub const DEPTH_FRAME_VFOV: f32 = std::f32::consts::PI * 60.0 / 180.0;

/// Vertical field of view of the rendering camera (radians)
pub const RENDER_FOV_Y: f32 = std::f32::consts::PI * 60.0 / 180.0;
/// Near clip plane of the rendering camera
pub const RENDER_NEAR: f32 = 0.01;
/// Far clip plane of the rendering camera
pub const RENDER_FAR: f32 = 100.0;

/// World-space size of one expanded point sprite (millimeters)
pub const POINT_SPRITE_SIZE_MM: f32 = 3.0;

/// Number of levels in the built-in lookup ramp textures
pub const RAMP_LEVELS: usize = 256;
