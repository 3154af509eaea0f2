// SPDX-License-Identifier: GPL-3.0-only

//! Sensor collaborator contracts
//!
//! The panel consumes frames through these traits rather than talking to a
//! device SDK directly. A backend implements a frame source per stream type
//! (depth, infrared, color) plus a coordinate mapper; the panel opens a
//! reader per source and pulls the latest frame non-blocking on each
//! update tick.

use std::sync::Arc;

/// Describes the fixed pixel layout of one frame stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescription {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
}

impl FrameDescription {
    /// Sample count of one frame (width * height)
    pub fn length_in_pixels(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// One depth frame: per-pixel distance from sensor in millimeters
#[derive(Clone)]
pub struct DepthFrame {
    description: FrameDescription,
    samples: Arc<[u16]>,
}

impl DepthFrame {
    pub fn new(description: FrameDescription, samples: Arc<[u16]>) -> Self {
        Self {
            description,
            samples,
        }
    }

    pub fn description(&self) -> FrameDescription {
        self.description
    }

    /// Copy frame samples into a caller-owned array.
    ///
    /// Copies `min(dst.len(), samples.len())` values.
    pub fn copy_frame_data_to_array(&self, dst: &mut [u16]) {
        let n = dst.len().min(self.samples.len());
        dst[..n].copy_from_slice(&self.samples[..n]);
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// One infrared frame: per-pixel 16-bit intensity
#[derive(Clone)]
pub struct InfraredFrame {
    description: FrameDescription,
    samples: Arc<[u16]>,
}

impl InfraredFrame {
    pub fn new(description: FrameDescription, samples: Arc<[u16]>) -> Self {
        Self {
            description,
            samples,
        }
    }

    pub fn description(&self) -> FrameDescription {
        self.description
    }

    /// Borrow the raw intensity buffer without copying
    pub fn lock_image_buffer(&self) -> &[u16] {
        &self.samples
    }
}

/// One color frame in the sensor's raw packed format (YUYV)
#[derive(Clone)]
pub struct ColorFrame {
    description: FrameDescription,
    bytes: Arc<[u8]>,
}

impl ColorFrame {
    pub fn new(description: FrameDescription, bytes: Arc<[u8]>) -> Self {
        Self { description, bytes }
    }

    pub fn description(&self) -> FrameDescription {
        self.description
    }

    /// Borrow the raw packed pixel buffer without conversion
    pub fn lock_raw_image_buffer(&self) -> &[u8] {
        &self.bytes
    }
}

/// A stream of depth frames
pub trait DepthFrameSource: Send + Sync {
    fn open_reader(&self) -> Box<dyn DepthFrameReader>;
}

/// Non-blocking reader over a depth stream
pub trait DepthFrameReader: Send {
    /// Returns the newest unseen frame, or `None` when nothing new arrived
    fn acquire_latest_frame(&mut self) -> Option<DepthFrame>;
}

/// A stream of infrared frames
pub trait InfraredFrameSource: Send + Sync {
    fn open_reader(&self) -> Box<dyn InfraredFrameReader>;
}

/// Non-blocking reader over an infrared stream
pub trait InfraredFrameReader: Send {
    fn acquire_latest_frame(&mut self) -> Option<InfraredFrame>;
}

/// A stream of color frames
pub trait ColorFrameSource: Send + Sync {
    fn open_reader(&self) -> Box<dyn ColorFrameReader>;
}

/// Non-blocking reader over a color stream
pub trait ColorFrameReader: Send {
    fn acquire_latest_frame(&mut self) -> Option<ColorFrame>;
}

/// Maps depth pixels to camera space and to color-frame coordinates.
///
/// Intrinsics changes are exposed through a monotonically increasing
/// generation counter; the panel polls it each update tick and refreshes
/// the XY table when the value moved, which keeps the recompute off the
/// notification thread.
pub trait CoordinateMapper: Send + Sync {
    /// Per-pixel (x, y) unprojection factors for the depth frame
    fn depth_frame_to_camera_space_table(&self) -> Vec<[f32; 2]>;

    /// Fill `uv` with the color-frame pixel coordinate of each depth
    /// pixel; entries without a correspondence are set to (0, 0).
    fn map_depth_frame_to_color_space(&self, depth: &[u16], uv: &mut [[f32; 2]]);

    /// Incremented whenever the camera intrinsics change
    fn mapping_generation(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_description_pixels() {
        let desc = FrameDescription {
            width: 512,
            height: 424,
            bytes_per_pixel: 2,
        };
        assert_eq!(desc.length_in_pixels(), 512 * 424);
    }

    #[test]
    fn test_depth_frame_copy_truncates() {
        let desc = FrameDescription {
            width: 2,
            height: 2,
            bytes_per_pixel: 2,
        };
        let frame = DepthFrame::new(desc, Arc::from(vec![1u16, 2, 3, 4]));
        let mut dst = [0u16; 3];
        frame.copy_frame_data_to_array(&mut dst);
        assert_eq!(dst, [1, 2, 3]);
    }
}
