// SPDX-License-Identifier: GPL-3.0-only

//! Panel configuration handling

use serde::{Deserialize, Serialize};

use crate::constants::{DEPTH_MAX_MM, DEPTH_MIN_MM, POINT_SPRITE_SIZE_MM, RENDER_FOV_Y};

/// User-tunable settings for one depth visualization panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Minimum valid depth in millimeters; closer samples are discarded
    pub depth_min_mm: f32,
    /// Maximum valid depth in millimeters; farther samples are discarded
    pub depth_max_mm: f32,
    /// Vertical field of view of the rendering camera (radians)
    pub fov_y: f32,
    /// World-space size of one expanded point sprite (millimeters)
    pub point_sprite_size_mm: f32,
    /// Clear color for the panel background (RGBA, 0.0-1.0)
    pub clear_color: [f32; 4],
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            depth_min_mm: DEPTH_MIN_MM,
            depth_max_mm: DEPTH_MAX_MM,
            fov_y: RENDER_FOV_Y,
            point_sprite_size_mm: POINT_SPRITE_SIZE_MM,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl PanelConfig {
    /// Clamp the depth range into a usable ordering.
    ///
    /// Guards against configs where min >= max, which would make every
    /// sample invalid and divide the ramp normalization by zero.
    pub fn sanitized(mut self) -> Self {
        if self.depth_min_mm < 0.0 {
            self.depth_min_mm = 0.0;
        }
        if self.depth_max_mm <= self.depth_min_mm {
            self.depth_max_mm = self.depth_min_mm + 1.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_matches_sensor() {
        let config = PanelConfig::default();
        assert_eq!(config.depth_min_mm, 500.0);
        assert_eq!(config.depth_max_mm, 8000.0);
    }

    #[test]
    fn test_sanitized_fixes_inverted_range() {
        let config = PanelConfig {
            depth_min_mm: 4000.0,
            depth_max_mm: 1000.0,
            ..Default::default()
        }
        .sanitized();
        assert!(config.depth_max_mm > config.depth_min_mm);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PanelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PanelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
