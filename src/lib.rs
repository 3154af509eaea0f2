// SPDX-License-Identifier: GPL-3.0-only

//! Depth sensor visualization pipeline on wgpu
//!
//! Turns depth, infrared, and color streams from a time-of-flight sensor
//! into rendered views: lit depth surfaces, ramp-colorized depth, color
//! registered onto the depth mesh, point clouds and sprites, and blitted
//! infrared/color composites.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`panel`]: The depth map panel, its textures, mesh, effects, and
//!   render loop
//! - [`sensor`]: Frame source and coordinate mapper contracts a sensor
//!   backend implements
//! - [`gpu`]: wgpu device and queue creation shared by panel resources
//! - [`config`]: User configuration handling
//! - [`errors`]: Error taxonomy (transient skips never surface here)
//!
//! # Example
//!
//! ```ignore
//! let panel = Arc::new(Mutex::new(DepthMapPanel::new(PanelConfig::default())));
//! panel.lock().await.set_logical_size(1280.0, 720.0, 1.0)?;
//! panel.lock().await.create_device_resources().await?;
//! let render_loop = RenderLoop::start(panel.clone());
//! // ... later
//! render_loop.shutdown().await;
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod panel;
pub mod sensor;

// Re-export commonly used types
pub use config::PanelConfig;
pub use errors::{EffectError, PanelError, PanelResult, ResourceError};
pub use panel::{DepthMapPanel, LightingParams, PanelMode, RampMode, RenderLoop, VertexMode};
