// SPDX-License-Identifier: GPL-3.0-only

//! Depth visualization panel
//!
//! The panel is driven by a background render loop ticking near vsync
//! cadence. Each tick runs update-then-render under one coarse per-panel
//! lock, so frame commits, mode changes, and resize handling never
//! interleave with a draw. Device loss is handled inside the loop: the
//! panel tears down and rebuilds its device resources without the owner
//! re-issuing `start`.

pub mod depth_map;
pub mod effect;
pub mod infrared;
pub mod lifecycle;
pub mod mesh;
pub mod texture;

pub use depth_map::{DepthMapPanel, PanelMode, PanelProperty};
pub use effect::{
    DepthMeshEffect, DepthPointEffect, Effect, LightingParams, RampMode, RenderTextureEffect,
    VertexMode,
};
pub use infrared::InfraredRenderer;
pub use lifecycle::{LifecycleState, PanelResources};
pub use mesh::Mesh;
pub use texture::{PixelFormat, RenderLock, Texture, TextureLock};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::PanelError;

// close to 60Hz vsync cadence
const RENDER_TICK: Duration = Duration::from_micros(16_667);

/// Handle to a running background render loop.
///
/// Stopping is cooperative: the loop checks the flag every tick and exits
/// between frames, never mid-draw.
pub struct RenderLoop {
    running: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl RenderLoop {
    /// Spawn the render loop for a shared panel
    pub fn start(panel: Arc<Mutex<DepthMapPanel>>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(RENDER_TICK);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            debug!("Render loop started");
            while flag.load(Ordering::SeqCst) {
                interval.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                let mut panel = panel.lock().await;
                if panel.lifecycle_state() == LifecycleState::DeviceLost {
                    if let Err(e) = panel.create_device_resources().await {
                        warn!(error = %e, "Device rebuild failed, will retry");
                        continue;
                    }
                }
                panel.update();
                match panel.render() {
                    Ok(_) => {}
                    Err(PanelError::DeviceLost) => panel.notify_device_lost(),
                    Err(e) => warn!(error = %e, "Render failed"),
                }
            }
            debug!("Render loop stopped");
        });
        Self { running, handle }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    /// Request a cooperative stop; the loop exits after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop and wait for the loop task to finish
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;

    #[tokio::test]
    async fn test_render_loop_stops_cooperatively() {
        let panel = Arc::new(Mutex::new(DepthMapPanel::new(PanelConfig::default())));
        let render_loop = RenderLoop::start(Arc::clone(&panel));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(render_loop.is_running());
        render_loop.shutdown().await;
        // panel lock must be free again after shutdown
        let panel = panel.lock().await;
        assert_eq!(panel.lifecycle_state(), LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn test_loop_ticks_without_device() {
        // headless: every tick is a transient skip, never a panic
        let panel = Arc::new(Mutex::new(DepthMapPanel::new(PanelConfig::default())));
        let render_loop = RenderLoop::start(Arc::clone(&panel));
        tokio::time::sleep(Duration::from_millis(100)).await;
        render_loop.shutdown().await;
    }
}
