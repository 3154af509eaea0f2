// SPDX-License-Identifier: GPL-3.0-only

//! Mode state machine and its UV/ramp exclusion invariant

mod common;

use std::sync::Arc;

use common::{ScriptedDepthSource, ScriptedMapper};
use depthview::constants::DEPTH_FRAME_PIXELS;
use depthview::panel::{PanelMode, PanelProperty};
use depthview::{DepthMapPanel, PanelConfig, RampMode, VertexMode};

fn uv_never_ramped(panel: &DepthMapPanel) -> bool {
    panel.vertex_mode() != VertexMode::SurfaceWithUv || panel.ramp_mode() == RampMode::None
}

#[test]
fn test_panel_mode_table() {
    let mut panel = DepthMapPanel::new(PanelConfig::default());

    panel.set_panel_mode(PanelMode::Depth);
    assert_eq!(panel.vertex_mode(), VertexMode::SurfaceWithNormal);
    assert_eq!(panel.ramp_mode(), RampMode::None);

    panel.set_panel_mode(PanelMode::ColorRegistration);
    assert_eq!(panel.vertex_mode(), VertexMode::SurfaceWithUv);
    assert_eq!(panel.ramp_mode(), RampMode::None);

    panel.set_panel_mode(PanelMode::DepthRamp);
    assert_eq!(panel.vertex_mode(), VertexMode::SurfaceWithNormal);
    assert_eq!(panel.ramp_mode(), RampMode::Color);
}

#[test]
fn test_invariant_holds_across_every_mode_path() {
    let mut panel = DepthMapPanel::new(PanelConfig::default());
    for mode in [
        PanelMode::Depth,
        PanelMode::ColorRegistration,
        PanelMode::DepthRamp,
        PanelMode::InfraredOnly,
        PanelMode::ColorOnly,
        PanelMode::ColorAndInfraredComposite,
        PanelMode::ColorRegistration,
    ] {
        panel.set_panel_mode(mode);
        assert!(uv_never_ramped(&panel), "violated after {:?}", mode);
    }

    for (vertex, ramp) in [
        (VertexMode::Point, RampMode::Grey),
        (VertexMode::PointSprite, RampMode::Color),
        (VertexMode::PointSpriteWithCameraRotation, RampMode::Color),
        (VertexMode::PointXyz, RampMode::Color),
        (VertexMode::Surface, RampMode::None),
        (VertexMode::SurfaceWithUv, RampMode::None),
    ] {
        assert!(panel.set_mode(vertex, ramp));
        assert!(uv_never_ramped(&panel));
    }
}

#[cfg(not(debug_assertions))]
#[test]
fn test_invalid_combination_rejected_without_state_change() {
    let mut panel = DepthMapPanel::new(PanelConfig::default());
    assert!(panel.set_mode(VertexMode::Surface, RampMode::Grey));
    assert!(!panel.set_mode(VertexMode::SurfaceWithUv, RampMode::Grey));
    assert_eq!(panel.vertex_mode(), VertexMode::Surface);
    assert_eq!(panel.ramp_mode(), RampMode::Grey);
}

#[test]
fn test_xyz_point_mode_update_contract() {
    let mut panel = DepthMapPanel::new(PanelConfig::default());
    assert!(panel.set_mode(VertexMode::PointXyz, RampMode::Color));

    // depth-only updates are for reconstructing modes
    assert!(!panel.update_data(&vec![2000u16; DEPTH_FRAME_PIXELS]));

    let x = vec![0.0f32; DEPTH_FRAME_PIXELS];
    let y = vec![0.0f32; DEPTH_FRAME_PIXELS];
    let z = vec![2000u16; DEPTH_FRAME_PIXELS];
    assert!(panel.update_data_xyz(&x, &y, &z));

    // short buffers rejected on every axis
    assert!(!panel.update_data_xyz(&x[..10], &y, &z));
    assert!(!panel.update_data_xyz(&x, &y[..10], &z));
    assert!(!panel.update_data_xyz(&x, &y, &z[..10]));
}

#[test]
fn test_xyz_update_rejected_outside_xyz_mode() {
    // the default mode reconstructs positions from the unprojection
    // table; an XYZ payload must not overwrite that table
    let panel = DepthMapPanel::new(PanelConfig::default());
    let xy_before = panel.xy_texture().committed_bytes();
    let depth_before = panel.depth_texture().committed_bytes();

    let x = vec![1000.0f32; DEPTH_FRAME_PIXELS];
    let y = vec![500.0f32; DEPTH_FRAME_PIXELS];
    let z = vec![2000u16; DEPTH_FRAME_PIXELS];
    assert!(!panel.update_data_xyz(&x, &y, &z));

    assert_eq!(panel.xy_texture().committed_bytes(), xy_before);
    assert_eq!(panel.depth_texture().committed_bytes(), depth_before);
}

#[test]
fn test_property_changed_on_every_source_mutation() {
    let mut panel = DepthMapPanel::new(PanelConfig::default());
    let mut events = panel.subscribe();

    panel.set_depth_source(Some(Arc::new(ScriptedDepthSource::default())));
    panel.set_infrared_source(None);
    panel.set_color_source(None);
    panel.set_coordinate_mapper(Some(Arc::new(ScriptedMapper::default())));
    panel.set_panel_mode(PanelMode::InfraredOnly);

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            PanelProperty::DepthSource,
            PanelProperty::InfraredSource,
            PanelProperty::ColorSource,
            PanelProperty::CoordinateMapper,
            PanelProperty::PanelMode,
        ]
    );
}
