// SPDX-License-Identifier: GPL-3.0-only

//! Scripted sensor doubles for panel tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use depthview::constants::{
    COLOR_FRAME_HEIGHT, COLOR_FRAME_WIDTH, DEPTH_FRAME_HEIGHT, DEPTH_FRAME_PIXELS,
    DEPTH_FRAME_WIDTH,
};
use depthview::sensor::{
    ColorFrame, ColorFrameReader, ColorFrameSource, CoordinateMapper, DepthFrame,
    DepthFrameReader, DepthFrameSource, FrameDescription, InfraredFrame, InfraredFrameReader,
    InfraredFrameSource,
};

/// Install the test log subscriber; safe to call from every test
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn depth_description() -> FrameDescription {
    FrameDescription {
        width: DEPTH_FRAME_WIDTH,
        height: DEPTH_FRAME_HEIGHT,
        bytes_per_pixel: 2,
    }
}

pub fn color_description() -> FrameDescription {
    FrameDescription {
        width: COLOR_FRAME_WIDTH,
        height: COLOR_FRAME_HEIGHT,
        bytes_per_pixel: 2,
    }
}

/// Depth source fed by the test; readers drain the queued frames
#[derive(Default)]
pub struct ScriptedDepthSource {
    queue: Arc<Mutex<VecDeque<DepthFrame>>>,
}

impl ScriptedDepthSource {
    pub fn push(&self, samples: Vec<u16>) {
        assert_eq!(samples.len(), DEPTH_FRAME_PIXELS);
        self.queue
            .lock()
            .unwrap()
            .push_back(DepthFrame::new(depth_description(), Arc::from(samples)));
    }
}

impl DepthFrameSource for ScriptedDepthSource {
    fn open_reader(&self) -> Box<dyn DepthFrameReader> {
        Box::new(ScriptedDepthReader {
            queue: Arc::clone(&self.queue),
        })
    }
}

struct ScriptedDepthReader {
    queue: Arc<Mutex<VecDeque<DepthFrame>>>,
}

impl DepthFrameReader for ScriptedDepthReader {
    fn acquire_latest_frame(&mut self) -> Option<DepthFrame> {
        self.queue.lock().unwrap().pop_front()
    }
}

#[derive(Default)]
pub struct ScriptedInfraredSource {
    queue: Arc<Mutex<VecDeque<InfraredFrame>>>,
}

impl ScriptedInfraredSource {
    pub fn push(&self, samples: Vec<u16>) {
        assert_eq!(samples.len(), DEPTH_FRAME_PIXELS);
        self.queue
            .lock()
            .unwrap()
            .push_back(InfraredFrame::new(depth_description(), Arc::from(samples)));
    }
}

impl InfraredFrameSource for ScriptedInfraredSource {
    fn open_reader(&self) -> Box<dyn InfraredFrameReader> {
        Box::new(ScriptedInfraredReader {
            queue: Arc::clone(&self.queue),
        })
    }
}

struct ScriptedInfraredReader {
    queue: Arc<Mutex<VecDeque<InfraredFrame>>>,
}

impl InfraredFrameReader for ScriptedInfraredReader {
    fn acquire_latest_frame(&mut self) -> Option<InfraredFrame> {
        self.queue.lock().unwrap().pop_front()
    }
}

#[derive(Default)]
pub struct ScriptedColorSource {
    queue: Arc<Mutex<VecDeque<ColorFrame>>>,
}

impl ScriptedColorSource {
    pub fn push(&self, bytes: Vec<u8>) {
        assert_eq!(
            bytes.len(),
            (COLOR_FRAME_WIDTH * COLOR_FRAME_HEIGHT * 2) as usize
        );
        self.queue
            .lock()
            .unwrap()
            .push_back(ColorFrame::new(color_description(), Arc::from(bytes)));
    }
}

impl ColorFrameSource for ScriptedColorSource {
    fn open_reader(&self) -> Box<dyn ColorFrameReader> {
        Box::new(ScriptedColorReader {
            queue: Arc::clone(&self.queue),
        })
    }
}

struct ScriptedColorReader {
    queue: Arc<Mutex<VecDeque<ColorFrame>>>,
}

impl ColorFrameReader for ScriptedColorReader {
    fn acquire_latest_frame(&mut self) -> Option<ColorFrame> {
        self.queue.lock().unwrap().pop_front()
    }
}

/// Mapper returning a settable table and a bumpable generation counter
pub struct ScriptedMapper {
    generation: AtomicU64,
    table: Mutex<Vec<[f32; 2]>>,
    uv_fill: Mutex<[f32; 2]>,
}

impl Default for ScriptedMapper {
    fn default() -> Self {
        Self {
            generation: AtomicU64::new(1),
            table: Mutex::new(vec![[0.25, -0.25]; DEPTH_FRAME_PIXELS]),
            uv_fill: Mutex::new([100.0, 200.0]),
        }
    }
}

impl ScriptedMapper {
    pub fn set_table(&self, entry: [f32; 2]) {
        *self.table.lock().unwrap() = vec![entry; DEPTH_FRAME_PIXELS];
    }

    pub fn set_uv_fill(&self, entry: [f32; 2]) {
        *self.uv_fill.lock().unwrap() = entry;
    }

    pub fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl CoordinateMapper for ScriptedMapper {
    fn depth_frame_to_camera_space_table(&self) -> Vec<[f32; 2]> {
        self.table.lock().unwrap().clone()
    }

    fn map_depth_frame_to_color_space(&self, depth: &[u16], uv: &mut [[f32; 2]]) {
        let fill = *self.uv_fill.lock().unwrap();
        for (i, entry) in uv.iter_mut().enumerate() {
            *entry = if depth.get(i).copied().unwrap_or(0) > 0 {
                fill
            } else {
                [0.0, 0.0]
            };
        }
    }

    fn mapping_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
