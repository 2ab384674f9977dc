//! Optional inspection output of the tracker.

use common::{BitBuffer2, Buffer2};

use crate::correlation::Displacement;

/// Cell present in the current field only.
pub const CURRENT: u8 = 1;
/// Cell present in the projected previous field only.
pub const PROJECTED: u8 = 2;
/// Cell present in both.
pub const BOTH: u8 = CURRENT | PROJECTED;

/// Overlap of the projected previous occupancy with the current occupancy.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapFrame {
    pub time_index: usize,
    pub displacement: Displacement,
    /// 0, [`CURRENT`], [`PROJECTED`] or [`BOTH`] per cell.
    pub cells: Buffer2<u8>,
}

impl OverlapFrame {
    pub fn new(
        time_index: usize,
        displacement: Displacement,
        current: &BitBuffer2,
        projected: &BitBuffer2,
    ) -> Self {
        assert!(
            current.same_shape(projected),
            "overlap shape mismatch: {}x{} vs {}x{}",
            current.width(),
            current.height(),
            projected.width(),
            projected.height()
        );
        let cells = Buffer2::from_fn(current.width(), current.height(), |x, y| {
            let mut value = 0;
            if current.get_xy(x, y) {
                value |= CURRENT;
            }
            if projected.get_xy(x, y) {
                value |= PROJECTED;
            }
            value
        });
        Self {
            time_index,
            displacement,
            cells,
        }
    }

    pub fn count(&self, value: u8) -> usize {
        self.cells.iter().filter(|&&v| v == value).count()
    }
}

/// Receiver of per-timestep diagnostics.
pub trait DiagnosticSink {
    fn overlap_frame(&mut self, frame: OverlapFrame);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn overlap_frame(&mut self, _frame: OverlapFrame) {}
}

/// Keeps every frame in memory.
#[derive(Debug, Default, Clone)]
pub struct FrameCollector {
    frames: Vec<OverlapFrame>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[OverlapFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<OverlapFrame> {
        self.frames
    }
}

impl DiagnosticSink for FrameCollector {
    fn overlap_frame(&mut self, frame: OverlapFrame) {
        self.frames.push(frame);
    }
}
