//! Sprite-sheet frame selection.
//!
//! A sheet is a `rows × cols` grid of equally sized cells read left to right.
//! Cell 0 maps to v ∈ [0, 1/rows]; with the default vertically flipped
//! decode of [`crate::assets::FsImageDecoder`] that is the picture's bottom
//! row. [`FrameClock`] decides when a layer moves to its next cell;
//! [`SpriteGrid::uv_rect`] turns a cell index into texture coordinates.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Cell layout of a sprite sheet. Both dimensions are non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteGrid {
    rows: u32,
    cols: u32,
}

impl SpriteGrid {
    /// Returns `None` if either dimension is zero or the cell count does not
    /// fit in a `u32`.
    pub fn new(rows: u32, cols: u32) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        rows.checked_mul(cols)?;
        Some(Self { rows, cols })
    }

    /// A single cell covering the whole texture.
    pub const fn single() -> Self {
        Self { rows: 1, cols: 1 }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn frame_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// Texture rectangle of cell `index` (taken modulo the cell count).
    pub fn uv_rect(&self, index: u32) -> UvRect {
        let index = index % self.frame_count();
        let row = index / self.cols;
        let col = index % self.cols;
        let cols = self.cols as f32;
        let rows = self.rows as f32;
        UvRect {
            u0: col as f32 / cols,
            v0: row as f32 / rows,
            u1: (col + 1) as f32 / cols,
            v1: (row + 1) as f32 / rows,
        }
    }
}

/// Sub-rectangle of texture space, `(u0, v0)` inclusive to `(u1, v1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: Self = Self {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    /// Value for the `uvOffset` uniform.
    pub fn offset(&self) -> [f32; 2] {
        [self.u0, self.v0]
    }

    /// Value for the `uvScale` uniform.
    pub fn scale(&self) -> [f32; 2] {
        [self.u1 - self.u0, self.v1 - self.v0]
    }

    pub fn area(&self) -> f32 {
        (self.u1 - self.u0) * (self.v1 - self.v0)
    }

    /// True if the two rectangles share interior area.
    pub fn overlaps(&self, other: &UvRect) -> bool {
        self.u0 < other.u1 && other.u0 < self.u1 && self.v0 < other.v1 && other.v0 < self.v1
    }
}

/// Per-layer frame counter advancing at a fixed rate.
///
/// Step `n` is due once `n / fps` seconds have passed since the anchor. The
/// schedule is kept in integer nanoseconds so it never drifts, and a call
/// never steps more than once. When a layer falls two or more periods behind
/// (a stalled pump, a resumed window) the anchor jumps to `now` instead of
/// replaying the missed steps.
#[derive(Clone, Debug)]
pub struct FrameClock {
    grid: SpriteGrid,
    fps: u32,
    frame: u32,
    anchor: Duration,
    steps: u64,
    advances: u64,
}

impl FrameClock {
    /// Returns `None` for a zero frame rate.
    pub fn new(grid: SpriteGrid, fps: u32) -> Option<Self> {
        Self::starting_at(grid, fps, Duration::ZERO)
    }

    pub fn starting_at(grid: SpriteGrid, fps: u32, anchor: Duration) -> Option<Self> {
        if fps == 0 {
            return None;
        }
        Some(Self {
            grid,
            fps,
            frame: 0,
            anchor,
            steps: 0,
            advances: 0,
        })
    }

    /// Moves to the next cell if a frame period has elapsed; returns the
    /// current cell index either way.
    pub fn advance(&mut self, now: Duration) -> u32 {
        let Some(elapsed) = now.checked_sub(self.anchor) else {
            // Clock went backwards; start a fresh schedule.
            self.rebase(now);
            return self.frame;
        };
        let scaled = elapsed.as_nanos() * u128::from(self.fps);
        let next_due = u128::from(self.steps + 1) * NANOS_PER_SEC;
        if scaled < next_due {
            return self.frame;
        }

        self.frame = (self.frame + 1) % self.grid.frame_count();
        self.advances += 1;
        if scaled >= next_due + NANOS_PER_SEC {
            tracing::trace!(
                behind_ns = (scaled - next_due) as u64 / u64::from(self.fps),
                "frame clock fell behind; re-anchoring"
            );
            self.rebase(now);
        } else {
            self.steps += 1;
        }
        self.frame
    }

    fn rebase(&mut self, now: Duration) {
        self.anchor = now;
        self.steps = 0;
    }

    pub fn frame_index(&self) -> u32 {
        self.frame
    }

    /// Total steps taken since construction.
    pub fn advances(&self) -> u64 {
        self.advances
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn grid(&self) -> SpriteGrid {
        self.grid
    }

    pub fn uv_rect(&self) -> UvRect {
        self.grid.uv_rect(self.frame)
    }
}
