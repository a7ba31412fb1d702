use std::time::{Duration, Instant};

/// Snapshot of the clock handed to [`crate::SceneRenderer::render_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    /// Monotonic time since the source was created or last reset.
    pub elapsed: Duration,
    /// Number of samples taken before this one.
    pub tick: u64,
}

impl TimeSample {
    pub fn new(elapsed: Duration, tick: u64) -> Self {
        Self { elapsed, tick }
    }
}

/// Abstraction over where frame timestamps originate from.
pub trait TimeSource {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces the timestamp for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    tick: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            tick: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.tick = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed(), self.tick);
        self.tick = self.tick.saturating_add(1);
        sample
    }
}

/// Deterministic clock that advances by exactly one tick per sample.
///
/// The first sample lands one tick after the origin, matching a pump that
/// renders at the end of each tick. Tick `k` is computed as `k / hz` seconds
/// so no rounding error accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedTimeSource {
    hz: u32,
    tick: u64,
}

impl SteppedTimeSource {
    /// Returns `None` for a zero rate.
    pub fn new(hz: u32) -> Option<Self> {
        (hz > 0).then_some(Self { hz, tick: 0 })
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    fn at(&self, tick: u64) -> Duration {
        let nanos = u128::from(tick) * 1_000_000_000 / u128::from(self.hz);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.tick = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let index = self.tick;
        self.tick = self.tick.saturating_add(1);
        TimeSample::new(self.at(self.tick), index)
    }
}
