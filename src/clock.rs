/*!
MasterClock: the single authoritative tick counter.

Overview
- One tick is one PPU dot. A frame is 341 dots x 262 scanlines.
- The CPU and APU run on every third tick.
- Scan position, frame index, frame parity and CPU phase are pure functions
  of the counter. Nothing positional is stored.

Mutation
- `advance(n)` is the only way the counter moves. The orchestrator normally
  advances by 1, and by 2 on the odd-frame dot skip, which means the skipped
  position is simply never observed.
- `MasterClock` is `Copy`: callers snapshot the pre-advance value and query the
  snapshot instead of holding a reference into the orchestrator.
*/

use std::time::Duration;

/// Dots (ticks) per scanline.
pub const DOTS_PER_SCANLINE: u64 = 341;
/// Scanlines per frame, including vblank and the pre-render line.
pub const SCANLINES_PER_FRAME: u64 = 262;
/// Ticks in one full frame.
pub const TICKS_PER_FRAME: u64 = DOTS_PER_SCANLINE * SCANLINES_PER_FRAME;
/// Master ticks per CPU cycle.
pub const CPU_DIVIDER: u64 = 3;

/// First vblank scanline.
pub const VBLANK_SCANLINE: u16 = 241;
/// Pre-render scanline.
pub const PRE_RENDER_SCANLINE: u16 = 261;

const NTSC_FRAME_RATE: f64 = 60.098_8;

/// Raster coordinate derived from a tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanPosition {
    pub scanline: u16,
    pub dot: u16,
}

impl ScanPosition {
    #[inline]
    pub const fn new(scanline: u16, dot: u16) -> Self {
        Self { scanline, dot }
    }

    /// Scanlines 0..=239 draw pixels.
    #[inline]
    pub const fn is_visible_line(self) -> bool {
        self.scanline < 240
    }

    #[inline]
    pub const fn is_pre_render(self) -> bool {
        self.scanline == PRE_RENDER_SCANLINE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterClock {
    ticks: u64,
    speed_multiplier: f64,
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterClock {
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            speed_multiplier: 1.0,
        }
    }

    /// Move the counter forward by `n` ticks.
    #[inline]
    pub fn advance(&mut self, n: u64) {
        self.ticks = self.ticks.wrapping_add(n);
    }

    // ---------------------------------------------------------------------
    // Derived queries
    // ---------------------------------------------------------------------

    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub const fn scan_position(&self) -> ScanPosition {
        let in_frame = self.ticks % TICKS_PER_FRAME;
        ScanPosition {
            scanline: (in_frame / DOTS_PER_SCANLINE) as u16,
            dot: (in_frame % DOTS_PER_SCANLINE) as u16,
        }
    }

    #[inline]
    pub const fn scanline(&self) -> u16 {
        self.scan_position().scanline
    }

    #[inline]
    pub const fn dot(&self) -> u16 {
        self.scan_position().dot
    }

    #[inline]
    pub const fn frame_index(&self) -> u64 {
        self.ticks / TICKS_PER_FRAME
    }

    #[inline]
    pub const fn is_odd_frame(&self) -> bool {
        self.frame_index() & 1 == 1
    }

    /// True on ticks where the CPU and APU run.
    #[inline]
    pub const fn is_cpu_tick(&self) -> bool {
        self.ticks % CPU_DIVIDER == 0
    }

    /// Number of CPU cycles started before this tick.
    #[inline]
    pub const fn cpu_cycle(&self) -> u64 {
        self.ticks / CPU_DIVIDER
    }

    // ---------------------------------------------------------------------
    // Host pacing
    // ---------------------------------------------------------------------

    #[inline]
    pub const fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    /// Non-positive and non-finite values fall back to 1.0.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) {
        self.speed_multiplier = if multiplier.is_finite() && multiplier > 0.0 {
            multiplier
        } else {
            1.0
        };
    }

    /// Wall-clock period of one frame at the current speed.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (NTSC_FRAME_RATE * self.speed_multiplier))
    }
}
