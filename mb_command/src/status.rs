//! Host/UI status reporting.

use mb_common::consts::{BUILD_PERCENT_UNKNOWN, EXTRUDER_COUNT};
use mb_common::state::{BuildState, ExecutionMode, PauseState};
use serde::{Deserialize, Serialize};

// ─── Build Progress ─────────────────────────────────────────────────

/// Host-reported build percentage and the time estimate derived from it.
///
/// The estimate runs from the first non-zero report, not from the start of
/// the job: the rate is the progress made since that report divided by the
/// time it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    percent: u8,
    /// Board seconds and percentage at the first non-zero report.
    start: Option<(u32, u8)>,
    elapsed_seconds: u32,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildProgress {
    pub const fn new() -> Self {
        Self {
            percent: BUILD_PERCENT_UNKNOWN,
            start: None,
            elapsed_seconds: 0,
        }
    }

    #[inline]
    pub const fn percent(&self) -> u8 {
        self.percent
    }

    /// Record a `SET_BUILD_PERCENT` report.
    pub fn update(&mut self, percent: u8, now_seconds: u32) {
        self.percent = percent;
        if percent == 0 {
            return;
        }
        let (start_seconds, _) = *self.start.get_or_insert((now_seconds, percent));
        self.elapsed_seconds = now_seconds.saturating_sub(start_seconds);
    }

    /// `elapsed / (pct − starting pct) × (100 − pct)`. `None` until progress
    /// has been made since the first report.
    pub fn seconds_remaining(&self) -> Option<u32> {
        let (_, starting) = self.start?;
        let pct = self.percent;
        if pct == 0 || pct > 100 || pct == starting || self.elapsed_seconds == 0 {
            return None;
        }
        if pct < starting {
            return Some(0);
        }
        let done = (pct - starting) as u64;
        Some((self.elapsed_seconds as u64 * (100 - pct) as u64 / done) as u32)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────

/// Everything the host link and the panel report about the command core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: ExecutionMode,
    pub pause_state: PauseState,
    pub error_message: Option<String>,
    pub build_state: BuildState,
    pub build_percent: u8,
    pub seconds_remaining: Option<u32>,
    pub line_number: u32,
    /// Net filament since the last commit [steps].
    pub filament_steps: [i64; EXTRUDER_COUNT],
    /// Previous job's filament [steps].
    pub filament_last_steps: [i64; EXTRUDER_COUNT],
    pub filament_mm: [f32; EXTRUDER_COUNT],
    pub filament_last_mm: [f32; EXTRUDER_COUNT],
    pub tool: u8,
    pub ditto: bool,
    /// Build speed factor applied to accelerated host moves.
    pub speed_factor: f32,
    /// Z height [steps] the job will pause at.
    pub pause_height: Option<i32>,
}
