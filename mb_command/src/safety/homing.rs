//! Homing supervision.
//!
//! The command core does not find endstops itself: it sends every masked
//! axis toward a sentinel target and lets the pipeline stop each axis at
//! its switch. The supervisor only watches for the pipeline to go idle
//! and enforces the command's timeout.
//!
//! ## Lifecycle
//!
//! 1. `FIND_AXES_MINIMUM` / `FIND_AXES_MAXIMUM` queues the homing move and
//!    calls [`HomingSupervisor::start`]
//! 2. Each tick: [`HomingSupervisor::tick`] with the pipeline's running flag
//! 3. `Complete` or `TimedOut`: the caller discards anything in flight and
//!    returns to `Ready`. A timeout is not fatal; some axes have no switch.

use tracing::{info, warn};

use crate::state::timeout::Timeout;

// ─── Homing Phases ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomingPhase {
    #[default]
    Idle,
    /// Homing move in flight.
    Seeking,
    Complete,
    /// Timeout elapsed before the move finished.
    Aborted,
}

/// Result of a single homing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingTickResult {
    InProgress,
    /// The pipeline went idle: every axis stopped.
    Complete,
    /// Timeout elapsed; the caller must abort motion.
    TimedOut,
}

// ─── Homing Supervisor ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct HomingSupervisor {
    phase: HomingPhase,
    timeout: Timeout,
}

impl HomingSupervisor {
    pub const fn new() -> Self {
        Self {
            phase: HomingPhase::Idle,
            timeout: Timeout::idle(),
        }
    }

    #[inline]
    pub const fn phase(&self) -> HomingPhase {
        self.phase
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase == HomingPhase::Seeking
    }

    /// Begin supervising. A zero timeout never expires.
    pub fn start(&mut self, now_us: u64, timeout_s: u16) {
        self.phase = HomingPhase::Seeking;
        self.timeout.start_seconds(now_us, timeout_s as u32);
    }

    pub fn tick(&mut self, now_us: u64, pipeline_running: bool) -> HomingTickResult {
        match self.phase {
            HomingPhase::Idle | HomingPhase::Complete => HomingTickResult::Complete,
            HomingPhase::Aborted => HomingTickResult::TimedOut,
            HomingPhase::Seeking => {
                if !pipeline_running {
                    info!("homing complete");
                    self.finish(HomingPhase::Complete);
                    HomingTickResult::Complete
                } else if self.timeout.has_elapsed(now_us) {
                    warn!("homing timed out, aborting motion");
                    self.finish(HomingPhase::Aborted);
                    HomingTickResult::TimedOut
                } else {
                    HomingTickResult::InProgress
                }
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn finish(&mut self, phase: HomingPhase) {
        self.phase = phase;
        self.timeout.clear();
    }
}
