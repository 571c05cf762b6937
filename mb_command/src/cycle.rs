//! Simulated main loop: storage fill → scheduler slice, once per tick.
//!
//! [`CycleRunner`] plays a job file through a [`SimMachine`] on a simulated
//! clock. Every cycle advances the board clock and the step generator by
//! the configured tick, tops the command buffer up from the card, and runs
//! one controller slice. Wall-clock cost of each cycle body is recorded in
//! [`CycleStats`].
//!
//! ## Run ends when
//! - the card is finished and the command core is idle → [`CycleOutcome::Finished`]
//! - the build was cancelled → [`CycleOutcome::Cancelled`]
//! - an interrupt was requested and the machine has parked → [`CycleOutcome::Interrupted`]
//! - a storage fault cancelled the build → [`CycleError::Storage`]
//! - the pause chain faulted → [`CycleError::PauseFault`]
//! - the tick budget ran out → [`CycleError::TickLimit`]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mb_common::point::Axis;
use mb_common::state::{BuildState, ExecutionMode, PauseState};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LoadedConfig;
use crate::hw::MotionPipeline;
use crate::hw::playback::PlaybackSource;
use crate::sim::{SimMachine, SimPlayback};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-cycle timing statistics. O(1) per record, no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle body duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum cycle body duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum cycle body duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for the average.
    pub sum_cycle_ns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
    }

    /// Average cycle body time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Outcome / Error ────────────────────────────────────────────────

/// How a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Finished,
    Cancelled,
    Interrupted,
}

/// How a run ended abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    /// The job did not settle within the tick budget.
    #[error("job still running after {0} ticks")]
    TickLimit(u64),

    /// The card failed mid-job and the build was shut down.
    #[error("build aborted: {0}")]
    Storage(&'static str),

    /// The pause chain ended in `Error`.
    #[error("pause failed: {0}")]
    PauseFault(&'static str),
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Drives a simulated machine through a job file.
#[derive(Debug)]
pub struct CycleRunner {
    machine: SimMachine,
    playback: SimPlayback,
    stats: CycleStats,
    tick_us: u64,
    /// Operator pause once this many commands have run; resumed when parked.
    pause_at_line: Option<u32>,
    line_pause: LinePause,
    /// A pause height is pending; the pause it causes is resumed when parked.
    height_pause: bool,
    interrupt: Arc<AtomicBool>,
    interrupt_seen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinePause {
    Waiting,
    Pausing,
    Done,
}

impl CycleRunner {
    pub fn new(config: LoadedConfig, playback: SimPlayback) -> Self {
        let tick_us = u64::from(config.machine.cycle.tick_us.max(1));
        Self {
            machine: SimMachine::with_settings(&config.machine, config.settings),
            playback,
            stats: CycleStats::new(),
            tick_us,
            pause_at_line: None,
            line_pause: LinePause::Done,
            height_pause: false,
            interrupt: Arc::new(AtomicBool::new(false)),
            interrupt_seen: false,
        }
    }

    /// Pause once the line counter reaches `line`, then resume.
    pub fn with_pause_at_line(mut self, line: Option<u32>) -> Self {
        self.pause_at_line = line;
        self.line_pause = if line.is_some() {
            LinePause::Waiting
        } else {
            LinePause::Done
        };
        self
    }

    /// Pause once the platform reaches `z_mm`, then resume.
    pub fn with_pause_height(mut self, z_mm: Option<f32>) -> Self {
        let machine = &mut self.machine;
        let z_steps = z_mm.map(|mm| machine.core.translator().mm_to_steps(Axis::Z, mm));
        machine.core.set_pause_height(&machine.pipeline, z_steps);
        self.height_pause = z_steps.is_some();
        self
    }

    /// Run accelerated job moves at `factor` times their requested speed.
    pub fn with_speed_factor(mut self, factor: f32) -> Self {
        self.machine.core.set_speed_factor(factor);
        self
    }

    /// Flag set from signal context to stop the run. The runner asserts the
    /// P-Stop and parks the machine before returning.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn machine(&self) -> &SimMachine {
        &self.machine
    }

    pub fn playback(&self) -> &SimPlayback {
        &self.playback
    }

    pub const fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run cycles until the job settles or `max_ticks` is reached.
    pub fn run(&mut self, max_ticks: u64) -> Result<CycleOutcome, CycleError> {
        info!(tick_us = self.tick_us, max_ticks, "entering cycle loop");
        for _ in 0..max_ticks {
            let cycle_start = Instant::now();
            self.cycle_body();
            self.stats.record(cycle_start.elapsed().as_nanos() as u64);

            if let Some(end) = self.settled()? {
                info!(
                    ?end,
                    cycles = self.stats.cycle_count,
                    line = self.machine.core.line_number(),
                    "cycle loop finished"
                );
                return Ok(end);
            }
        }
        warn!(max_ticks, "tick budget exhausted");
        Err(CycleError::TickLimit(max_ticks))
    }

    /// One cycle: advance time, fill from the card, run a slice.
    fn cycle_body(&mut self) {
        if self.interrupt.load(Ordering::Acquire) && !self.interrupt_seen {
            self.interrupt_seen = true;
            self.machine.core.stop_signal().trigger();
        }

        let playback = &mut self.playback;
        self.machine
            .with_io(|core, io| core.fill_from_storage(io, playback));
        self.machine.step(self.tick_us);

        if self.interrupt_seen {
            self.park_on_interrupt();
        }
        self.drive_line_pause();
        self.drive_height_pause();
    }

    /// A P-Stop the core did not honour (unarmed, disabled or homing) is
    /// turned into an operator pause so the run still ends at rest.
    fn park_on_interrupt(&mut self) {
        let core = &self.machine.core;
        if !core.pstop().is_latched() || core.pause_state() != PauseState::None {
            return;
        }
        info!("P-Stop not honoured, requesting pause");
        let settings = &self.machine.settings;
        self.machine.core.pause_with_stored_policy(true, settings);
    }

    fn drive_line_pause(&mut self) {
        let Some(line) = self.pause_at_line else {
            return;
        };
        let core = &mut self.machine.core;
        match self.line_pause {
            LinePause::Waiting if core.line_number() >= line => {
                let settings = &self.machine.settings;
                if core.pause_with_stored_policy(true, settings) {
                    info!(line, "operator pause");
                    self.line_pause = LinePause::Pausing;
                }
            }
            LinePause::Pausing if core.pause_state() == PauseState::Paused => {
                if self.interrupt_seen {
                    return;
                }
                let settings = &self.machine.settings;
                if core.pause_with_stored_policy(false, settings) {
                    info!(line, "operator resume");
                    self.line_pause = LinePause::Done;
                }
            }
            _ => {}
        }
    }

    fn drive_height_pause(&mut self) {
        let core = &mut self.machine.core;
        if !self.height_pause
            || self.interrupt_seen
            || core.pause_height().is_some()
            || core.pause_state() != PauseState::Paused
        {
            return;
        }
        let settings = &self.machine.settings;
        if core.pause_with_stored_policy(false, settings) {
            info!("resuming after pause height");
            self.height_pause = false;
        }
    }

    fn settled(&self) -> Result<Option<CycleOutcome>, CycleError> {
        let core = &self.machine.core;
        let message = core.error_message().unwrap_or("");

        if core.pause_state() == PauseState::Error {
            return Err(CycleError::PauseFault(message));
        }
        if core.build_state() == BuildState::Cancelled {
            if core.storage_error() {
                return Err(CycleError::Storage(message));
            }
            return Ok(Some(CycleOutcome::Cancelled));
        }
        if self.interrupt_seen && core.pause_state() == PauseState::Paused {
            return Ok(Some(CycleOutcome::Interrupted));
        }

        let idle = core.mode() == ExecutionMode::Ready
            && core.pause_state() == PauseState::None
            && core.buffer().is_empty()
            && self.machine.pipeline.is_empty();
        if idle && !self.playback.is_playing() {
            debug!(position = self.playback.position(), "card drained");
            return Ok(Some(CycleOutcome::Finished));
        }
        Ok(None)
    }
}
