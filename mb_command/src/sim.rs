//! Simulated collaborators.
//!
//! Host-side stand-ins for the motion pipeline, toolhead link, board and
//! storage card, plus [`SimMachine`], which wires them to a
//! [`MotionController`]. Used by the simulator binary, the benchmarks and
//! the tests.

pub mod board;
pub mod pipeline;
pub mod playback;
pub mod stream;
pub mod toolhead;

pub use board::{BoardEvent, SimBoard};
pub use pipeline::SimPipeline;
pub use playback::SimPlayback;
pub use stream::StreamBuilder;
pub use toolhead::SimToolhead;

use mb_common::config::MachineConfig;
use mb_common::state::ExecutionMode;

use crate::controller::{Io, MotionController};
use crate::hw::MemorySettings;
use crate::motion::translator::{DualExtruder, ExtruderLayout};

/// A controller and its simulated hardware.
#[derive(Debug)]
pub struct SimMachine<L: ExtruderLayout = DualExtruder> {
    pub pipeline: SimPipeline,
    pub toolhead: SimToolhead,
    pub settings: MemorySettings,
    pub board: SimBoard,
    pub core: MotionController<L>,
}

impl<L: ExtruderLayout> SimMachine<L> {
    /// Fresh machine, controller reset against empty settings.
    pub fn new(config: &MachineConfig) -> Self {
        Self::with_settings(config, MemorySettings::new())
    }

    pub fn with_settings(config: &MachineConfig, settings: MemorySettings) -> Self {
        let mut machine = Self {
            pipeline: SimPipeline::new(config.motion.planner_max_depth),
            toolhead: SimToolhead::new(config.tools.count),
            settings,
            board: SimBoard::new(),
            core: MotionController::new(config),
        };
        machine.reset();
        machine
    }

    /// Run `f` with the controller and its borrowed collaborators.
    pub fn with_io<R>(&mut self, f: impl FnOnce(&mut MotionController<L>, &mut Io<'_>) -> R) -> R {
        let mut io = Io {
            pipeline: &mut self.pipeline,
            toolhead: &mut self.toolhead,
            settings: &mut self.settings,
            board: &mut self.board,
        };
        f(&mut self.core, &mut io)
    }

    /// Job-start reset, re-reading settings.
    pub fn reset(&mut self) {
        self.with_io(|core, io| core.reset(io));
    }

    /// One scheduler slice. Time does not move.
    pub fn tick(&mut self) {
        self.with_io(|core, io| core.run_slice(io));
    }

    /// Append bytes as the host link would. Returns how many fit.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let buffer = self.core.buffer_mut();
        bytes
            .iter()
            .take_while(|&&b| buffer.push(b).is_ok())
            .count()
    }

    /// Advance the clock and the step generator by `us`, then run a slice.
    pub fn step(&mut self, us: u64) {
        self.board.advance(us);
        self.pipeline.advance(us);
        self.tick();
    }

    /// Tick, completing all motion between slices, until the buffer is
    /// drained and the loop is `Ready`, or `max_ticks` run out. Returns the
    /// ticks used.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        for n in 0..max_ticks {
            let settled = self.core.mode() == ExecutionMode::Ready
                && !self.core.pause_state().is_intermediate();
            if settled && self.core.buffer().is_empty() {
                return n;
            }
            self.tick();
            self.pipeline.complete_all();
        }
        max_ticks
    }
}
