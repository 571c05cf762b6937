//! Pause/resume workflow.
//!
//! A pause is a linear walk through [`PauseState`], one stage per tick
//! unless a stage has nothing to wait on:
//!
//! ```text
//! None → EnterDrainPipeline → EnterWaitDrain → EnterRetract → EnterWaitRetract
//!      → EnterClearPlatform → EnterWaitClearPlatform → Paused | Error
//!
//! Paused → ExitStartHeaters → ExitWaitHeaters → ExitReturnPlatform
//!        → ExitWaitReturnPlatform → ExitUnretract → ExitWaitUnretract → None
//! ```
//!
//! Every `Wait` stage holds until the pipeline reports no queued moves;
//! `ExitWaitHeaters` additionally holds until restored heaters are at
//! temperature. Nothing here blocks.
//!
//! [`HeightPause`] lets the operator ask for a single pause once the
//! platform reaches a chosen Z height.
//!
//! Pause moves go through [`MotionTranslator::set_target`] and its
//! accelerated variant, so they bypass filament accounting: a pause and
//! resume with no operator intervention leaves the filament counters
//! and the planner position exactly where they were.

use mb_common::config::{MachineConfig, PauseConfig};
use mb_common::consts::{EXTRUDER_COUNT, FEEDRATE_MULT_SCALE};
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use mb_common::state::{HeaterPolicy, PauseState};
use tracing::{debug, info, warn};

use super::heaters::HeaterSnapshot;
use crate::hw::{MotionPipeline, Toolhead};
use crate::motion::translator::{ExtruderLayout, MotionTranslator};

/// Collaborators a pause stage may act on.
pub struct PauseIo<'a, L: ExtruderLayout> {
    pub translator: &'a mut MotionTranslator<L>,
    pub pipeline: &'a mut dyn MotionPipeline,
    pub toolhead: &'a mut dyn Toolhead,
    /// The pause was forced by a storage fault.
    pub storage_error: bool,
    /// An operator panel can acknowledge an error.
    pub has_interface: bool,
}

/// Chain end points reported to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseEvent {
    /// The enter chain reached `Paused`.
    Paused,
    /// The enter chain reached `Error`.
    Errored,
    /// The exit chain reached `None`.
    Resumed,
}

enum Step {
    /// Run the next stage in the same tick.
    Again,
    /// Come back next tick.
    Yield,
}

/// Pause/resume sequencer.
#[derive(Debug, Clone)]
pub struct PauseWorkflow {
    state: PauseState,
    /// Policy requested with the pause.
    policy: HeaterPolicy,
    heaters: HeaterSnapshot,
    /// Host-coordinate position captured at `EnterRetract`.
    anchor: Point,
    /// Extruder displacement applied by the retraction [steps].
    retraction: Point,
    unretract_pending: bool,
    config: PauseConfig,
    extrude_when_negative: [bool; EXTRUDER_COUNT],
}

impl PauseWorkflow {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            state: PauseState::None,
            policy: HeaterPolicy::default(),
            heaters: HeaterSnapshot::new(),
            anchor: Point::ZERO,
            retraction: Point::ZERO,
            unretract_pending: false,
            config: config.pause,
            extrude_when_negative: config.tools.extrude_when_negative,
        }
    }

    #[inline]
    pub const fn state(&self) -> PauseState {
        self.state
    }

    #[inline]
    pub const fn policy(&self) -> HeaterPolicy {
        self.policy
    }

    #[inline]
    pub const fn heaters(&self) -> &HeaterSnapshot {
        &self.heaters
    }

    /// Position the job resumes at.
    #[inline]
    pub const fn paused_position(&self) -> Point {
        self.anchor
    }

    #[inline]
    pub const fn unretract_pending(&self) -> bool {
        self.unretract_pending
    }

    /// Skip the unretraction on resume (filament was changed while paused).
    pub fn clear_unretract(&mut self) {
        self.unretract_pending = false;
    }

    /// Request a pause (`begin`) or a resume. A begin is honoured only
    /// from `None`; a resume only from `Paused`. Returns whether the
    /// request started a chain.
    pub fn request(&mut self, begin: bool, policy: HeaterPolicy) -> bool {
        match (begin, self.state) {
            (true, PauseState::None) => {
                self.policy = policy;
                self.enter(PauseState::EnterDrainPipeline);
                true
            }
            (false, PauseState::Paused) => {
                self.enter(PauseState::ExitStartHeaters);
                true
            }
            _ => {
                debug!(state = ?self.state, begin, "pause request ignored");
                false
            }
        }
    }

    /// Forget the captured set points, so a resume in flight neither
    /// restores nor waits on them.
    pub fn discard_heater_snapshot(&mut self) {
        self.heaters.clear();
    }

    /// Operator acknowledged an `Error`. The job is abandoned, not resumed.
    pub fn clear_error(&mut self) -> bool {
        if self.state != PauseState::Error {
            return false;
        }
        self.unretract_pending = false;
        self.heaters.clear();
        self.enter(PauseState::None);
        true
    }

    /// Drop any pause state (job reset).
    pub fn reset(&mut self) {
        self.state = PauseState::None;
        self.policy = HeaterPolicy::default();
        self.heaters.clear();
        self.anchor = Point::ZERO;
        self.retraction = Point::ZERO;
        self.unretract_pending = false;
    }

    /// Advance the active chain.
    pub fn tick<L: ExtruderLayout>(&mut self, io: &mut PauseIo<'_, L>) -> Option<PauseEvent> {
        loop {
            let before = self.state;
            let step = self.step(io);
            let event = match (before, self.state) {
                (PauseState::EnterWaitClearPlatform, PauseState::Paused) => Some(PauseEvent::Paused),
                (PauseState::EnterWaitClearPlatform, PauseState::Error) => Some(PauseEvent::Errored),
                (PauseState::ExitWaitUnretract, PauseState::None) => Some(PauseEvent::Resumed),
                _ => None,
            };
            if event.is_some() {
                return event;
            }
            if matches!(step, Step::Yield) {
                return None;
            }
        }
    }

    fn step<L: ExtruderLayout>(&mut self, io: &mut PauseIo<'_, L>) -> Step {
        use PauseState as P;

        match self.state {
            P::EnterDrainPipeline => {
                self.enter(P::EnterWaitDrain);
                Step::Again
            }
            P::EnterWaitDrain => self.after_drain(io, P::EnterRetract),
            P::EnterRetract => {
                self.anchor = io.translator.planner_position(io.pipeline);
                self.retract(io);
                self.enter(P::EnterWaitRetract);
                Step::Yield
            }
            P::EnterWaitRetract => self.after_drain(io, P::EnterClearPlatform),
            P::EnterClearPlatform => {
                self.clear_platform(io);
                if self.policy.suspends_any() {
                    self.heaters
                        .suspend(io.toolhead, io.translator.tool_count(), self.policy);
                }
                self.set_fans(io, false);
                self.enter(P::EnterWaitClearPlatform);
                Step::Yield
            }
            P::EnterWaitClearPlatform => {
                if !io.pipeline.is_empty() {
                    return Step::Yield;
                }
                if io.storage_error && io.has_interface {
                    self.enter(P::Error);
                } else {
                    self.enter(P::Paused);
                }
                Step::Yield
            }
            P::ExitStartHeaters => {
                if self.heaters.is_suspended() {
                    self.heaters.restore(io.toolhead);
                    self.set_fans(io, true);
                }
                self.enter(P::ExitWaitHeaters);
                Step::Again
            }
            P::ExitWaitHeaters => {
                if self.heaters.at_temperature(io.toolhead) {
                    self.enter(P::ExitReturnPlatform);
                    Step::Again
                } else {
                    Step::Yield
                }
            }
            P::ExitReturnPlatform => {
                self.return_platform(io);
                self.enter(P::ExitWaitReturnPlatform);
                Step::Yield
            }
            P::ExitWaitReturnPlatform => self.after_drain(io, P::ExitUnretract),
            P::ExitUnretract => {
                if self.unretract_pending {
                    let interval = self.retract_interval_us(io.translator);
                    io.translator.set_target(io.pipeline, self.anchor, interval);
                    self.unretract_pending = false;
                }
                self.enter(P::ExitWaitUnretract);
                Step::Yield
            }
            P::ExitWaitUnretract => {
                if io.pipeline.is_empty() {
                    self.heaters.clear();
                    self.enter(P::None);
                }
                Step::Yield
            }
            P::None | P::Paused | P::Error => Step::Yield,
        }
    }

    // ── Stages ──

    fn after_drain<L: ExtruderLayout>(&mut self, io: &PauseIo<'_, L>, next: PauseState) -> Step {
        if io.pipeline.is_empty() {
            self.enter(next);
            Step::Again
        } else {
            Step::Yield
        }
    }

    fn retract<L: ExtruderLayout>(&mut self, io: &mut PauseIo<'_, L>) {
        let tools = io.translator.tool_count() as usize;
        let mut delta = Point::ZERO;
        for e in 0..tools.min(EXTRUDER_COUNT) {
            let axis = Axis::extruder(e);
            let steps = io.translator.mm_to_steps(axis, self.config.retract_mm);
            // Retracting pulls filament back: the opposite of extruding.
            let sign = if self.extrude_when_negative[e] { 1 } else { -1 };
            delta[axis] = sign * steps;
        }
        let mut target = self.anchor + delta;
        io.translator.mirror_extruders(&mut target);
        self.retraction = target - self.anchor;

        let interval = self.retract_interval_us(io.translator);
        io.translator.set_target(io.pipeline, target, interval);
        self.unretract_pending = true;
        debug!(a = self.retraction[Axis::A], b = self.retraction[Axis::B], "retract");
    }

    fn clear_platform<L: ExtruderLayout>(&mut self, io: &mut PauseIo<'_, L>) {
        if !io.translator.cartesian_referenced() {
            warn!("position not referenced, platform stays in place");
            return;
        }
        let from = io.translator.planner_position(io.pipeline);
        let z = io.translator.axis_config(Axis::Z);
        let default_z = z.max_steps - z.mm_to_steps(self.config.clear_margin_mm);

        let mut target = from;
        if let Some(x) = self.config.clear_x {
            target[Axis::X] = x;
        }
        if let Some(y) = self.config.clear_y {
            target[Axis::Y] = y;
        }
        target[Axis::Z] = self.config.clear_z.unwrap_or(default_z);

        self.cartesian_move(io, from, target);
    }

    fn return_platform<L: ExtruderLayout>(&mut self, io: &mut PauseIo<'_, L>) {
        // Whatever the operator extruded while paused is forgotten: the
        // extruders are redefined to the retracted anchor.
        let here = io.translator.planner_position(io.pipeline);
        let mut extruders = self.anchor;
        if self.unretract_pending {
            extruders = extruders + self.retraction;
        }
        let position = extruders.with_cartesian_of(&here);
        io.translator.define_position(io.pipeline, position, false);
        self.cartesian_move(io, position, extruders);
    }

    /// XYZ move at the Z feed rate, for parking and returning.
    fn cartesian_move<L: ExtruderLayout>(&self, io: &mut PauseIo<'_, L>, from: Point, to: Point) {
        let mut sum = 0.0f32;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let cfg = io.translator.axis_config(axis);
            let mm = cfg.steps_to_mm(to[axis] as i64 - from[axis] as i64);
            sum += mm * mm;
        }
        let distance = sum.sqrt();

        let z = io.translator.axis_config(Axis::Z);
        let rate = (z.max_feedrate * z.steps_per_mm) as i32;
        let feed = (z.max_feedrate * FEEDRATE_MULT_SCALE).min(i16::MAX as f32) as i16;
        io.translator
            .set_target_accelerated(io.pipeline, to, rate, AxisMask::empty(), distance, feed);
    }

    fn set_fans<L: ExtruderLayout>(&self, io: &mut PauseIo<'_, L>, on: bool) {
        let tool = io.translator.tool();
        if let Err(e) = io.toolhead.set_fan(tool, on) {
            warn!(error = %e, tool, "fan command failed");
        }
        if io.translator.ditto() {
            let other = tool ^ 1;
            if let Err(e) = io.toolhead.set_fan(other, on) {
                warn!(error = %e, tool = other, "fan command failed");
            }
        }
    }

    fn retract_interval_us<L: ExtruderLayout>(&self, translator: &MotionTranslator<L>) -> i32 {
        let steps_per_s = self.config.retract_feedrate * translator.axis_config(Axis::A).steps_per_mm;
        if steps_per_s <= 0.0 {
            return i32::MAX;
        }
        (1_000_000.0 / steps_per_s).max(1.0) as i32
    }

    fn enter(&mut self, next: PauseState) {
        if next != self.state {
            info!(from = ?self.state, to = ?next, "pause state");
        }
        self.state = next;
    }
}

// ─── Pause at Height ────────────────────────────────────────────────

/// One-shot pause at a Z height [steps, host coordinates].
///
/// The trigger arms only while Z is below the height, so setting it while
/// already above (or while homing toward Z max) waits for Z to come back
/// down before it can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeightPause {
    target: Option<i32>,
    armed: bool,
}

impl HeightPause {
    pub const fn new() -> Self {
        Self {
            target: None,
            armed: false,
        }
    }

    #[inline]
    pub const fn target(&self) -> Option<i32> {
        self.target
    }

    /// Set or clear the height. `current_z` is the last queued Z.
    pub fn set(&mut self, target: Option<i32>, current_z: i32) {
        self.target = target;
        self.armed = target.is_some_and(|z| current_z < z);
    }

    /// Observe the last queued Z. Returns `true`, and forgets the height,
    /// when the job should pause now.
    pub fn check(&mut self, current_z: i32, can_pause: bool) -> bool {
        let Some(z) = self.target else {
            return false;
        };
        if current_z < z {
            self.armed = true;
            return false;
        }
        if self.armed && can_pause {
            self.set(None, current_z);
            return true;
        }
        false
    }
}
