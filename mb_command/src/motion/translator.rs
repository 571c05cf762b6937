//! Motion target translator.
//!
//! Turns decoded move commands (host coordinates, optionally per-axis
//! relative) into offset-corrected machine targets for the pipeline:
//!
//! 1. Mirror the active extruder onto the idle one when ditto printing.
//! 2. Account filament usage in host coordinates.
//! 3. Add the active tool's offset to absolute axes; add relative axes to
//!    the last queued position.
//! 4. Optionally clip Z to its travel limit.
//! 5. Pick the master axis (largest absolute delta, first axis wins ties)
//!    and derive the step rate.
//! 6. Submit, then report whether the pipeline is now full.
//!
//! Accelerated host moves are also scaled by the operator's build speed
//! factor. Moves the core generates itself (pause parking, retraction,
//! homing) never are.

use core::marker::PhantomData;

use bitflags::bitflags;
use mb_common::config::{AxisConfig, MachineConfig};
use mb_common::consts::{
    FEEDRATE_MULT_SCALE, HOMING_POSITION_NEGATIVE, HOMING_POSITION_POSITIVE, STEPPER_COUNT,
};
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use tracing::debug;

use super::filament::FilamentCounters;
use super::offsets::{OffsetScale, ToolOffsets};
use crate::hw::{MotionPipeline, MotionRequest, SettingsStore};

// ─── Extruder Capability ────────────────────────────────────────────

/// Number of physically fitted extruders, fixed at build configuration.
pub trait ExtruderLayout {
    const EXTRUDERS: usize;

    #[inline]
    fn is_dual() -> bool {
        Self::EXTRUDERS > 1
    }
}

/// Single-extruder machine: no offsets, no ditto printing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleExtruder;

impl ExtruderLayout for SingleExtruder {
    const EXTRUDERS: usize = 1;
}

/// Dual-extruder machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DualExtruder;

impl ExtruderLayout for DualExtruder {
    const EXTRUDERS: usize = 2;
}

// ─── Move Planning ──────────────────────────────────────────────────

bitflags! {
    /// Bits above the relative-axis bits of an accelerated move's flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MoveModifiers: u8 {
        /// Scale rate and feed rate by the build speed factor.
        const SPEED_CONTROL = 0x80;
    }
}

/// Slowest and fastest build speed factor an operator can select.
pub const SPEED_FACTOR_RANGE: (f32, f32) = (0.1, 5.0);

/// Outcome of a translated move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No net motion; nothing was queued.
    Skipped,
    /// Queued with room to spare.
    Queued,
    /// Queued and the pipeline is now at its configured depth.
    QueueFull,
}

impl MoveOutcome {
    #[inline]
    pub const fn fills_pipeline(&self) -> bool {
        matches!(self, Self::QueueFull)
    }
}

/// Per-axis step counts and master axis of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub steps: Point,
    pub master_axis: Axis,
    pub master_steps: u32,
}

impl MovePlan {
    /// Plan the move `from → to`. `None` when no axis moves.
    ///
    /// The master axis is the first axis (X, Y, Z, A, B order) whose
    /// absolute delta is strictly the largest.
    pub fn between(from: &Point, to: &Point) -> Option<Self> {
        let mut steps = Point::ZERO;
        let mut master_axis = Axis::X;
        let mut master_steps = 0u32;
        for axis in Axis::ALL {
            let delta = (to[axis] as i64 - from[axis] as i64).unsigned_abs();
            let delta = delta.min(i32::MAX as u64) as u32;
            steps[axis] = delta as i32;
            if delta > master_steps {
                master_axis = axis;
                master_steps = delta;
            }
        }
        (master_steps > 0).then_some(Self {
            steps,
            master_axis,
            master_steps,
        })
    }
}

// ─── Translator ─────────────────────────────────────────────────────

/// Host-to-machine move translation and filament accounting.
#[derive(Debug, Clone)]
pub struct MotionTranslator<L: ExtruderLayout = DualExtruder> {
    axes: [AxisConfig; STEPPER_COUNT],
    clip_z: bool,
    max_depth: u8,
    tool_count: u8,
    scale: OffsetScale,
    offsets: ToolOffsets,
    tool: u8,
    ditto: bool,
    /// Acceleration enabled in persisted settings.
    acceleration: bool,
    /// Acceleration currently allowed for segments (off while homing).
    segment_acceleration: bool,
    /// Operator build speed factor; 1.0 leaves moves as sent.
    speed_factor: f32,
    filament: FilamentCounters,
    /// Axes whose position has been defined since boot.
    defined: AxisMask,
    /// Axes that have run a homing move since boot.
    homed: AxisMask,
    _layout: PhantomData<L>,
}

impl<L: ExtruderLayout> MotionTranslator<L> {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            axes: config.axes,
            clip_z: config.motion.clip_z,
            max_depth: config.motion.planner_max_depth,
            tool_count: config.tools.count.min(L::EXTRUDERS as u8),
            scale: OffsetScale::from_config(config),
            offsets: ToolOffsets::ZERO,
            tool: 0,
            ditto: false,
            acceleration: true,
            segment_acceleration: true,
            speed_factor: 1.0,
            filament: FilamentCounters::new(),
            defined: AxisMask::empty(),
            homed: AxisMask::empty(),
            _layout: PhantomData,
        }
    }

    /// Job-start reset: reload offsets, ditto and acceleration from
    /// settings, clear the filament counters and return to normal speed.
    pub fn reset(&mut self, settings: &dyn SettingsStore) {
        let dual = L::is_dual() && self.tool_count == 2;
        self.offsets = if dual {
            let (x, y) = settings.toolhead_offset_raw();
            ToolOffsets::derive(x, y, settings.offset_encoding(), self.scale)
        } else {
            ToolOffsets::ZERO
        };
        self.ditto = dual && settings.ditto_enabled();
        self.acceleration = settings.acceleration_enabled();
        self.segment_acceleration = self.acceleration;
        self.speed_factor = 1.0;
        self.filament.reset();
    }

    // ── Accessors ──

    #[inline]
    pub const fn tool(&self) -> u8 {
        self.tool
    }

    #[inline]
    pub const fn ditto(&self) -> bool {
        self.ditto
    }

    #[inline]
    pub const fn tool_count(&self) -> u8 {
        self.tool_count
    }

    #[inline]
    pub const fn offsets(&self) -> &ToolOffsets {
        &self.offsets
    }

    #[inline]
    pub const fn filament(&self) -> &FilamentCounters {
        &self.filament
    }

    #[inline]
    pub fn filament_mut(&mut self) -> &mut FilamentCounters {
        &mut self.filament
    }

    #[inline]
    pub fn axis_config(&self, axis: Axis) -> &AxisConfig {
        &self.axes[axis.index()]
    }

    #[inline]
    pub fn mm_to_steps(&self, axis: Axis, mm: f32) -> i32 {
        self.axes[axis.index()].mm_to_steps(mm)
    }

    #[inline]
    pub const fn segment_acceleration(&self) -> bool {
        self.segment_acceleration
    }

    #[inline]
    pub const fn speed_factor(&self) -> f32 {
        self.speed_factor
    }

    /// Speed control the operator has switched on for every host move.
    fn speed_modifiers(&self) -> MoveModifiers {
        if self.speed_factor != 1.0 {
            MoveModifiers::SPEED_CONTROL
        } else {
            MoveModifiers::empty()
        }
    }

    /// Every cartesian axis has a defined position and has been homed.
    pub fn cartesian_referenced(&self) -> bool {
        self.defined.contains(AxisMask::CARTESIAN) && self.homed.contains(AxisMask::CARTESIAN)
    }

    /// Last queued position in host coordinates (active tool offset removed).
    pub fn planner_position(&self, pipeline: &dyn MotionPipeline) -> Point {
        pipeline.last_queued_position() - self.offsets.for_tool(self.tool)
    }

    // ── Machine state ──

    pub fn change_tool(&mut self, tool: u8) {
        self.tool = if L::is_dual() { tool % 2 } else { 0 };
    }

    pub fn set_segment_acceleration(&mut self, on: bool) {
        self.segment_acceleration = on && self.acceleration;
    }

    /// Select the build speed factor for accelerated host moves queued from
    /// now on. Clamped to [`SPEED_FACTOR_RANGE`]; returns the value in use.
    pub fn set_speed_factor(&mut self, factor: f32) -> f32 {
        let (min, max) = SPEED_FACTOR_RANGE;
        self.speed_factor = if factor.is_nan() { 1.0 } else { factor.clamp(min, max) };
        debug!(factor = self.speed_factor, "build speed");
        self.speed_factor
    }

    /// Declare the machine to be at `position`. Home definitions are
    /// already in machine coordinates; anything else gets the tool offset.
    pub fn define_position(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        position: Point,
        is_home: bool,
    ) {
        let machine = if is_home {
            position
        } else {
            position + self.offsets.for_tool(self.tool)
        };
        self.defined = AxisMask::all();
        pipeline.define_position(machine, is_home);
    }

    pub fn enable_axes(&self, pipeline: &mut dyn MotionPipeline, mask: AxisMask, enable: bool) {
        let mask = if self.ditto {
            mask.mirror_extruders(self.tool)
        } else {
            mask
        };
        for axis in Axis::ALL {
            if mask.contains_index(axis.index()) {
                pipeline.enable_axis(axis, enable);
            }
        }
    }

    /// Copy the active extruder's coordinate onto the idle one.
    pub fn mirror_extruders(&self, target: &mut Point) {
        if !self.ditto {
            return;
        }
        if self.tool == 0 {
            target[Axis::B] = target[Axis::A];
        } else {
            target[Axis::A] = target[Axis::B];
        }
    }

    fn mirror_command(&self, target: &mut Point, relative: &mut AxisMask) {
        if self.ditto {
            self.mirror_extruders(target);
            *relative = relative.mirror_extruders(self.tool);
        }
    }

    // ── Host move commands ──

    /// Absolute target at a fixed master-axis step interval [µs].
    pub fn queue_point_absolute(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        mut target: Point,
        interval_us: i32,
    ) -> MoveOutcome {
        let mut relative = AxisMask::empty();
        self.mirror_command(&mut target, &mut relative);
        self.filament.record(&target, relative);
        self.set_target(pipeline, target, interval_us)
    }

    /// Absolute-or-relative target completing in `duration_us`.
    pub fn queue_point_timed(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        mut target: Point,
        duration_us: i32,
        mut relative: AxisMask,
    ) -> MoveOutcome {
        self.mirror_command(&mut target, &mut relative);
        self.filament.record(&target, relative);
        self.set_target_timed(pipeline, target, duration_us, relative)
    }

    /// Absolute-or-relative target with explicit rate, distance and feed
    /// rate (×64 fixed point) for accelerated planning. A speed factor other
    /// than 1.0 applies whether or not the move asks for speed control.
    #[allow(clippy::too_many_arguments)]
    pub fn queue_point_accelerated(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        mut target: Point,
        rate: i32,
        mut relative: AxisMask,
        modifiers: MoveModifiers,
        distance_mm: f32,
        feedrate_mult64: i16,
    ) -> MoveOutcome {
        self.mirror_command(&mut target, &mut relative);
        self.filament.record(&target, relative);
        let speed = if (modifiers | self.speed_modifiers()).contains(MoveModifiers::SPEED_CONTROL) {
            self.speed_factor
        } else {
            1.0
        };
        self.accelerated(pipeline, target, rate, relative, distance_mm, feedrate_mult64, speed)
    }

    // ── Pipeline submission ──

    /// Move to host-coordinate `target` with a fixed master-axis step
    /// interval. Bypasses ditto mirroring and filament accounting.
    pub fn set_target(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        target: Point,
        interval_us: i32,
    ) -> MoveOutcome {
        let (machine, plan) = match self.plan(pipeline, &target, AxisMask::empty()) {
            Some(planned) => planned,
            None => return Self::skip(pipeline),
        };
        let rate = 1_000_000 / interval_us.max(1) as u32;
        self.submit(pipeline, machine, plan, rate, false, 0.0, 0.0)
    }

    /// Move with the step interval derived from the total duration.
    pub fn set_target_timed(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        target: Point,
        duration_us: i32,
        relative: AxisMask,
    ) -> MoveOutcome {
        let (machine, plan) = match self.plan(pipeline, &target, relative) {
            Some(planned) => planned,
            None => return Self::skip(pipeline),
        };
        let interval = (duration_us.max(0) as u32 / plan.master_steps).max(1);
        let rate = 1_000_000 / interval;
        self.submit(pipeline, machine, plan, rate, false, 0.0, 0.0)
    }

    /// Move with an explicit rate, for acceleration-aware planning. Runs at
    /// the rate given, whatever the build speed factor.
    pub fn set_target_accelerated(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        target: Point,
        rate: i32,
        relative: AxisMask,
        distance_mm: f32,
        feedrate_mult64: i16,
    ) -> MoveOutcome {
        self.accelerated(pipeline, target, rate, relative, distance_mm, feedrate_mult64, 1.0)
    }

    #[allow(clippy::too_many_arguments)]
    fn accelerated(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        target: Point,
        rate: i32,
        relative: AxisMask,
        distance_mm: f32,
        feedrate_mult64: i16,
        speed: f32,
    ) -> MoveOutcome {
        let (machine, plan) = match self.plan(pipeline, &target, relative) {
            Some(planned) if distance_mm != 0.0 => planned,
            _ => return Self::skip(pipeline),
        };
        let mut rate = rate.max(0) as u32;
        let mut feedrate = 0.0;
        if self.acceleration {
            feedrate = feedrate_mult64 as f32 / FEEDRATE_MULT_SCALE;
            if speed != 1.0 {
                feedrate *= speed;
                rate = (rate as f32 * speed) as u32;
            }
        }
        let accelerate = self.acceleration && self.segment_acceleration;
        self.submit(pipeline, machine, plan, rate, accelerate, distance_mm, feedrate)
    }

    /// Drive every axis in `axes` toward its travel limit at
    /// `us_per_step`. Segment acceleration stays off until the homing
    /// move is finished or aborted.
    pub fn start_homing(
        &mut self,
        pipeline: &mut dyn MotionPipeline,
        toward_max: bool,
        axes: AxisMask,
        us_per_step: u32,
    ) -> MoveOutcome {
        self.segment_acceleration = false;
        let sentinel = if toward_max {
            HOMING_POSITION_POSITIVE
        } else {
            HOMING_POSITION_NEGATIVE
        };
        let mut target = pipeline.current_position() - self.offsets.for_tool(self.tool);
        for axis in Axis::ALL {
            if axes.contains_index(axis.index()) {
                target[axis] = sentinel;
            }
        }
        self.homed |= axes;
        pipeline.start_homing(axes);
        self.set_target(pipeline, target, us_per_step.min(i32::MAX as u32) as i32)
    }

    /// Homing finished or was aborted: drop anything in flight, resync and
    /// restore segment acceleration.
    pub fn end_homing(&mut self, pipeline: &mut dyn MotionPipeline) {
        pipeline.discard_all();
        self.segment_acceleration = self.acceleration;
    }

    fn plan(
        &self,
        pipeline: &dyn MotionPipeline,
        target: &Point,
        relative: AxisMask,
    ) -> Option<(Point, MovePlan)> {
        let last = pipeline.last_queued_position();
        let offset = self.offsets.for_tool(self.tool);
        let mut machine = Point::ZERO;
        for i in 0..STEPPER_COUNT {
            machine[i] = if relative.contains_index(i) {
                last[i].wrapping_add(target[i])
            } else {
                target[i].wrapping_add(offset[i])
            };
        }
        if self.clip_z {
            let z_max = self.axes[Axis::Z.index()].max_steps;
            machine[Axis::Z] = machine[Axis::Z].min(z_max);
        }
        MovePlan::between(&last, &machine).map(|plan| (machine, plan))
    }

    fn skip(pipeline: &mut dyn MotionPipeline) -> MoveOutcome {
        pipeline.retire_noop();
        MoveOutcome::Skipped
    }

    #[allow(clippy::too_many_arguments)]
    fn submit(
        &self,
        pipeline: &mut dyn MotionPipeline,
        machine: Point,
        plan: MovePlan,
        rate: u32,
        accelerate: bool,
        distance_mm: f32,
        feedrate: f32,
    ) -> MoveOutcome {
        debug!(
            master = plan.master_axis.label(),
            steps = plan.master_steps,
            rate,
            accelerate,
            "queue move"
        );
        pipeline.submit(MotionRequest {
            target: machine,
            steps: plan.steps,
            master_axis: plan.master_axis,
            rate,
            tool: self.tool,
            accelerate,
            distance_mm,
            feedrate,
        });
        if pipeline.queue_depth() >= self.max_depth {
            MoveOutcome::QueueFull
        } else {
            MoveOutcome::Queued
        }
    }
}
