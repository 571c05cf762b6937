//! Motion pipeline interface.
//!
//! The pipeline turns submitted targets into step pulses. Its queue state
//! and the live hardware position are written from the step interrupt;
//! implementations must return them through interrupt-safe reads (see
//! [`crate::hw::IsrCell`]).

use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;

/// One move handed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    /// Absolute target in machine steps, toolhead offset included.
    pub target: Point,
    /// Absolute per-axis step counts of this move.
    pub steps: Point,
    /// Axis with the largest step count; its count sets the move length.
    pub master_axis: Axis,
    /// Master-axis step rate [steps/s].
    pub rate: u32,
    /// Tool the move extrudes with.
    pub tool: u8,
    /// Apply acceleration planning to this move.
    pub accelerate: bool,
    /// Cartesian length of the move [mm]; 0.0 when the host did not supply it.
    pub distance_mm: f32,
    /// Requested feed rate [mm/s], only for accelerated moves.
    pub feedrate: f32,
}

impl MotionRequest {
    #[inline]
    pub fn master_steps(&self) -> u32 {
        self.steps[self.master_axis].unsigned_abs()
    }
}

/// Lower-level step pipeline consumed by the command core.
pub trait MotionPipeline {
    /// Queue a move. The pipeline's last queued position becomes `request.target`.
    fn submit(&mut self, request: MotionRequest);

    /// Number of moves queued and not yet completed.
    fn queue_depth(&self) -> u8;

    /// Busy: a homing move is in flight or the queue was full at the last
    /// submit. Cleared from interrupt context.
    fn is_running(&self) -> bool;

    /// No moves outstanding.
    fn is_empty(&self) -> bool {
        self.queue_depth() == 0
    }

    /// Target of the most recently queued move, in machine steps.
    fn last_queued_position(&self) -> Point;

    /// Live hardware position, in machine steps.
    fn current_position(&self) -> Point;

    /// Drop every queued move and resynchronise the queued position with
    /// the hardware position.
    fn discard_all(&mut self);

    /// Declare the machine to be at `point` (machine steps).
    fn define_position(&mut self, point: Point, is_home: bool);

    /// Mark `axes` as homing. The next submitted move is the homing move and
    /// each marked axis stops at its endstop.
    fn start_homing(&mut self, axes: AxisMask);

    fn enable_axis(&mut self, axis: Axis, enable: bool);

    /// A move with no net motion was accepted and dropped.
    fn retire_noop(&mut self) {}
}
