//! Simulated motion pipeline.
//!
//! Moves queue without executing until time is advanced with
//! [`SimPipeline::advance`] or the queue is drained with
//! [`SimPipeline::complete_all`]. Each move lasts `master_steps / rate`
//! seconds. The live position and the running flag sit in [`IsrCell`]s
//! as they would on hardware, where the step interrupt writes them.

use std::collections::VecDeque;

use mb_common::consts::STEPPER_COUNT;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use tracing::trace;

use crate::hw::{IsrCell, MotionPipeline, MotionRequest};

/// Time into a homing move at which the endstops trip [µs].
pub const ENDSTOP_TRIP_US: u64 = 1_000_000;

#[derive(Debug)]
pub struct SimPipeline {
    max_depth: u8,
    queue: VecDeque<MotionRequest>,
    /// Time already spent on the front move [µs].
    front_elapsed_us: u64,
    last_queued: Point,
    position: IsrCell<Point>,
    running: IsrCell<bool>,
    /// Axes of the homing move, while one is queued.
    homing: Option<AxisMask>,
    enabled: [bool; STEPPER_COUNT],
    submitted: Vec<MotionRequest>,
    retired_noops: usize,
}

impl SimPipeline {
    pub fn new(max_depth: u8) -> Self {
        Self {
            max_depth,
            queue: VecDeque::new(),
            front_elapsed_us: 0,
            last_queued: Point::ZERO,
            position: IsrCell::new(Point::ZERO),
            running: IsrCell::new(false),
            homing: None,
            enabled: [false; STEPPER_COUNT],
            submitted: Vec::new(),
            retired_noops: 0,
        }
    }

    /// Every move ever submitted, oldest first.
    pub fn submitted(&self) -> &[MotionRequest] {
        &self.submitted
    }

    pub fn retired_noops(&self) -> usize {
        self.retired_noops
    }

    pub fn is_enabled(&self, axis: Axis) -> bool {
        self.enabled[axis.index()]
    }

    pub fn is_homing(&self) -> bool {
        self.homing.is_some()
    }

    /// Run the step generator for `elapsed_us`.
    pub fn advance(&mut self, elapsed_us: u64) {
        let mut budget = self.front_elapsed_us + elapsed_us;
        while let Some(front) = self.queue.front() {
            let duration = self.duration_us(front);
            if budget < duration {
                break;
            }
            budget -= duration;
            self.finish_front();
        }
        self.front_elapsed_us = if self.queue.is_empty() { 0 } else { budget };
        self.update_running();
    }

    /// Finish every queued move immediately.
    pub fn complete_all(&mut self) {
        while !self.queue.is_empty() {
            self.finish_front();
        }
        self.front_elapsed_us = 0;
        self.update_running();
    }

    /// Trip the endstops of the homing move in flight.
    pub fn hit_endstops(&mut self) {
        if self.homing.is_some() && !self.queue.is_empty() {
            self.finish_front();
            self.front_elapsed_us = 0;
            self.update_running();
        }
    }

    fn duration_us(&self, request: &MotionRequest) -> u64 {
        if self.homing.is_some() {
            return ENDSTOP_TRIP_US;
        }
        let rate = request.rate.max(1) as u64;
        request.master_steps() as u64 * 1_000_000 / rate
    }

    fn finish_front(&mut self) {
        let Some(request) = self.queue.pop_front() else {
            return;
        };
        let mut reached = request.target;
        if let Some(axes) = self.homing.take() {
            // homed axes stop where the switch is: the sim puts it at the origin
            let here = self.position.load();
            for axis in Axis::ALL {
                reached[axis] = if axes.contains_index(axis.index()) {
                    0
                } else {
                    here[axis]
                };
            }
        }
        trace!(?reached, "move complete");
        self.position.store(reached);
    }

    fn update_running(&self) {
        let full = self.queue.len() >= self.max_depth as usize;
        self.running.store(self.homing.is_some() || full);
    }
}

impl MotionPipeline for SimPipeline {
    fn submit(&mut self, request: MotionRequest) {
        self.last_queued = request.target;
        self.submitted.push(request);
        self.queue.push_back(request);
        self.update_running();
    }

    fn queue_depth(&self) -> u8 {
        self.queue.len().min(u8::MAX as usize) as u8
    }

    fn is_running(&self) -> bool {
        self.running.load()
    }

    fn last_queued_position(&self) -> Point {
        self.last_queued
    }

    fn current_position(&self) -> Point {
        self.position.load()
    }

    fn discard_all(&mut self) {
        self.queue.clear();
        self.homing = None;
        self.front_elapsed_us = 0;
        self.last_queued = self.position.load();
        self.update_running();
    }

    fn define_position(&mut self, point: Point, _is_home: bool) {
        self.last_queued = point;
        self.position.store(point);
    }

    fn start_homing(&mut self, axes: AxisMask) {
        self.homing = Some(axes);
        self.update_running();
    }

    fn enable_axis(&mut self, axis: Axis, enable: bool) {
        self.enabled[axis.index()] = enable;
    }

    fn retire_noop(&mut self) {
        self.retired_noops += 1;
    }
}
