//! Opcode dispatch and the fixed-width host commands.

use mb_common::point::{Axis, Point};
use mb_common::protocol::{AxisMask, ButtonBehavior, HostOpcode};
use mb_common::state::BuildState;
use tracing::{debug, info, warn};

use super::Dispatch;
use crate::controller::{Io, MotionController};
use crate::motion::translator::{ExtruderLayout, MoveModifiers, MoveOutcome};
use crate::state::mode::ModeEvent;

/// Bytes following the opcode of `STREAM_VERSION` that the core ignores.
const STREAM_VERSION_RESERVED: usize = 18;

impl<L: ExtruderLayout> MotionController<L> {
    /// Offer the head of the buffer to its handler. Only called in `Ready`.
    pub(crate) fn dispatch_next(&mut self, io: &mut Io<'_>, now: u64) -> Dispatch {
        let Some(byte) = self.buffer.peek(0) else {
            return Dispatch::Deferred;
        };
        let Some(opcode) = HostOpcode::from_u8(byte) else {
            warn!(opcode = byte, line = self.line_number, "unknown opcode dropped");
            self.buffer.skip(1);
            return Dispatch::Dropped;
        };
        if !opcode.is_pipelined() && !io.pipeline.is_empty() {
            return Dispatch::Deferred;
        }
        if self.buffer.len() < opcode.min_len() {
            return Dispatch::Deferred;
        }

        let outcome = match opcode {
            HostOpcode::QueuePointExt
            | HostOpcode::QueuePointNew
            | HostOpcode::QueuePointNewExt => self.queue_point(io, opcode),
            HostOpcode::SetPositionExt => self.set_position(io),
            HostOpcode::Delay => self.delay(now),
            HostOpcode::ChangeTool => {
                self.buffer.pop8();
                let tool = self.buffer.pop8();
                self.translator.change_tool(tool);
                Dispatch::Consumed
            }
            HostOpcode::EnableAxes => {
                self.buffer.pop8();
                let bits = self.buffer.pop8();
                let enable = bits & AxisMask::ENABLE_BIT != 0;
                self.translator
                    .enable_axes(io.pipeline, AxisMask::from_bits_truncate(bits), enable);
                Dispatch::Consumed
            }
            HostOpcode::FindAxesMinimum | HostOpcode::FindAxesMaximum => {
                self.find_axes(io, now, opcode == HostOpcode::FindAxesMaximum)
            }
            HostOpcode::WaitForTool => self.wait_for_tool(now),
            HostOpcode::WaitForPlatform => self.wait_for_platform(now),
            HostOpcode::StoreHomePosition => self.store_home(io),
            HostOpcode::RecallHomePosition => self.recall_home(io),
            HostOpcode::ToolCommand => self.tool_command(io),
            HostOpcode::DisplayMessage => self.display_message(io, now),
            HostOpcode::BuildStartNotification => self.build_start(io),
            HostOpcode::SetRgbLed
            | HostOpcode::SetBeep
            | HostOpcode::PauseForButton
            | HostOpcode::SetBuildPercent
            | HostOpcode::QueueSong
            | HostOpcode::ResetToFactory
            | HostOpcode::BuildEndNotification => self.board_command(io, now, opcode),
            HostOpcode::SetAccelerationToggle => {
                self.buffer.pop8();
                let status = self.buffer.pop8();
                self.translator.set_segment_acceleration(status == 1);
                Dispatch::Consumed
            }
            HostOpcode::StreamVersion => {
                self.buffer.pop8();
                let major = self.buffer.pop8();
                let minor = self.buffer.pop8();
                self.buffer.skip(STREAM_VERSION_RESERVED);
                debug!(major, minor, "stream version");
                Dispatch::Consumed
            }
        };

        if outcome == Dispatch::Consumed {
            self.line_number = self.line_number.saturating_add(1);
        }
        outcome
    }

    // ── Motion ──

    fn queue_point(&mut self, io: &mut Io<'_>, opcode: HostOpcode) -> Dispatch {
        self.buffer.pop8();
        let target = self.pop_point();
        let moved = match opcode {
            HostOpcode::QueuePointExt => {
                let interval_us = self.buffer.pop_i32();
                self.translator.queue_point_absolute(io.pipeline, target, interval_us)
            }
            HostOpcode::QueuePointNew => {
                let duration_us = self.buffer.pop_i32();
                let relative = AxisMask::from_bits_truncate(self.buffer.pop8());
                self.translator
                    .queue_point_timed(io.pipeline, target, duration_us, relative)
            }
            _ => {
                let rate = self.buffer.pop_i32();
                let flags = self.buffer.pop8();
                let distance_mm = self.buffer.pop_f32();
                let feedrate_mult64 = self.buffer.pop_i16();
                self.translator.queue_point_accelerated(
                    io.pipeline,
                    target,
                    rate,
                    AxisMask::from_bits_truncate(flags),
                    MoveModifiers::from_bits_truncate(flags),
                    distance_mm,
                    feedrate_mult64,
                )
            }
        };
        self.after_move(moved);
        Dispatch::Consumed
    }

    fn after_move(&mut self, moved: MoveOutcome) {
        self.pstop.note_motion();
        if moved.fills_pipeline() {
            self.mode.handle_event(ModeEvent::QueueFull);
        }
    }

    fn set_position(&mut self, io: &mut Io<'_>) -> Dispatch {
        self.buffer.pop8();
        let mut position = self.pop_point();
        self.translator.mirror_extruders(&mut position);
        self.translator
            .filament_mut()
            .set_position(position[Axis::A], position[Axis::B]);
        self.translator.define_position(io.pipeline, position, false);
        Dispatch::Consumed
    }

    fn find_axes(&mut self, io: &mut Io<'_>, now: u64, toward_max: bool) -> Dispatch {
        self.buffer.pop8();
        let axes = AxisMask::from_bits_truncate(self.buffer.pop8());
        let us_per_step = self.buffer.pop32();
        let timeout_s = self.buffer.pop16();
        info!(?axes, toward_max, timeout_s, "homing");
        let moved = self
            .translator
            .start_homing(io.pipeline, toward_max, axes, us_per_step);
        self.mode.handle_event(ModeEvent::StartHoming);
        if moved.fills_pipeline() {
            self.mode.handle_event(ModeEvent::QueueFull);
        }
        self.homing.start(now, timeout_s);
        Dispatch::Consumed
    }

    fn store_home(&mut self, io: &mut Io<'_>) -> Dispatch {
        self.buffer.pop8();
        let axes = AxisMask::from_bits_truncate(self.buffer.pop8());
        let position = self.translator.planner_position(io.pipeline);
        for axis in Axis::ALL {
            if axes.contains_index(axis.index()) {
                io.settings.set_home_position(axis, position[axis]);
            }
        }
        Dispatch::Consumed
    }

    fn recall_home(&mut self, io: &mut Io<'_>) -> Dispatch {
        self.buffer.pop8();
        let axes = AxisMask::from_bits_truncate(self.buffer.pop8());
        let mut position = self.translator.planner_position(io.pipeline);
        for axis in Axis::ALL {
            if axes.contains_index(axis.index()) {
                position[axis] = io.settings.home_position(axis);
            }
        }
        self.translator
            .filament_mut()
            .set_position(position[Axis::A], position[Axis::B]);
        self.translator.define_position(io.pipeline, position, true);
        Dispatch::Consumed
    }

    fn pop_point(&mut self) -> Point {
        let mut coords = [0; 5];
        for c in &mut coords {
            *c = self.buffer.pop_i32();
        }
        Point::from_array(coords)
    }

    // ── Waits ──

    fn delay(&mut self, now: u64) -> Dispatch {
        self.buffer.pop8();
        let ms = self.buffer.pop32();
        self.mode.start_delay(now, ms as u64 * 1_000);
        Dispatch::Consumed
    }

    fn wait_for_tool(&mut self, now: u64) -> Dispatch {
        self.buffer.pop8();
        let tool = self.buffer.pop8();
        let _ping_ms = self.buffer.pop16();
        let timeout_s = self.buffer.pop16();
        self.pstop.arm();
        self.wait_tool = tool;
        self.mode.start_tool_wait(now, timeout_s);
        Dispatch::Consumed
    }

    fn wait_for_platform(&mut self, now: u64) -> Dispatch {
        self.buffer.pop8();
        let _tool = self.buffer.pop8();
        let _ping_ms = self.buffer.pop16();
        let timeout_s = self.buffer.pop16();
        self.pstop.arm();
        self.mode.start_platform_wait(now, timeout_s);
        Dispatch::Consumed
    }

    // ── Board and operator panel ──

    fn board_command(&mut self, io: &mut Io<'_>, now: u64, opcode: HostOpcode) -> Dispatch {
        self.buffer.pop8();
        match opcode {
            HostOpcode::SetRgbLed => {
                let (r, g, b) = (self.buffer.pop8(), self.buffer.pop8(), self.buffer.pop8());
                let blink = self.buffer.pop8();
                let _effect = self.buffer.pop8();
                io.board.set_rgb_led(r, g, b, blink);
            }
            HostOpcode::SetBeep => {
                let frequency = self.buffer.pop16();
                let duration_ms = self.buffer.pop16();
                let repeats = self.buffer.pop8();
                io.board.buzz(frequency, duration_ms, repeats);
            }
            HostOpcode::PauseForButton => {
                let mask = self.buffer.pop8();
                let timeout_s = self.buffer.pop16();
                let behavior = ButtonBehavior::from_bits_truncate(self.buffer.pop8());
                if io.board.has_interface() {
                    io.board.wait_for_button(mask);
                    self.mode.start_button_wait(now, timeout_s, behavior);
                }
            }
            HostOpcode::SetBuildPercent => {
                let percent = self.buffer.pop8();
                let _reserved = self.buffer.pop8();
                self.progress.update(percent, io.board.seconds());
            }
            HostOpcode::QueueSong => {
                let song = self.buffer.pop8();
                io.board.queue_song(song);
            }
            HostOpcode::ResetToFactory => {
                let _options = self.buffer.pop8();
                warn!("restoring factory settings");
                io.settings.reset_to_factory();
                io.board.reset();
            }
            HostOpcode::BuildEndNotification => {
                let flags = self.buffer.pop8();
                self.build_state = BuildState::Finished;
                info!(line = self.line_number, "build finished");
                io.board.build_ended(flags);
            }
            _ => {}
        }
        Dispatch::Consumed
    }
}
