//! Command stream encoder.
//!
//! Builds wire-format byte streams for tests, benchmarks and the
//! simulator's demo job.

use mb_common::point::Point;
use mb_common::protocol::{AxisMask, ButtonBehavior, HostOpcode, MessageOptions, ToolOpcode};

use crate::motion::MoveModifiers;

#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    bytes: Vec<u8>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append raw bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn op(mut self, opcode: HostOpcode) -> Self {
        self.bytes.push(opcode as u8);
        self
    }

    fn u8(mut self, v: u8) -> Self {
        self.bytes.push(v);
        self
    }

    fn u16(mut self, v: u16) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn i32(self, v: i32) -> Self {
        self.u32(v as u32)
    }

    fn point(self, p: Point) -> Self {
        p.iter().fold(self, |b, &c| b.i32(c))
    }

    fn text(mut self, s: &str) -> Self {
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self
    }

    // ── Motion ──

    pub fn queue_point_ext(self, target: Point, interval_us: i32) -> Self {
        self.op(HostOpcode::QueuePointExt).point(target).i32(interval_us)
    }

    pub fn queue_point_new(self, target: Point, duration_us: i32, relative: AxisMask) -> Self {
        self.op(HostOpcode::QueuePointNew)
            .point(target)
            .i32(duration_us)
            .u8(relative.bits())
    }

    pub fn queue_point_new_ext(
        self,
        target: Point,
        rate: i32,
        relative: AxisMask,
        modifiers: MoveModifiers,
        distance_mm: f32,
        feedrate_mult64: i16,
    ) -> Self {
        self.op(HostOpcode::QueuePointNewExt)
            .point(target)
            .i32(rate)
            .u8(relative.bits() | modifiers.bits())
            .u32(distance_mm.to_bits())
            .u16(feedrate_mult64 as u16)
    }

    pub fn set_position(self, position: Point) -> Self {
        self.op(HostOpcode::SetPositionExt).point(position)
    }

    pub fn find_axes(self, toward_max: bool, axes: AxisMask, us_per_step: u32, timeout_s: u16) -> Self {
        let op = if toward_max {
            HostOpcode::FindAxesMaximum
        } else {
            HostOpcode::FindAxesMinimum
        };
        self.op(op).u8(axes.bits()).u32(us_per_step).u16(timeout_s)
    }

    pub fn enable_axes(self, axes: AxisMask, enable: bool) -> Self {
        let bits = axes.bits() | if enable { AxisMask::ENABLE_BIT } else { 0 };
        self.op(HostOpcode::EnableAxes).u8(bits)
    }

    pub fn change_tool(self, tool: u8) -> Self {
        self.op(HostOpcode::ChangeTool).u8(tool)
    }

    pub fn store_home(self, axes: AxisMask) -> Self {
        self.op(HostOpcode::StoreHomePosition).u8(axes.bits())
    }

    pub fn recall_home(self, axes: AxisMask) -> Self {
        self.op(HostOpcode::RecallHomePosition).u8(axes.bits())
    }

    pub fn acceleration(self, on: bool) -> Self {
        self.op(HostOpcode::SetAccelerationToggle).u8(on as u8)
    }

    // ── Waits ──

    pub fn delay(self, ms: u32) -> Self {
        self.op(HostOpcode::Delay).u32(ms)
    }

    pub fn wait_for_tool(self, tool: u8, timeout_s: u16) -> Self {
        self.op(HostOpcode::WaitForTool).u8(tool).u16(100).u16(timeout_s)
    }

    pub fn wait_for_platform(self, timeout_s: u16) -> Self {
        self.op(HostOpcode::WaitForPlatform).u8(0).u16(100).u16(timeout_s)
    }

    pub fn pause_for_button(self, mask: u8, timeout_s: u16, behavior: ButtonBehavior) -> Self {
        self.op(HostOpcode::PauseForButton)
            .u8(mask)
            .u16(timeout_s)
            .u8(behavior.bits())
    }

    // ── Toolhead ──

    pub fn tool_command(self, tool: u8, code: u8, payload: &[u8]) -> Self {
        self.op(HostOpcode::ToolCommand)
            .u8(tool)
            .u8(code)
            .u8(payload.len() as u8)
            .raw(payload)
    }

    pub fn set_temperature(self, tool: u8, celsius: u16) -> Self {
        self.tool_command(tool, ToolOpcode::SetTemp as u8, &celsius.to_le_bytes())
    }

    pub fn set_platform_temperature(self, celsius: u16) -> Self {
        self.tool_command(0, ToolOpcode::SetPlatformTemp as u8, &celsius.to_le_bytes())
    }

    pub fn fan(self, tool: u8, on: bool) -> Self {
        self.tool_command(tool, ToolOpcode::ToggleFan as u8, &[on as u8])
    }

    // ── Board ──

    pub fn display_message(
        self,
        options: MessageOptions,
        x: u8,
        y: u8,
        timeout_s: u8,
        text: &str,
    ) -> Self {
        self.op(HostOpcode::DisplayMessage)
            .u8(options.bits())
            .u8(x)
            .u8(y)
            .u8(timeout_s)
            .text(text)
    }

    pub fn build_start(self, steps: u32, name: &str) -> Self {
        self.op(HostOpcode::BuildStartNotification).u32(steps).text(name)
    }

    pub fn build_end(self) -> Self {
        self.op(HostOpcode::BuildEndNotification).u8(0)
    }

    pub fn build_percent(self, percent: u8) -> Self {
        self.op(HostOpcode::SetBuildPercent).u8(percent).u8(0)
    }

    pub fn rgb_led(self, red: u8, green: u8, blue: u8, blink: u8) -> Self {
        self.op(HostOpcode::SetRgbLed).u8(red).u8(green).u8(blue).u8(blink).u8(0)
    }

    pub fn beep(self, frequency: u16, duration_ms: u16) -> Self {
        self.op(HostOpcode::SetBeep).u16(frequency).u16(duration_ms).u8(0)
    }

    pub fn song(self, song: u8) -> Self {
        self.op(HostOpcode::QueueSong).u8(song)
    }

    pub fn stream_version(self, major: u8, minor: u8) -> Self {
        self.op(HostOpcode::StreamVersion).u8(major).u8(minor).raw(&[0; 18])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_match_opcode_table() {
        let cases: [(StreamBuilder, HostOpcode); 8] = [
            (StreamBuilder::new().queue_point_ext(Point::ZERO, 1), HostOpcode::QueuePointExt),
            (
                StreamBuilder::new().queue_point_new(Point::ZERO, 1, AxisMask::empty()),
                HostOpcode::QueuePointNew,
            ),
            (
                StreamBuilder::new().queue_point_new_ext(
                    Point::ZERO,
                    1,
                    AxisMask::empty(),
                    MoveModifiers::empty(),
                    1.0,
                    64,
                ),
                HostOpcode::QueuePointNewExt,
            ),
            (StreamBuilder::new().delay(1), HostOpcode::Delay),
            (StreamBuilder::new().wait_for_tool(0, 1), HostOpcode::WaitForTool),
            (StreamBuilder::new().find_axes(false, AxisMask::X, 1, 1), HostOpcode::FindAxesMinimum),
            (StreamBuilder::new().rgb_led(1, 2, 3, 0), HostOpcode::SetRgbLed),
            (StreamBuilder::new().stream_version(1, 0), HostOpcode::StreamVersion),
        ];
        for (builder, op) in cases {
            assert_eq!(builder.len(), op.min_len(), "{op:?}");
        }
    }
}
