//! `TOOL_COMMAND` pass-through.
//!
//! Layout: `opcode, tool, code, len, payload[len]`. Temperature and fan
//! codes go through the typed [`Toolhead`] calls, everything else is
//! forwarded as a raw packet. While ditto printing, set-temperature and
//! fan commands are first sent to the idle tool (without consuming the
//! command) and then to the addressed one on the next tick.
//!
//! [`Toolhead`]: crate::hw::Toolhead

use heapless::Vec;
use mb_common::consts::MAX_TEMP;
use mb_common::error::ToolheadError;
use mb_common::protocol::ToolOpcode;
use tracing::{debug, warn};

use super::Dispatch;
use crate::controller::{Io, MotionController};
use crate::hw::settings::HeaterTarget;
use crate::motion::translator::ExtruderLayout;

/// Header bytes in front of the payload.
const HEADER_LEN: usize = 4;

type Payload = Vec<u8, { u8::MAX as usize }>;

impl<L: ExtruderLayout> MotionController<L> {
    pub(crate) fn tool_command(&mut self, io: &mut Io<'_>) -> Dispatch {
        let (Some(tool), Some(code), Some(len)) =
            (self.buffer.peek(1), self.buffer.peek(2), self.buffer.peek(3))
        else {
            return Dispatch::Deferred;
        };
        let total = HEADER_LEN + len as usize;
        if total > self.buffer.capacity() {
            warn!(tool, code, len, "tool command longer than the buffer, dropped");
            self.buffer.discard(total);
            return Dispatch::Consumed;
        }
        if self.buffer.len() < total {
            return Dispatch::Deferred;
        }

        let op = ToolOpcode::from_u8(code);
        if op == Some(ToolOpcode::ToggleAbp) && !io.pipeline.is_empty() {
            return Dispatch::Deferred;
        }
        if op.is_some_and(|op| op.is_obsolete()) {
            debug!(tool, code, "obsolete tool command consumed");
            self.buffer.skip(total);
            return Dispatch::Consumed;
        }

        let payload: Payload = (HEADER_LEN..total)
            .filter_map(|i| self.buffer.peek(i))
            .collect();

        let mirrored = self.translator.ditto() && op.is_some_and(|op| op.is_mirrored_in_ditto());
        if mirrored && !self.ditto_sent {
            match self.send_tool(io, tool ^ 1, code, op, &payload) {
                Err(e) if e.is_retryable() => {}
                Err(e) => {
                    warn!(tool = tool ^ 1, code, error = %e, "mirrored tool command failed");
                    self.ditto_sent = true;
                }
                Ok(()) => self.ditto_sent = true,
            }
            return Dispatch::Deferred;
        }

        match self.send_tool(io, tool, code, op, &payload) {
            Err(e) if e.is_retryable() => return Dispatch::Deferred,
            Err(e) => warn!(tool, code, error = %e, "tool command failed"),
            Ok(()) => {}
        }
        self.ditto_sent = false;
        self.buffer.skip(total);

        if op == Some(ToolOpcode::SetTemp) && le_u16(&payload) == 0 && !self.playing {
            self.translator.filament_mut().commit(io.settings);
        }
        Dispatch::Consumed
    }

    fn send_tool(
        &self,
        io: &mut Io<'_>,
        tool: u8,
        code: u8,
        op: Option<ToolOpcode>,
        payload: &[u8],
    ) -> Result<(), ToolheadError> {
        match op {
            Some(ToolOpcode::SetTemp) => {
                let celsius = temperature(io, HeaterTarget::Tool(tool), le_u16(payload));
                io.toolhead.set_temperature(tool, celsius)
            }
            Some(ToolOpcode::SetPlatformTemp) => {
                let celsius = temperature(io, HeaterTarget::Platform, le_u16(payload));
                io.toolhead.set_platform_temperature(celsius)
            }
            Some(ToolOpcode::ToggleFan) => {
                let on = payload.first().is_some_and(|b| b & 1 != 0);
                io.toolhead.set_fan(tool, on)
            }
            _ => io.toolhead.send_packet(tool, code, payload),
        }
    }
}

/// Apply the stored override to a non-zero request and cap it.
fn temperature(io: &Io<'_>, target: HeaterTarget, requested: u16) -> u16 {
    if requested == 0 {
        return 0;
    }
    io.settings
        .temperature_override(target)
        .unwrap_or(requested)
        .min(MAX_TEMP)
}

fn le_u16(payload: &[u8]) -> u16 {
    match payload {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        [lo] => *lo as u16,
        [] => 0,
    }
}
