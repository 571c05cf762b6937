//! Toolhead controller interface.
//!
//! Request/response access to the extruder and platform heaters. Every call
//! can fail; [`ToolheadError::Busy`] means the link is held by another
//! transaction and the caller should retry on a later tick.

use mb_common::error::ToolheadError;

pub trait Toolhead {
    /// Current target temperature of `tool` [°C].
    fn set_point(&mut self, tool: u8) -> Result<u16, ToolheadError>;

    /// Current target temperature of the build platform [°C].
    fn platform_set_point(&mut self) -> Result<u16, ToolheadError>;

    fn set_temperature(&mut self, tool: u8, celsius: u16) -> Result<(), ToolheadError>;

    fn set_platform_temperature(&mut self, celsius: u16) -> Result<(), ToolheadError>;

    /// `tool` has reached its set point.
    fn is_tool_ready(&mut self, tool: u8) -> Result<bool, ToolheadError>;

    /// The platform has reached its set point.
    fn is_platform_ready(&mut self) -> Result<bool, ToolheadError>;

    fn set_fan(&mut self, tool: u8, on: bool) -> Result<(), ToolheadError>;

    /// Forward a raw tool sub-command. The response, if any, is discarded.
    fn send_packet(&mut self, tool: u8, command: u8, payload: &[u8])
    -> Result<(), ToolheadError>;
}
