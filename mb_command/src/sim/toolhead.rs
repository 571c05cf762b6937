//! Simulated toolhead link.
//!
//! Heaters are "ready" independently of their set points so tests can
//! hold a wait open. Failures can be injected for the next N requests.

use mb_common::error::ToolheadError;

use crate::hw::Toolhead;

#[derive(Debug, Clone)]
pub struct SimToolhead {
    tool_count: u8,
    set_points: [u16; 2],
    platform: u16,
    ready: [bool; 2],
    platform_ready: bool,
    fans: [bool; 2],
    temperature_writes: usize,
    packets: Vec<(u8, u8, Vec<u8>)>,
    failure: Option<(ToolheadError, usize)>,
}

impl SimToolhead {
    pub fn new(tool_count: u8) -> Self {
        Self {
            tool_count: tool_count.clamp(1, 2),
            set_points: [0; 2],
            platform: 0,
            ready: [true; 2],
            platform_ready: true,
            fans: [false; 2],
            temperature_writes: 0,
            packets: Vec::new(),
            failure: None,
        }
    }

    pub fn set_ready(&mut self, tool: u8, ready: bool) {
        self.ready[(tool & 1) as usize] = ready;
    }

    pub fn set_platform_ready(&mut self, ready: bool) {
        self.platform_ready = ready;
    }

    /// Fail the next `count` requests with `error`.
    pub fn fail_next(&mut self, error: ToolheadError, count: usize) {
        self.failure = (count > 0).then_some((error, count));
    }

    /// Set-point writes so far, tools and platform.
    pub fn temperature_writes(&self) -> usize {
        self.temperature_writes
    }

    pub fn fan(&self, tool: u8) -> bool {
        self.fans[(tool & 1) as usize]
    }

    /// Raw packets forwarded: `(tool, code, payload)`.
    pub fn packets(&self) -> &[(u8, u8, Vec<u8>)] {
        &self.packets
    }

    fn check(&mut self) -> Result<(), ToolheadError> {
        let Some((error, remaining)) = self.failure else {
            return Ok(());
        };
        self.failure = (remaining > 1).then_some((error, remaining - 1));
        Err(error)
    }

    fn index(&self, tool: u8) -> Result<usize, ToolheadError> {
        if tool < self.tool_count {
            Ok(tool as usize)
        } else {
            Err(ToolheadError::Timeout)
        }
    }
}

impl Toolhead for SimToolhead {
    fn set_point(&mut self, tool: u8) -> Result<u16, ToolheadError> {
        let i = self.index(tool)?;
        Ok(self.set_points[i])
    }

    fn platform_set_point(&mut self) -> Result<u16, ToolheadError> {
        Ok(self.platform)
    }

    fn set_temperature(&mut self, tool: u8, celsius: u16) -> Result<(), ToolheadError> {
        self.check()?;
        let i = self.index(tool)?;
        self.set_points[i] = celsius;
        self.temperature_writes += 1;
        Ok(())
    }

    fn set_platform_temperature(&mut self, celsius: u16) -> Result<(), ToolheadError> {
        self.check()?;
        self.platform = celsius;
        self.temperature_writes += 1;
        Ok(())
    }

    fn is_tool_ready(&mut self, tool: u8) -> Result<bool, ToolheadError> {
        let i = self.index(tool)?;
        Ok(self.ready[i])
    }

    fn is_platform_ready(&mut self) -> Result<bool, ToolheadError> {
        Ok(self.platform_ready)
    }

    fn set_fan(&mut self, tool: u8, on: bool) -> Result<(), ToolheadError> {
        self.check()?;
        let i = self.index(tool)?;
        self.fans[i] = on;
        Ok(())
    }

    fn send_packet(&mut self, tool: u8, command: u8, payload: &[u8]) -> Result<(), ToolheadError> {
        self.check()?;
        self.packets.push((tool, command, payload.to_vec()));
        Ok(())
    }
}
