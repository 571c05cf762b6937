//! Heater set-point capture and restore across a pause.
//!
//! Set points are read once when the platform has been cleared and written
//! back once at resume. Only elements that were hot at capture are
//! restored and waited on.

use mb_common::error::ToolheadError;
use mb_common::state::HeaterPolicy;
use tracing::warn;

use crate::hw::Toolhead;

/// Heater set points captured at pause entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaterSnapshot {
    /// Extruder set points [°C]; 0 for an absent or cold tool.
    tools: [u16; 2],
    /// Platform set point [°C].
    platform: u16,
    /// Policy the heaters were suspended under.
    policy: HeaterPolicy,
    /// Set points were captured and heaters turned off.
    suspended: bool,
}

impl HeaterSnapshot {
    pub const fn new() -> Self {
        Self {
            tools: [0; 2],
            platform: 0,
            policy: HeaterPolicy::LeaveOn,
            suspended: false,
        }
    }

    #[inline]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    #[inline]
    pub const fn policy(&self) -> HeaterPolicy {
        self.policy
    }

    #[inline]
    pub const fn tool_set_point(&self, tool: u8) -> u16 {
        self.tools[(tool & 1) as usize]
    }

    #[inline]
    pub const fn platform_set_point(&self) -> u16 {
        self.platform
    }

    /// Record current set points, then turn off what `policy` names.
    /// `LeaveOn` records nothing and touches nothing.
    pub fn suspend(&mut self, toolhead: &mut dyn Toolhead, tool_count: u8, policy: HeaterPolicy) {
        *self = Self::new();
        self.policy = policy;
        if !policy.suspends_any() {
            return;
        }

        self.tools[0] = read_or_cold(toolhead.set_point(0), "tool 0 set point");
        if tool_count == 2 {
            self.tools[1] = read_or_cold(toolhead.set_point(1), "tool 1 set point");
        }
        self.platform = read_or_cold(toolhead.platform_set_point(), "platform set point");

        if policy.suspends_extruders() {
            for tool in 0..tool_count.min(2) {
                log_failure(toolhead.set_temperature(tool, 0), "tool off");
            }
        }
        if policy.suspends_platform() {
            log_failure(toolhead.set_platform_temperature(0), "platform off");
        }
        self.suspended = true;
    }

    /// Write back every captured set point above zero.
    pub fn restore(&self, toolhead: &mut dyn Toolhead) {
        if !self.suspended {
            return;
        }
        if self.policy.suspends_extruders() {
            for (tool, &celsius) in self.tools.iter().enumerate() {
                if celsius > 0 {
                    log_failure(toolhead.set_temperature(tool as u8, celsius), "tool restore");
                }
            }
        }
        if self.policy.suspends_platform() && self.platform > 0 {
            log_failure(toolhead.set_platform_temperature(self.platform), "platform restore");
        }
    }

    /// Every restored element reports its set point reached. A failed
    /// query counts as ready so a dead link cannot hold the resume forever.
    pub fn at_temperature(&self, toolhead: &mut dyn Toolhead) -> bool {
        if !self.suspended {
            return true;
        }
        if self.policy.suspends_extruders() {
            for (tool, &celsius) in self.tools.iter().enumerate() {
                if celsius > 0 && !toolhead.is_tool_ready(tool as u8).unwrap_or(true) {
                    return false;
                }
            }
        }
        if self.policy.suspends_platform()
            && self.platform > 0
            && !toolhead.is_platform_ready().unwrap_or(true)
        {
            return false;
        }
        true
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Command every heater off.
pub fn all_off(toolhead: &mut dyn Toolhead, tool_count: u8) {
    for tool in 0..tool_count.min(2) {
        log_failure(toolhead.set_temperature(tool, 0), "tool off");
    }
    log_failure(toolhead.set_platform_temperature(0), "platform off");
}

fn read_or_cold(result: Result<u16, ToolheadError>, what: &'static str) -> u16 {
    result.unwrap_or_else(|e| {
        warn!(error = %e, what, "toolhead query failed");
        0
    })
}

fn log_failure(result: Result<(), ToolheadError>, what: &'static str) {
    if let Err(e) = result {
        warn!(error = %e, what, "toolhead command failed");
    }
}
