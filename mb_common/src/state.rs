//! State enums for the command core.
//!
//! All enums use `#[repr(u8)]` so they can be reported to a host or a UI
//! as a single byte. `PauseState` is a plain sum type over the positions in
//! the enter and exit chains; "mid-transition" and "exiting" are predicates
//! over the variant rather than bit tests.

use serde::{Deserialize, Serialize};

// ─── Execution Mode ─────────────────────────────────────────────────

/// What the command loop is currently doing.
///
/// Exactly one mode holds at a time. Every mode except `Ready` resolves
/// back to `Ready` by polling a completion condition once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExecutionMode {
    /// Free to dispatch the next buffered command.
    Ready = 0,
    /// The motion pipeline is full; wait for it to make room.
    Moving = 1,
    /// Timed dwell.
    Delay = 2,
    /// Homing move in flight.
    Homing = 3,
    /// Waiting for a toolhead to reach temperature.
    WaitOnTool = 4,
    /// Waiting for the build platform to reach temperature.
    WaitOnPlatform = 5,
    /// Waiting for the operator to press a button.
    WaitOnButton = 6,
}

impl ExecutionMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Moving),
            2 => Some(Self::Delay),
            3 => Some(Self::Homing),
            4 => Some(Self::WaitOnTool),
            5 => Some(Self::WaitOnPlatform),
            6 => Some(Self::WaitOnButton),
            _ => None,
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Ready
    }
}

// ─── Pause Chain ────────────────────────────────────────────────────

/// Position in the pause/resume sequence.
///
/// ```text
/// None → EnterDrainPipeline → EnterWaitDrain → EnterRetract → EnterWaitRetract
///      → EnterClearPlatform → EnterWaitClearPlatform → Paused | Error
///
/// Paused → ExitStartHeaters → ExitWaitHeaters → ExitReturnPlatform
///        → ExitWaitReturnPlatform → ExitUnretract → ExitWaitUnretract → None
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PauseState {
    None = 0,
    EnterDrainPipeline = 1,
    EnterWaitDrain = 2,
    EnterRetract = 3,
    EnterWaitRetract = 4,
    EnterClearPlatform = 5,
    EnterWaitClearPlatform = 6,
    Paused = 7,
    ExitStartHeaters = 8,
    ExitWaitHeaters = 9,
    ExitReturnPlatform = 10,
    ExitWaitReturnPlatform = 11,
    ExitUnretract = 12,
    ExitWaitUnretract = 13,
    /// Terminal until cleared by the operator.
    Error = 14,
}

impl PauseState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::EnterDrainPipeline),
            2 => Some(Self::EnterWaitDrain),
            3 => Some(Self::EnterRetract),
            4 => Some(Self::EnterWaitRetract),
            5 => Some(Self::EnterClearPlatform),
            6 => Some(Self::EnterWaitClearPlatform),
            7 => Some(Self::Paused),
            8 => Some(Self::ExitStartHeaters),
            9 => Some(Self::ExitWaitHeaters),
            10 => Some(Self::ExitReturnPlatform),
            11 => Some(Self::ExitWaitReturnPlatform),
            12 => Some(Self::ExitUnretract),
            13 => Some(Self::ExitWaitUnretract),
            14 => Some(Self::Error),
            _ => None,
        }
    }

    /// Somewhere inside the enter chain.
    #[inline]
    pub const fn is_entering(&self) -> bool {
        matches!(
            self,
            Self::EnterDrainPipeline
                | Self::EnterWaitDrain
                | Self::EnterRetract
                | Self::EnterWaitRetract
                | Self::EnterClearPlatform
                | Self::EnterWaitClearPlatform
        )
    }

    /// Somewhere inside the exit chain.
    #[inline]
    pub const fn is_exiting(&self) -> bool {
        matches!(
            self,
            Self::ExitStartHeaters
                | Self::ExitWaitHeaters
                | Self::ExitReturnPlatform
                | Self::ExitWaitReturnPlatform
                | Self::ExitUnretract
                | Self::ExitWaitUnretract
        )
    }

    /// Mid-transition: the pause workflow owns the tick.
    #[inline]
    pub const fn is_intermediate(&self) -> bool {
        self.is_entering() || self.is_exiting()
    }

    /// Paused from the operator's point of view: entering, fully paused or
    /// faulted. An exit in progress already counts as resumed.
    #[inline]
    pub const fn is_paused(&self) -> bool {
        !matches!(self, Self::None) && !self.is_exiting()
    }

    /// Any state other than `None`.
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Default for PauseState {
    fn default() -> Self {
        Self::None
    }
}

// ─── Heater Policy ──────────────────────────────────────────────────

/// Which heaters a pause suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HeaterPolicy {
    /// Leave every heater at its set point.
    LeaveOn = 0,
    /// Turn the extruder heaters off.
    ExtrudersOff = 1,
    /// Turn the extruder and platform heaters off.
    ExtrudersAndPlatformOff = 2,
}

impl HeaterPolicy {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::LeaveOn),
            1 => Some(Self::ExtrudersOff),
            2 => Some(Self::ExtrudersAndPlatformOff),
            _ => None,
        }
    }

    #[inline]
    pub const fn suspends_extruders(&self) -> bool {
        matches!(self, Self::ExtrudersOff | Self::ExtrudersAndPlatformOff)
    }

    #[inline]
    pub const fn suspends_platform(&self) -> bool {
        matches!(self, Self::ExtrudersAndPlatformOff)
    }

    #[inline]
    pub const fn suspends_any(&self) -> bool {
        !matches!(self, Self::LeaveOn)
    }
}

impl Default for HeaterPolicy {
    fn default() -> Self {
        Self::ExtrudersAndPlatformOff
    }
}

// ─── Build Lifecycle ────────────────────────────────────────────────

/// Job lifecycle as seen by the host-status layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuildState {
    /// No job loaded since the last reset.
    Idle = 0,
    /// A job is streaming commands.
    Running = 1,
    /// Playback reached a clean end of file.
    Finished = 2,
    /// Cancel requested; the pause chain is bringing the machine to rest.
    Cancelling = 3,
    /// Cancellation complete, buffer discarded.
    Cancelled = 4,
}

impl BuildState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Running),
            2 => Some(Self::Finished),
            3 => Some(Self::Cancelling),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl Default for BuildState {
    fn default() -> Self {
        Self::Idle
    }
}
