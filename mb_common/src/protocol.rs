//! Wire protocol definitions.
//!
//! The command stream is a byte-oriented, variable-length binary protocol.
//! Every command starts with a one-byte [`HostOpcode`]; the payload width is
//! fixed per opcode except for the tool pass-through (explicit one-byte
//! length) and the two text-carrying commands (NUL-terminated).
//! Multi-byte fields are little-endian.
//!
//! | Opcode | Bytes | Pipelined |
//! |--------|-------|-----------|
//! | `FindAxesMinimum` / `FindAxesMaximum` | 8 | yes |
//! | `Delay` | 5 | no |
//! | `ChangeTool` | 2 | yes |
//! | `WaitForPlatform` / `WaitForTool` | 6 | no |
//! | `ToolCommand` | 4 + payload | yes |
//! | `EnableAxes` | 2 | yes |
//! | `QueuePointExt` | 25 | yes |
//! | `SetPositionExt` | 21 | yes |
//! | `QueuePointNew` | 26 | yes |
//! | `QueuePointNewExt` | 32 | yes |
//! | `DisplayMessage` | 6 + text | no |
//! | `BuildStartNotification` | 5 + text | no |

use bitflags::bitflags;

/// Host command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostOpcode {
    FindAxesMinimum = 131,
    FindAxesMaximum = 132,
    Delay = 133,
    ChangeTool = 134,
    WaitForPlatform = 135,
    ToolCommand = 136,
    EnableAxes = 137,
    QueuePointExt = 139,
    SetPositionExt = 140,
    WaitForTool = 141,
    QueuePointNew = 142,
    StoreHomePosition = 143,
    RecallHomePosition = 144,
    SetRgbLed = 146,
    SetBeep = 147,
    PauseForButton = 148,
    DisplayMessage = 149,
    SetBuildPercent = 150,
    QueueSong = 151,
    ResetToFactory = 152,
    BuildStartNotification = 153,
    BuildEndNotification = 154,
    QueuePointNewExt = 155,
    SetAccelerationToggle = 156,
    StreamVersion = 157,
}

impl HostOpcode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            131 => Some(Self::FindAxesMinimum),
            132 => Some(Self::FindAxesMaximum),
            133 => Some(Self::Delay),
            134 => Some(Self::ChangeTool),
            135 => Some(Self::WaitForPlatform),
            136 => Some(Self::ToolCommand),
            137 => Some(Self::EnableAxes),
            139 => Some(Self::QueuePointExt),
            140 => Some(Self::SetPositionExt),
            141 => Some(Self::WaitForTool),
            142 => Some(Self::QueuePointNew),
            143 => Some(Self::StoreHomePosition),
            144 => Some(Self::RecallHomePosition),
            146 => Some(Self::SetRgbLed),
            147 => Some(Self::SetBeep),
            148 => Some(Self::PauseForButton),
            149 => Some(Self::DisplayMessage),
            150 => Some(Self::SetBuildPercent),
            151 => Some(Self::QueueSong),
            152 => Some(Self::ResetToFactory),
            153 => Some(Self::BuildStartNotification),
            154 => Some(Self::BuildEndNotification),
            155 => Some(Self::QueuePointNewExt),
            156 => Some(Self::SetAccelerationToggle),
            157 => Some(Self::StreamVersion),
            _ => None,
        }
    }

    /// Returns true if the opcode may be dispatched while motion is still
    /// queued. Everything else waits for the pipeline to drain.
    #[inline]
    pub const fn is_pipelined(&self) -> bool {
        matches!(
            self,
            Self::QueuePointExt
                | Self::QueuePointNew
                | Self::QueuePointNewExt
                | Self::EnableAxes
                | Self::ChangeTool
                | Self::SetPositionExt
                | Self::SetAccelerationToggle
                | Self::RecallHomePosition
                | Self::FindAxesMinimum
                | Self::FindAxesMaximum
                | Self::ToolCommand
                | Self::PauseForButton
        )
    }

    /// Bytes (opcode included) that must be buffered before the handler
    /// may pop anything. For `ToolCommand` this is the header only; the
    /// payload length is read from byte 3. For the text commands it is the
    /// fixed prefix in front of the NUL-terminated string.
    #[inline]
    pub const fn min_len(&self) -> usize {
        match self {
            Self::FindAxesMinimum | Self::FindAxesMaximum => 8,
            Self::Delay => 5,
            Self::ChangeTool => 2,
            Self::WaitForPlatform | Self::WaitForTool => 6,
            Self::ToolCommand => 4,
            Self::EnableAxes => 2,
            Self::QueuePointExt => 25,
            Self::SetPositionExt => 21,
            Self::QueuePointNew => 26,
            Self::StoreHomePosition | Self::RecallHomePosition => 2,
            Self::SetRgbLed | Self::SetBeep => 6,
            Self::PauseForButton => 5,
            Self::DisplayMessage => 6,
            Self::SetBuildPercent => 3,
            Self::QueueSong | Self::ResetToFactory | Self::BuildEndNotification => 2,
            Self::BuildStartNotification => 5,
            Self::QueuePointNewExt => 32,
            Self::SetAccelerationToggle => 2,
            Self::StreamVersion => 21,
        }
    }
}

/// Toolhead sub-command codes carried inside `ToolCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ToolOpcode {
    GetTemp = 2,
    SetTemp = 3,
    SetMotor1Pwm = 4,
    SetMotor2Pwm = 5,
    SetMotor1Rpm = 6,
    SetMotor2Rpm = 7,
    SetMotor1Dir = 8,
    SetMotor2Dir = 9,
    ToggleMotor1 = 10,
    ToggleMotor2 = 11,
    ToggleFan = 12,
    ToggleValve = 13,
    SetServo1Pos = 14,
    SetServo2Pos = 15,
    IsToolReady = 22,
    ToggleAbp = 27,
    GetPlatformTemp = 30,
    SetPlatformTemp = 31,
    GetSetPoint = 32,
    GetPlatformSetPoint = 33,
    IsPlatformReady = 35,
}

impl ToolOpcode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::GetTemp),
            3 => Some(Self::SetTemp),
            4 => Some(Self::SetMotor1Pwm),
            5 => Some(Self::SetMotor2Pwm),
            6 => Some(Self::SetMotor1Rpm),
            7 => Some(Self::SetMotor2Rpm),
            8 => Some(Self::SetMotor1Dir),
            9 => Some(Self::SetMotor2Dir),
            10 => Some(Self::ToggleMotor1),
            11 => Some(Self::ToggleMotor2),
            12 => Some(Self::ToggleFan),
            13 => Some(Self::ToggleValve),
            14 => Some(Self::SetServo1Pos),
            15 => Some(Self::SetServo2Pos),
            22 => Some(Self::IsToolReady),
            27 => Some(Self::ToggleAbp),
            30 => Some(Self::GetPlatformTemp),
            31 => Some(Self::SetPlatformTemp),
            32 => Some(Self::GetSetPoint),
            33 => Some(Self::GetPlatformSetPoint),
            35 => Some(Self::IsPlatformReady),
            _ => None,
        }
    }

    /// Motor and servo commands are obsolete with 5D extrusion; they are
    /// consumed and dropped without reaching the toolhead.
    #[inline]
    pub const fn is_obsolete(&self) -> bool {
        matches!(
            self,
            Self::SetMotor1Pwm
                | Self::SetMotor2Pwm
                | Self::SetMotor1Rpm
                | Self::SetMotor2Rpm
                | Self::SetMotor1Dir
                | Self::SetMotor2Dir
                | Self::ToggleMotor1
                | Self::ToggleMotor2
                | Self::SetServo1Pos
                | Self::SetServo2Pos
        )
    }

    /// Commands duplicated to the other toolhead while ditto printing.
    #[inline]
    pub const fn is_mirrored_in_ditto(&self) -> bool {
        matches!(self, Self::SetTemp | Self::ToggleFan)
    }
}

bitflags! {
    /// Per-axis selection mask used by homing, axis enable, home
    /// store/recall and the relative-coordinate flags of move commands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const A = 1 << 3;
        const B = 1 << 4;

        const CARTESIAN = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        const EXTRUDERS = Self::A.bits() | Self::B.bits();
    }
}

impl AxisMask {
    /// `ENABLE_AXES` bit selecting enable (set) or disable (clear).
    pub const ENABLE_BIT: u8 = 0x80;

    #[inline]
    pub const fn contains_index(&self, axis: usize) -> bool {
        axis < 8 && self.bits() & (1 << axis) != 0
    }

    /// Copy the first extruder's bit onto the second, or the other way
    /// round, so both extruders are selected identically.
    pub fn mirror_extruders(self, active_tool: u8) -> Self {
        let (from, to) = if active_tool == 0 {
            (Self::A, Self::B)
        } else {
            (Self::B, Self::A)
        };
        let mut out = self;
        out.set(to, self.contains(from));
        out
    }
}

bitflags! {
    /// Behaviour bits of `PAUSE_FOR_BUTTON`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ButtonBehavior: u8 {
        /// Reset the board if the wait times out.
        const ABORT_ON_TIMEOUT = 1 << 1;
        /// Hide the message screen when the button is pressed.
        const CLEAR_SCREEN = 1 << 2;
    }
}

bitflags! {
    /// Option bits of `DISPLAY_MESSAGE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MessageOptions: u8 {
        /// Append to the current message instead of replacing it.
        const APPEND = 1 << 0;
        /// Last fragment: show the message screen.
        const LAST_FRAGMENT = 1 << 1;
        /// Wait for a button press after showing.
        const WAIT_FOR_BUTTON = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Opcode decoding ──

    #[test]
    fn from_u8_roundtrip() {
        for v in 0..=u8::MAX {
            if let Some(op) = HostOpcode::from_u8(v) {
                assert_eq!(op as u8, v);
            }
        }
        assert_eq!(HostOpcode::from_u8(138), None);
        assert_eq!(HostOpcode::from_u8(145), None);
    }

    #[test]
    fn pipelined_set_is_exactly_twelve_opcodes() {
        let pipelined = (0..=u8::MAX)
            .filter_map(HostOpcode::from_u8)
            .filter(|op| op.is_pipelined())
            .count();
        assert_eq!(pipelined, 12);
        assert!(!HostOpcode::Delay.is_pipelined());
        assert!(!HostOpcode::WaitForTool.is_pipelined());
        assert!(HostOpcode::PauseForButton.is_pipelined());
    }

    #[test]
    fn move_lengths_match_payloads() {
        // opcode + 5 coords + interval
        assert_eq!(HostOpcode::QueuePointExt.min_len(), 1 + 5 * 4 + 4);
        // opcode + 5 coords + duration + relative flags
        assert_eq!(HostOpcode::QueuePointNew.min_len(), 1 + 5 * 4 + 4 + 1);
        // opcode + 5 coords + rate + relative + distance + feed multiplier
        assert_eq!(HostOpcode::QueuePointNewExt.min_len(), 1 + 5 * 4 + 4 + 1 + 4 + 2);
    }

    // ── Tool opcodes ──

    #[test]
    fn obsolete_tool_commands() {
        for code in 4..=11 {
            assert!(ToolOpcode::from_u8(code).is_some_and(|op| op.is_obsolete()));
        }
        assert!(ToolOpcode::SetServo2Pos.is_obsolete());
        assert!(!ToolOpcode::ToggleFan.is_obsolete());
        assert!(ToolOpcode::SetTemp.is_mirrored_in_ditto());
        assert!(!ToolOpcode::SetPlatformTemp.is_mirrored_in_ditto());
    }

    // ── Axis mask ──

    #[test]
    fn mirror_extruders_copies_active_bit() {
        let mask = AxisMask::X | AxisMask::A;
        assert_eq!(mask.mirror_extruders(0), AxisMask::X | AxisMask::A | AxisMask::B);
        assert_eq!(mask.mirror_extruders(1), AxisMask::X);
        let mask = AxisMask::B;
        assert_eq!(mask.mirror_extruders(1), AxisMask::A | AxisMask::B);
    }

    #[test]
    fn contains_index_matches_axis_bits() {
        let mask = AxisMask::Y | AxisMask::B;
        assert!(mask.contains_index(1));
        assert!(mask.contains_index(4));
        assert!(!mask.contains_index(0));
        assert!(!mask.contains_index(9));
    }
}
