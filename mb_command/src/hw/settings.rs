//! Persisted settings.
//!
//! The firmware keeps operator-tunable values in non-volatile storage.
//! The store is a flat key/value map of signed integers; the typed accessors
//! below pair each key with the default used while the key is unset.
//!
//! | Key | Default |
//! |-----|---------|
//! | `ToolheadOffsetX` / `ToolheadOffsetY` | 0 steps |
//! | `OffsetEncoding` | 1 (full separation) |
//! | `HeaterPausePolicy` | 2 (extruders and platform off) |
//! | `DittoEnabled` | 0 |
//! | `AccelerationEnabled` | 1 |
//! | `FilamentLifetimeA` / `FilamentLifetimeB` | 0 steps |
//! | `HomeX` .. `HomeB` | 0 steps |
//! | `OverrideGcodeTemp` | 0 |
//! | `Tool0Temp` / `Tool1Temp` / `PlatformTemp` | 220 / 220 / 110 °C |

use mb_common::consts::{MAX_TEMP, STEPPER_COUNT};
use mb_common::point::Axis;
use mb_common::state::HeaterPolicy;
use static_assertions::const_assert;

use crate::motion::offsets::OffsetEncoding;

/// Persisted setting identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SettingKey {
    ToolheadOffsetX = 0,
    ToolheadOffsetY = 1,
    OffsetEncoding = 2,
    HeaterPausePolicy = 3,
    DittoEnabled = 4,
    AccelerationEnabled = 5,
    FilamentLifetimeA = 6,
    FilamentLifetimeB = 7,
    HomeX = 8,
    HomeY = 9,
    HomeZ = 10,
    HomeA = 11,
    HomeB = 12,
    OverrideGcodeTemp = 13,
    Tool0Temp = 14,
    Tool1Temp = 15,
    PlatformTemp = 16,
}

impl SettingKey {
    pub const COUNT: usize = 17;

    pub const ALL: [SettingKey; Self::COUNT] = [
        Self::ToolheadOffsetX,
        Self::ToolheadOffsetY,
        Self::OffsetEncoding,
        Self::HeaterPausePolicy,
        Self::DittoEnabled,
        Self::AccelerationEnabled,
        Self::FilamentLifetimeA,
        Self::FilamentLifetimeB,
        Self::HomeX,
        Self::HomeY,
        Self::HomeZ,
        Self::HomeA,
        Self::HomeB,
        Self::OverrideGcodeTemp,
        Self::Tool0Temp,
        Self::Tool1Temp,
        Self::PlatformTemp,
    ];

    /// Survives a factory reset.
    #[inline]
    pub const fn is_lifetime_counter(&self) -> bool {
        matches!(self, Self::FilamentLifetimeA | Self::FilamentLifetimeB)
    }

    #[inline]
    pub const fn home(axis: Axis) -> Self {
        match axis {
            Axis::X => Self::HomeX,
            Axis::Y => Self::HomeY,
            Axis::Z => Self::HomeZ,
            Axis::A => Self::HomeA,
            Axis::B => Self::HomeB,
        }
    }

    #[inline]
    pub const fn filament_lifetime(extruder: usize) -> Self {
        if extruder == 0 {
            Self::FilamentLifetimeA
        } else {
            Self::FilamentLifetimeB
        }
    }

    /// Name used in the `[settings]` table of a machine file.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToolheadOffsetX => "toolhead_offset_x",
            Self::ToolheadOffsetY => "toolhead_offset_y",
            Self::OffsetEncoding => "offset_encoding",
            Self::HeaterPausePolicy => "heater_pause_policy",
            Self::DittoEnabled => "ditto_enabled",
            Self::AccelerationEnabled => "acceleration_enabled",
            Self::FilamentLifetimeA => "filament_lifetime_a",
            Self::FilamentLifetimeB => "filament_lifetime_b",
            Self::HomeX => "home_x",
            Self::HomeY => "home_y",
            Self::HomeZ => "home_z",
            Self::HomeA => "home_a",
            Self::HomeB => "home_b",
            Self::OverrideGcodeTemp => "override_gcode_temp",
            Self::Tool0Temp => "tool0_temp",
            Self::Tool1Temp => "tool1_temp",
            Self::PlatformTemp => "platform_temp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

/// Heater addressed by a temperature override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterTarget {
    Tool(u8),
    Platform,
}

/// Key/value settings store with typed accessors.
pub trait SettingsStore {
    fn read(&self, key: SettingKey) -> Option<i64>;

    fn write(&mut self, key: SettingKey, value: i64);

    /// Restore defaults, keeping lifetime counters.
    fn reset_to_factory(&mut self);

    #[inline]
    fn read_or(&self, key: SettingKey, default: i64) -> i64 {
        self.read(key).unwrap_or(default)
    }

    /// Raw stored toolhead offsets (X, Y) [steps].
    fn toolhead_offset_raw(&self) -> (i32, i32) {
        (
            self.read_or(SettingKey::ToolheadOffsetX, 0) as i32,
            self.read_or(SettingKey::ToolheadOffsetY, 0) as i32,
        )
    }

    fn offset_encoding(&self) -> OffsetEncoding {
        OffsetEncoding::from_u8(self.read_or(SettingKey::OffsetEncoding, 1) as u8)
            .unwrap_or_default()
    }

    fn heater_pause_policy(&self) -> HeaterPolicy {
        HeaterPolicy::from_u8(self.read_or(SettingKey::HeaterPausePolicy, 2) as u8)
            .unwrap_or_default()
    }

    fn ditto_enabled(&self) -> bool {
        self.read_or(SettingKey::DittoEnabled, 0) != 0
    }

    fn acceleration_enabled(&self) -> bool {
        self.read_or(SettingKey::AccelerationEnabled, 1) != 0
    }

    fn filament_lifetime(&self, extruder: usize) -> i64 {
        self.read_or(SettingKey::filament_lifetime(extruder), 0)
    }

    fn add_filament_lifetime(&mut self, extruder: usize, steps: i64) {
        let key = SettingKey::filament_lifetime(extruder);
        let total = self.read_or(key, 0).saturating_add(steps);
        self.write(key, total);
    }

    fn home_position(&self, axis: Axis) -> i32 {
        self.read_or(SettingKey::home(axis), 0) as i32
    }

    fn set_home_position(&mut self, axis: Axis, steps: i32) {
        self.write(SettingKey::home(axis), steps as i64);
    }

    /// Stored temperature replacing a host-requested non-zero set point,
    /// when the override is enabled.
    fn temperature_override(&self, target: HeaterTarget) -> Option<u16> {
        if self.read_or(SettingKey::OverrideGcodeTemp, 0) == 0 {
            return None;
        }
        let celsius = match target {
            HeaterTarget::Tool(0) => self.read_or(SettingKey::Tool0Temp, 220),
            HeaterTarget::Tool(_) => self.read_or(SettingKey::Tool1Temp, 220),
            HeaterTarget::Platform => self.read_or(SettingKey::PlatformTemp, 110),
        };
        Some(celsius.clamp(0, MAX_TEMP as i64) as u16)
    }
}

/// In-memory settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySettings {
    values: [Option<i64>; SettingKey::COUNT],
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style write, handy for fixtures.
    pub fn with(mut self, key: SettingKey, value: i64) -> Self {
        self.write(key, value);
        self
    }
}

impl SettingsStore for MemorySettings {
    fn read(&self, key: SettingKey) -> Option<i64> {
        self.values[key as usize]
    }

    fn write(&mut self, key: SettingKey, value: i64) {
        self.values[key as usize] = Some(value);
    }

    fn reset_to_factory(&mut self) {
        for key in SettingKey::ALL {
            if !key.is_lifetime_counter() {
                self.values[key as usize] = None;
            }
        }
    }
}

// Home positions cover every axis.
const_assert!(SettingKey::HomeB as usize - SettingKey::HomeX as usize + 1 == STEPPER_COUNT);
