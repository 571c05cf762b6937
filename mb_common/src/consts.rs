//! Machine-wide constants.
//!
//! Axis layout, command buffer sizing and the handful of protocol limits
//! that every component agrees on. Values that a machine builder may want
//! to tune live in [`crate::config`] instead; the constants here double as
//! the defaults for those fields.

use static_assertions::const_assert;

// ─── Axis Layout ────────────────────────────────────────────────────

/// Number of stepper axes: three cartesian plus two extruders.
pub const STEPPER_COUNT: usize = 5;

/// Number of cartesian axes (X, Y, Z).
pub const CARTESIAN_COUNT: usize = 3;

/// Number of independently addressable extruder axes.
pub const EXTRUDER_COUNT: usize = 2;

// ─── Command Buffer ─────────────────────────────────────────────────

/// Command stream buffer capacity in bytes.
#[cfg(not(feature = "small-ram"))]
pub const COMMAND_BUFFER_SIZE: usize = 512;

/// Command stream buffer capacity in bytes (reduced-SRAM boards).
#[cfg(feature = "small-ram")]
pub const COMMAND_BUFFER_SIZE: usize = 256;

const_assert!(COMMAND_BUFFER_SIZE.is_power_of_two());
const_assert!(COMMAND_BUFFER_SIZE >= 256);

/// Longest text payload (display message, build name) kept by the core.
pub const MAX_TEXT_LEN: usize = 64;

// ─── Protocol Limits ────────────────────────────────────────────────

/// Line counter ceiling. The counter parks at `MAX_LINE_COUNT + 1` once
/// exceeded so the host can tell "overflowed" from "exactly at limit".
pub const MAX_LINE_COUNT: u32 = 1_000_000;

/// Build percentage reported before the host has sent any.
pub const BUILD_PERCENT_UNKNOWN: u8 = 101;

/// Hard ceiling for any temperature the core forwards to a toolhead [°C].
pub const MAX_TEMP: u16 = 280;

/// Accepted motion commands required before a P-Stop is honoured.
pub const PSTOP_MOVE_THRESHOLD: u8 = 4;

/// Fixed-point scale of the accelerated move's feed-rate field.
pub const FEEDRATE_MULT_SCALE: f32 = 64.0;

// ─── Homing ─────────────────────────────────────────────────────────

/// Homing target toward the positive end of travel.
///
/// Halved so a toolhead offset can be added without overflowing `i32`.
pub const HOMING_POSITION_POSITIVE: i32 = (i32::MAX - 1) >> 1;

/// Homing target toward the negative end of travel.
pub const HOMING_POSITION_NEGATIVE: i32 = (i32::MIN + 1) >> 1;

// ─── Pause Defaults ─────────────────────────────────────────────────

/// Filament retracted on pause entry [mm].
pub const DEFAULT_RETRACT_MM: f32 = 2.0;

/// Gap left below the Z travel limit when parking the platform [mm].
pub const DEFAULT_CLEAR_MARGIN_MM: f32 = 5.0;

// ─── Toolhead Offsets ───────────────────────────────────────────────

/// Nominal nozzle separation of a dual-extruder carriage [mm].
pub const DEFAULT_IDEAL_SEPARATION_MM: f32 = 33.0;

/// Stored X offsets at or below this magnitude are deviations from the
/// nominal separation rather than full separations [mm].
pub const DEFAULT_OFFSET_THRESHOLD_MM: f32 = 4.0;

/// Motion pipeline block-buffer depth at which the core reports "running".
pub const DEFAULT_PLANNER_MAX_DEPTH: u8 = 15;
