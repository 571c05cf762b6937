//! Machine configuration.
//!
//! Static machine geometry and tuning, loaded once at startup from TOML.
//! Values the operator changes at runtime (toolhead offsets, heater pause
//! policy, ditto printing, lifetime counters) are persisted settings and
//! live behind the settings store in the command core, not here.
//!
//! # TOML Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [tools]
//! count = 2
//!
//! [pause]
//! retract_mm = 1.5
//! clear_z = 58000
//!
//! [motion]
//! clip_z = true
//! ```
//!
//! Omitted sections and fields fall back to their documented defaults.
//! `[[axes]]`, when present, must list all five axes in X, Y, Z, A, B order.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    DEFAULT_CLEAR_MARGIN_MM, DEFAULT_IDEAL_SEPARATION_MM, DEFAULT_OFFSET_THRESHOLD_MM,
    DEFAULT_PLANNER_MAX_DEPTH, DEFAULT_RETRACT_MM, EXTRUDER_COUNT, PSTOP_MOVE_THRESHOLD,
    STEPPER_COUNT,
};
use crate::point::Axis;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

// ─── Axes ───────────────────────────────────────────────────────────

/// Per-axis geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    /// Steps per millimetre of travel.
    pub steps_per_mm: f32,
    /// Maximum feed rate [mm/s].
    pub max_feedrate: f32,
    /// Upper travel limit [steps].
    pub max_steps: i32,
    /// Lower travel limit [steps].
    #[serde(default)]
    pub min_steps: i32,
}

impl AxisConfig {
    /// Millimetres to steps, truncating toward zero.
    #[inline]
    pub fn mm_to_steps(&self, mm: f32) -> i32 {
        (mm * self.steps_per_mm) as i32
    }

    #[inline]
    pub fn steps_to_mm(&self, steps: i64) -> f32 {
        steps as f32 / self.steps_per_mm
    }
}

fn default_axes() -> [AxisConfig; STEPPER_COUNT] {
    let xy = |max_steps| AxisConfig {
        steps_per_mm: 88.573_186,
        max_feedrate: 260.0,
        max_steps,
        min_steps: -max_steps,
    };
    let extruder = AxisConfig {
        steps_per_mm: 96.275_2,
        max_feedrate: 100.0,
        max_steps: 100_000_000,
        min_steps: -100_000_000,
    };
    [
        xy(14_000),
        xy(7_000),
        AxisConfig {
            steps_per_mm: 400.0,
            max_feedrate: 16.0,
            max_steps: 60_000,
            min_steps: 0,
        },
        extruder,
        extruder,
    ]
}

// ─── Tools ──────────────────────────────────────────────────────────

/// Toolhead population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Number of fitted toolheads (1 or 2).
    #[serde(default = "default_tool_count")]
    pub count: u8,
    /// Per extruder: true if pushing filament out means negative steps.
    #[serde(default = "default_extrude_when_negative")]
    pub extrude_when_negative: [bool; EXTRUDER_COUNT],
}

fn default_tool_count() -> u8 {
    2
}
fn default_extrude_when_negative() -> [bool; EXTRUDER_COUNT] {
    [true, true]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            count: default_tool_count(),
            extrude_when_negative: default_extrude_when_negative(),
        }
    }
}

// ─── Pause ──────────────────────────────────────────────────────────

/// Pause/resume motion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PauseConfig {
    /// Filament retracted on pause entry [mm].
    #[serde(default = "default_retract_mm")]
    pub retract_mm: f32,
    /// Retraction feed rate [mm/s].
    #[serde(default = "default_retract_feedrate")]
    pub retract_feedrate: f32,
    /// Parking X [steps]; keeps the paused X when unset.
    #[serde(default)]
    pub clear_x: Option<i32>,
    /// Parking Y [steps]; keeps the paused Y when unset.
    #[serde(default)]
    pub clear_y: Option<i32>,
    /// Parking Z [steps]; Z travel limit minus `clear_margin_mm` when unset.
    #[serde(default)]
    pub clear_z: Option<i32>,
    /// Gap kept below the Z travel limit when `clear_z` is unset [mm].
    #[serde(default = "default_clear_margin_mm")]
    pub clear_margin_mm: f32,
}

fn default_retract_mm() -> f32 {
    DEFAULT_RETRACT_MM
}
fn default_retract_feedrate() -> f32 {
    40.0
}
fn default_clear_margin_mm() -> f32 {
    DEFAULT_CLEAR_MARGIN_MM
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            retract_mm: default_retract_mm(),
            retract_feedrate: default_retract_feedrate(),
            clear_x: None,
            clear_y: None,
            clear_z: None,
            clear_margin_mm: default_clear_margin_mm(),
        }
    }
}

// ─── Motion ─────────────────────────────────────────────────────────

/// Motion translation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Clip Z targets to the Z travel limit.
    #[serde(default)]
    pub clip_z: bool,
    /// Pipeline depth at which the core stops dispatching moves.
    #[serde(default = "default_planner_max_depth")]
    pub planner_max_depth: u8,
    /// Honour the P-Stop input at all.
    #[serde(default = "default_true")]
    pub pstop_enabled: bool,
    /// Accepted moves required after a position definition before a
    /// P-Stop is honoured.
    #[serde(default = "default_pstop_move_threshold")]
    pub pstop_move_threshold: u8,
    /// Stored X offsets at or below this magnitude are legacy deviations [mm].
    #[serde(default = "default_offset_threshold_mm")]
    pub offset_threshold_mm: f32,
    /// Nominal dual-nozzle separation [mm].
    #[serde(default = "default_ideal_separation_mm")]
    pub ideal_separation_mm: f32,
}

fn default_true() -> bool {
    true
}
fn default_planner_max_depth() -> u8 {
    DEFAULT_PLANNER_MAX_DEPTH
}
fn default_pstop_move_threshold() -> u8 {
    PSTOP_MOVE_THRESHOLD
}
fn default_offset_threshold_mm() -> f32 {
    DEFAULT_OFFSET_THRESHOLD_MM
}
fn default_ideal_separation_mm() -> f32 {
    DEFAULT_IDEAL_SEPARATION_MM
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            clip_z: false,
            planner_max_depth: default_planner_max_depth(),
            pstop_enabled: true,
            pstop_move_threshold: default_pstop_move_threshold(),
            offset_threshold_mm: default_offset_threshold_mm(),
            ideal_separation_mm: default_ideal_separation_mm(),
        }
    }
}

// ─── Cycle ──────────────────────────────────────────────────────────

/// Main loop pacing (host simulation only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleConfig {
    /// Scheduler tick period [µs].
    #[serde(default = "default_tick_us")]
    pub tick_us: u32,
}

fn default_tick_us() -> u32 {
    1000
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tick_us: default_tick_us(),
        }
    }
}

// ─── Machine ────────────────────────────────────────────────────────

/// Complete machine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_axes")]
    pub axes: [AxisConfig; STEPPER_COUNT],
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub pause: PauseConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            axes: default_axes(),
            tools: ToolsConfig::default(),
            pause: PauseConfig::default(),
            motion: MotionConfig::default(),
            cycle: CycleConfig::default(),
        }
    }
}

impl MachineConfig {
    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        &self.axes[axis.index()]
    }

    /// Parse from TOML text without validating.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - any axis has non-positive or non-finite steps/mm or feed rate
    /// - any axis has `min_steps > max_steps`
    /// - the tool count is not 1 or 2
    /// - the planner depth is zero
    /// - the retraction length or feed rate is negative or non-finite
    /// - the offset threshold or nominal separation is not positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        for (axis, cfg) in Axis::ALL.iter().zip(self.axes.iter()) {
            if !cfg.steps_per_mm.is_finite() || cfg.steps_per_mm <= 0.0 {
                return invalid(format!("axis {}: steps_per_mm must be > 0", axis.label()));
            }
            if !cfg.max_feedrate.is_finite() || cfg.max_feedrate <= 0.0 {
                return invalid(format!("axis {}: max_feedrate must be > 0", axis.label()));
            }
            if cfg.min_steps > cfg.max_steps {
                return invalid(format!(
                    "axis {}: min_steps {} exceeds max_steps {}",
                    axis.label(),
                    cfg.min_steps,
                    cfg.max_steps
                ));
            }
        }
        if !(1..=EXTRUDER_COUNT as u8).contains(&self.tools.count) {
            return invalid(format!("tools.count must be 1 or 2, got {}", self.tools.count));
        }
        if self.motion.planner_max_depth == 0 {
            return invalid("motion.planner_max_depth must be > 0".to_string());
        }
        if !self.pause.retract_mm.is_finite() || self.pause.retract_mm < 0.0 {
            return invalid("pause.retract_mm must be >= 0".to_string());
        }
        if !self.pause.retract_feedrate.is_finite() || self.pause.retract_feedrate <= 0.0 {
            return invalid("pause.retract_feedrate must be > 0".to_string());
        }
        if !self.pause.clear_margin_mm.is_finite() || self.pause.clear_margin_mm < 0.0 {
            return invalid("pause.clear_margin_mm must be >= 0".to_string());
        }
        if !(self.motion.offset_threshold_mm > 0.0) || !(self.motion.ideal_separation_mm > 0.0) {
            return invalid(
                "motion.offset_threshold_mm and motion.ideal_separation_mm must be > 0"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
