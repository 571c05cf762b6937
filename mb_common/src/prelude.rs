//! Prelude module for common re-exports.
//!
//! ```rust
//! use mb_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, MachineConfig};

// ─── Geometry ───────────────────────────────────────────────────────
pub use crate::consts::{COMMAND_BUFFER_SIZE, STEPPER_COUNT};
pub use crate::point::{Axis, Point};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::{AxisMask, HostOpcode, ToolOpcode};

// ─── State ──────────────────────────────────────────────────────────
pub use crate::state::{BuildState, ExecutionMode, HeaterPolicy, PauseState};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{StorageFault, ToolheadError};
