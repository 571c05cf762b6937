//! Motion target translation.
//!
//! - [`translator`] - host move commands to pipeline requests
//! - [`offsets`] - dual-nozzle toolhead offsets
//! - [`filament`] - per-extruder usage counters

pub mod filament;
pub mod offsets;
pub mod translator;

pub use filament::FilamentCounters;
pub use offsets::{OffsetEncoding, OffsetScale, ToolOffsets};
pub use translator::{
    DualExtruder, ExtruderLayout, MotionTranslator, MoveModifiers, MoveOutcome, SingleExtruder,
};
