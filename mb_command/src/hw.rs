//! Collaborator interfaces.
//!
//! The command core drives five external subsystems it does not own. Each
//! is a trait so the same core runs against real firmware drivers or the
//! simulated set in [`crate::sim`].
//!
//! | Trait | Role |
//! |-------|------|
//! | [`MotionPipeline`] | Step planning and interrupt-driven pulse generation |
//! | [`Toolhead`] | Extruder/platform controller link |
//! | [`SettingsStore`] | Persisted key/value settings |
//! | [`Board`] | Clock, operator panel, notifications |
//! | [`PlaybackSource`] | Storage-card job playback |

pub mod board;
pub mod isr;
pub mod pipeline;
pub mod playback;
pub mod settings;
pub mod toolhead;

pub use board::Board;
pub use isr::IsrCell;
pub use pipeline::{MotionPipeline, MotionRequest};
pub use playback::PlaybackSource;
pub use settings::{MemorySettings, SettingKey, SettingsStore};
pub use toolhead::Toolhead;
