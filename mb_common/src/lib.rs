//! Motherboard Common Library
//!
//! Shared constants, wire-protocol definitions, state enums and machine
//! configuration for the motherboard command core and any host-side tooling
//! that needs to speak the same language.
//!
//! # Module Structure
//!
//! - [`consts`] - Axis layout, buffer sizes and protocol limits
//! - [`point`] - Five-axis step vectors
//! - [`protocol`] - Host and toolhead opcodes, axis masks
//! - [`state`] - Execution mode, pause chain, heater policy, build state
//! - [`config`] - TOML machine configuration
//! - [`error`] - Storage and toolhead error types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use mb_common::prelude::*;
//!
//! let mode = ExecutionMode::from_u8(0);
//! assert_eq!(mode, Some(ExecutionMode::Ready));
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod point;
pub mod prelude;
pub mod protocol;
pub mod state;
