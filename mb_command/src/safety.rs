//! Safety module root.
//!
//! Homing supervision and the P-Stop (soft emergency stop) latch.

pub mod homing;
pub mod pstop;

pub use homing::{HomingSupervisor, HomingTickResult};
pub use pstop::{PStopLatch, StopSignal};
