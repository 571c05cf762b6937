//! Command-loop state machines.
//!
//! - [`mode`] - execution mode: what the loop is waiting on
//! - [`pause`] - pause/resume sequencing layered over the mode machine
//! - [`heaters`] - heater set-point capture and restore for pauses
//! - [`timeout`] - microsecond deadlines shared by the above

pub mod heaters;
pub mod mode;
pub mod pause;
pub mod timeout;
