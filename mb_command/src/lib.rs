//! # Motherboard Command Core
//!
//! Command execution and motion dispatch for a dual-extruder FFF printer
//! motherboard. Host or storage-card bytes land in a ring buffer; a
//! cooperative scheduler slice decodes at most one command per tick, turns
//! motion into step-space pipeline requests, and runs the long-running
//! waits, homing, and the multi-step pause/resume chain as resumable state
//! machines that never block.
//!
//! ## Layers
//!
//! 1. **[`buffer`]**: command byte ring with peek/pop decoding
//! 2. **[`command`]**: opcode dispatch and handlers
//! 3. **[`state`]**: execution mode, pause/resume chain, heater helpers
//! 4. **[`motion`]**: host-to-planner translation, toolhead offsets, filament
//! 5. **[`safety`]**: homing supervision, P-Stop latch
//! 6. **[`controller`]**: the owner of all of the above and the tick order
//!
//! Hardware is reached only through the traits in [`hw`]. [`sim`] provides
//! host-side implementations; [`cycle`] and the `mb_command` binary run a
//! job file against them.
//!
//! ## Allocation
//!
//! The command path uses fixed-capacity `heapless` storage only. The
//! simulated collaborators allocate freely.

pub mod buffer;
pub mod command;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod hw;
pub mod motion;
pub mod safety;
pub mod sim;
pub mod state;
pub mod status;

pub use controller::{Io, MotionController};
