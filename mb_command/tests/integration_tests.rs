//! Integration tests for the command core.
//!
//! Whole jobs and operator workflows run through `MotionController`
//! against the simulated pipeline, toolhead, board and storage card.

mod integration;
