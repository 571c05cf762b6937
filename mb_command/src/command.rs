//! Wire command handlers.
//!
//! Each handler lives in an `impl MotionController` block next to related
//! commands. Handlers run only once the controller has confirmed the
//! opcode's fixed prefix is buffered; the variable-length ones confirm the
//! rest themselves before popping anything.

mod dispatch;
mod text;
mod tool;

/// Outcome of offering the head of the buffer to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The command was executed and removed from the buffer.
    Consumed,
    /// Left in place; retried next tick.
    Deferred,
    /// An unrecognised byte was discarded.
    Dropped,
}
