//! P-Stop latch.
//!
//! The P-Stop input may be asserted at any time from interrupt context
//! (or, on the host, from a signal handler). The main loop acts on it only
//! once the latch is armed:
//!
//! - each accepted motion command counts toward arming; the latch arms
//!   once the count exceeds the configured threshold
//! - `WAIT_FOR_TOOL` / `WAIT_FOR_PLATFORM` arm it directly, since the
//!   coordinate frame is established by the time a job heats up
//!
//! A latched signal that is not yet honoured stays latched.

use std::sync::Arc;

use mb_common::config::MotionConfig;
use tracing::debug;

use crate::hw::IsrCell;

/// Asynchronous stop request, shared with the asserting context.
#[derive(Debug, Default)]
pub struct StopSignal {
    asserted: IsrCell<bool>,
}

impl StopSignal {
    pub const fn new() -> Self {
        Self {
            asserted: IsrCell::new(false),
        }
    }

    /// Assert the stop. Safe from interrupt or signal context.
    #[inline]
    pub fn trigger(&self) {
        self.asserted.store(true);
    }

    #[inline]
    pub fn is_asserted(&self) -> bool {
        self.asserted.load()
    }

    #[inline]
    pub fn clear(&self) {
        self.asserted.store(false);
    }
}

/// Debounced P-Stop state owned by the main loop.
#[derive(Debug, Clone)]
pub struct PStopLatch {
    signal: Arc<StopSignal>,
    enabled: bool,
    threshold: u8,
    move_count: u8,
    armed: bool,
}

impl PStopLatch {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            signal: Arc::new(StopSignal::new()),
            enabled: config.pstop_enabled,
            threshold: config.pstop_move_threshold,
            move_count: 0,
            armed: false,
        }
    }

    /// Handle for the asserting context.
    pub fn signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.signal)
    }

    #[inline]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    #[inline]
    pub fn is_latched(&self) -> bool {
        self.signal.is_asserted()
    }

    #[inline]
    pub const fn move_count(&self) -> u8 {
        self.move_count
    }

    /// One motion command was accepted.
    pub fn note_motion(&mut self) {
        if self.armed {
            return;
        }
        self.move_count = self.move_count.saturating_add(1);
        if self.move_count > self.threshold {
            debug!(moves = self.move_count, "P-Stop armed");
            self.armed = true;
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Consume the latched signal if it may be honoured now.
    pub fn take_if_armed(&mut self) -> bool {
        if !self.enabled || !self.armed {
            return false;
        }
        self.signal.asserted.replace(false)
    }

    /// Drop a latched signal without acting on it.
    pub fn clear_latch(&self) {
        self.signal.clear();
    }

    /// Job start: disarm and forget any latched signal.
    pub fn reset(&mut self) {
        self.signal.clear();
        self.move_count = 0;
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latch() -> PStopLatch {
        PStopLatch::new(&MotionConfig::default())
    }

    #[test]
    fn not_honoured_before_threshold() {
        let mut l = latch();
        l.signal().trigger();
        l.note_motion();
        l.note_motion();
        assert!(!l.take_if_armed());
        // still latched for later
        assert!(l.is_latched());
    }

    #[test]
    fn honoured_once_count_exceeds_threshold() {
        let mut l = latch();
        for _ in 0..4 {
            l.note_motion();
        }
        assert!(!l.is_armed());
        l.note_motion();
        assert!(l.is_armed());
        l.signal().trigger();
        assert!(l.take_if_armed());
        assert!(!l.is_latched());
        assert!(!l.take_if_armed());
    }

    #[test]
    fn explicit_arm() {
        let mut l = latch();
        l.arm();
        l.signal().trigger();
        assert!(l.take_if_armed());
    }

    #[test]
    fn disabled_latch_never_fires() {
        let mut cfg = MotionConfig::default();
        cfg.pstop_enabled = false;
        let mut l = PStopLatch::new(&cfg);
        l.arm();
        l.signal().trigger();
        assert!(!l.take_if_armed());
    }

    #[test]
    fn reset_disarms_and_clears() {
        let mut l = latch();
        l.arm();
        l.signal().trigger();
        l.reset();
        assert!(!l.is_armed());
        assert!(!l.is_latched());
        assert_eq!(l.move_count(), 0);
    }

    #[test]
    fn signal_from_another_thread() {
        let mut l = latch();
        l.arm();
        let signal = l.signal();
        std::thread::spawn(move || signal.trigger()).join().unwrap();
        assert!(l.take_if_armed());
    }
}
