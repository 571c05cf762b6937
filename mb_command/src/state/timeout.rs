//! Microsecond deadlines.

/// One-shot deadline against the board's microsecond clock.
///
/// An idle timeout never elapses, which is how a zero-second wait on the
/// wire means "wait forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout {
    deadline: Option<u64>,
}

impl Timeout {
    pub const fn idle() -> Self {
        Self { deadline: None }
    }

    /// Arm to elapse `duration_us` after `now_us`.
    pub fn start(&mut self, now_us: u64, duration_us: u64) {
        self.deadline = Some(now_us.saturating_add(duration_us));
    }

    /// Arm from a wire-level seconds field; 0 disarms.
    pub fn start_seconds(&mut self, now_us: u64, seconds: u32) {
        if seconds == 0 {
            self.clear();
        } else {
            self.start(now_us, seconds as u64 * 1_000_000);
        }
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    #[inline]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[inline]
    pub fn has_elapsed(&self, now_us: u64) -> bool {
        self.deadline.is_some_and(|d| now_us >= d)
    }
}
