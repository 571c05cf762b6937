//! Execution mode state machine.
//!
//! `Ready` is the only mode in which a new command may be dispatched. Every
//! other mode is entered by a command handler and left by the controller
//! once its completion condition is observed:
//!
//! | Mode | Entered by | Completes when |
//! |------|-----------|----------------|
//! | `Moving` | move filled the pipeline | pipeline not running |
//! | `Delay` | `DELAY` | timeout |
//! | `Homing` | `FIND_AXES_*` | pipeline not running, or homing timeout |
//! | `WaitOnTool` | `WAIT_FOR_TOOL` | tool ready, or timeout |
//! | `WaitOnPlatform` | `WAIT_FOR_PLATFORM` | platform ready, or timeout |
//! | `WaitOnButton` | `PAUSE_FOR_BUTTON`, `DISPLAY_MESSAGE` | button, or timeout |

use mb_common::protocol::ButtonBehavior;
use mb_common::state::ExecutionMode;
use tracing::debug;

use super::timeout::Timeout;

/// Events that drive the mode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// A queued move left the pipeline at its configured depth.
    QueueFull,
    StartDelay,
    StartHoming,
    WaitForTool,
    WaitForPlatform,
    WaitForButton,
    /// The current mode's completion condition was met.
    Completed,
}

/// Result of a mode transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeTransition {
    Ok(ExecutionMode),
    Rejected(&'static str),
}

/// Execution mode plus the deadlines of the timed modes.
#[derive(Debug, Clone, Default)]
pub struct ModeMachine {
    mode: ExecutionMode,
    /// `Delay` deadline.
    delay: Timeout,
    /// `WaitOnTool` / `WaitOnPlatform` deadline.
    tool_wait: Timeout,
    /// `WaitOnButton` deadline.
    button_wait: Timeout,
    /// What to do when the button wait ends.
    button_behavior: ButtonBehavior,
}

impl ModeMachine {
    pub const fn new() -> Self {
        Self {
            mode: ExecutionMode::Ready,
            delay: Timeout::idle(),
            tool_wait: Timeout::idle(),
            button_wait: Timeout::idle(),
            button_behavior: ButtonBehavior::empty(),
        }
    }

    #[inline]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.mode == ExecutionMode::Ready
    }

    #[inline]
    pub const fn button_behavior(&self) -> ButtonBehavior {
        self.button_behavior
    }

    /// Handle a mode event.
    pub fn handle_event(&mut self, event: ModeEvent) -> ModeTransition {
        use ExecutionMode as M;
        use ModeEvent as E;

        let next = match (self.mode, event) {
            (M::Ready, E::QueueFull) => M::Moving,
            (M::Ready, E::StartDelay) => M::Delay,
            (M::Ready, E::StartHoming) => M::Homing,
            (M::Ready, E::WaitForTool) => M::WaitOnTool,
            (M::Ready, E::WaitForPlatform) => M::WaitOnPlatform,
            (M::Ready, E::WaitForButton) => M::WaitOnButton,

            // Homing submits a move that may itself fill the pipeline
            (M::Homing, E::QueueFull) => M::Homing,

            (_, E::Completed) => M::Ready,

            _ => return ModeTransition::Rejected("command dispatched outside Ready"),
        };

        if next != self.mode {
            debug!(from = ?self.mode, to = ?next, "execution mode");
        }
        self.mode = next;
        ModeTransition::Ok(next)
    }

    // ── Timed entries ──

    pub fn start_delay(&mut self, now_us: u64, duration_us: u64) -> ModeTransition {
        let t = self.handle_event(ModeEvent::StartDelay);
        if matches!(t, ModeTransition::Ok(_)) {
            self.delay.start(now_us, duration_us);
        }
        t
    }

    pub fn start_tool_wait(&mut self, now_us: u64, timeout_s: u16) -> ModeTransition {
        let t = self.handle_event(ModeEvent::WaitForTool);
        if matches!(t, ModeTransition::Ok(_)) {
            self.tool_wait.start_seconds(now_us, timeout_s as u32);
        }
        t
    }

    pub fn start_platform_wait(&mut self, now_us: u64, timeout_s: u16) -> ModeTransition {
        let t = self.handle_event(ModeEvent::WaitForPlatform);
        if matches!(t, ModeTransition::Ok(_)) {
            self.tool_wait.start_seconds(now_us, timeout_s as u32);
        }
        t
    }

    pub fn start_button_wait(
        &mut self,
        now_us: u64,
        timeout_s: u16,
        behavior: ButtonBehavior,
    ) -> ModeTransition {
        let t = self.handle_event(ModeEvent::WaitForButton);
        if matches!(t, ModeTransition::Ok(_)) {
            self.button_wait.start_seconds(now_us, timeout_s as u32);
            self.button_behavior = behavior;
        }
        t
    }

    // ── Deadlines ──

    #[inline]
    pub fn delay_elapsed(&self, now_us: u64) -> bool {
        self.delay.has_elapsed(now_us)
    }

    #[inline]
    pub fn tool_wait_elapsed(&self, now_us: u64) -> bool {
        self.tool_wait.has_elapsed(now_us)
    }

    #[inline]
    pub fn button_wait_elapsed(&self, now_us: u64) -> bool {
        self.button_wait.has_elapsed(now_us)
    }

    /// Back to `Ready` with every deadline cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
