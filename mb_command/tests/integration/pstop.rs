//! Integration test: P-Stop debounce and handling.
//!
//! 1. A latched P-Stop is ignored until more than the threshold of moves
//!    followed the last reset
//! 2. Once honoured it pauses with every heater off and latches a message
//! 3. It is never honoured mid-homing; it waits for the homing to end

use mb_command::controller::PSTOP_MESSAGE;
use mb_command::hw::Toolhead;
use mb_command::sim::{SimMachine, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::protocol::AxisMask;
use mb_common::state::{ExecutionMode, PauseState};

use super::{tick_until, x_moves};

fn machine() -> SimMachine {
    SimMachine::new(&MachineConfig::default())
}

fn heat(m: &mut SimMachine) {
    m.toolhead.set_temperature(0, 220).unwrap();
    m.toolhead.set_temperature(1, 215).unwrap();
    m.toolhead.set_platform_temperature(100).unwrap();
}

// ── Debounce ────────────────────────────────────────────────────────

#[test]
fn pstop_after_two_moves_is_ignored() {
    let mut m = machine();
    m.feed(&x_moves(2).build());
    m.run_until_idle(100);
    assert_eq!(m.core.pstop().move_count(), 2);

    m.core.stop_signal().trigger();
    for _ in 0..10 {
        m.tick();
        m.pipeline.complete_all();
    }
    assert_eq!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.core.error_message(), None);
    // still latched, waiting for the frame to be trusted
    assert!(m.core.pstop().is_latched());
}

#[test]
fn pstop_after_five_moves_pauses_with_heaters_off() {
    let mut m = machine();
    heat(&mut m);
    m.feed(&x_moves(5).build());
    m.run_until_idle(100);
    assert!(m.core.pstop().is_armed());

    m.core.stop_signal().trigger();
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));

    assert_eq!(m.core.error_message(), Some(PSTOP_MESSAGE));
    assert!(!m.core.pstop().is_latched());
    assert_eq!(m.toolhead.set_point(0), Ok(0));
    assert_eq!(m.toolhead.set_point(1), Ok(0));
    assert_eq!(m.toolhead.platform_set_point(), Ok(0));
    assert!(!m.toolhead.fan(0));
}

#[test]
fn wait_for_tool_arms_immediately() {
    let mut m = machine();
    m.feed(&x_moves(1).wait_for_tool(0, 0).build());
    m.run_until_idle(100);
    assert!(m.core.pstop().is_armed());

    m.core.stop_signal().trigger();
    m.tick();
    assert!(m.core.pause_state().is_intermediate());
}

#[test]
fn resume_clears_pstop_message() {
    let mut m = machine();
    m.feed(&x_moves(6).build());
    m.run_until_idle(100);
    m.core.stop_signal().trigger();
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));

    let settings = m.settings.clone();
    assert!(m.core.pause_with_stored_policy(false, &settings));
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::None));
    assert_eq!(m.core.error_message(), None);
}

// ── Homing ──────────────────────────────────────────────────────────

#[test]
fn pstop_waits_for_homing_to_finish() {
    let mut m = machine();
    m.feed(&x_moves(5).build());
    m.run_until_idle(100);

    m.feed(
        &StreamBuilder::new()
            .find_axes(false, AxisMask::X | AxisMask::Y, 500, 30)
            .build(),
    );
    m.tick();
    assert_eq!(m.core.mode(), ExecutionMode::Homing);

    m.core.stop_signal().trigger();
    m.tick();
    m.tick();
    assert_eq!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.core.mode(), ExecutionMode::Homing);

    m.pipeline.hit_endstops();
    // homing resolves, then the next slice honours the stop
    m.tick();
    assert_eq!(m.core.mode(), ExecutionMode::Ready);
    m.tick();
    assert_ne!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.core.error_message(), Some(PSTOP_MESSAGE));
}

#[test]
fn disabled_pstop_is_never_honoured() {
    let mut config = MachineConfig::default();
    config.motion.pstop_enabled = false;
    let mut m: SimMachine = SimMachine::new(&config);
    m.feed(&x_moves(8).build());
    m.run_until_idle(100);
    m.core.stop_signal().trigger();
    for _ in 0..10 {
        m.tick();
    }
    assert_eq!(m.core.pause_state(), PauseState::None);
}
