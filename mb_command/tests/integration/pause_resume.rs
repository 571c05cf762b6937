//! Integration test: operator pause and resume.
//!
//! Validates the full enter/exit chain against the simulated pipeline:
//! 1. Retract, park (when referenced), heaters per policy
//! 2. Resume returns to the captured anchor and unretracts
//! 3. Filament counters and set points survive the round trip

use mb_command::hw::{MotionPipeline, Toolhead};
use mb_command::sim::{SimMachine, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use mb_common::state::{HeaterPolicy, PauseState};

use super::tick_until;

// ── Helpers ─────────────────────────────────────────────────────────

fn machine() -> SimMachine {
    SimMachine::new(&MachineConfig::default())
}

const PRINT_POSITION: Point = Point::new(1_000, 500, 800, -300, 0);

fn print_to(m: &mut SimMachine, target: Point) {
    let job = StreamBuilder::new()
        .set_position(Point::ZERO)
        .queue_point_new(target, 50_000, AxisMask::empty())
        .build();
    m.feed(&job);
    m.run_until_idle(100);
}

fn pause(m: &mut SimMachine, policy: HeaterPolicy) {
    assert!(m.core.pause(true, policy));
    assert!(tick_until(m, 50, |m| m.core.pause_state() == PauseState::Paused));
}

fn resume(m: &mut SimMachine, policy: HeaterPolicy) {
    assert!(m.core.pause(false, policy));
    assert!(tick_until(m, 50, |m| m.core.pause_state() == PauseState::None));
}

fn retract_steps(axis: Axis) -> i32 {
    let config = MachineConfig::default();
    config.axis(axis).mm_to_steps(config.pause.retract_mm)
}

// ── Round trip ──────────────────────────────────────────────────────

#[test]
fn pause_and_resume_returns_to_anchor() {
    let mut m = machine();
    print_to(&mut m, PRINT_POSITION);
    let filament_before = m.core.translator().filament().signed_length(0);

    pause(&mut m, HeaterPolicy::LeaveOn);
    assert_eq!(m.core.paused_position(), PRINT_POSITION);
    // extrude_when_negative: retraction pulls positive
    let parked = m.pipeline.current_position();
    assert_eq!(parked[Axis::A], PRINT_POSITION[Axis::A] + retract_steps(Axis::A));
    assert_eq!(parked[Axis::B], retract_steps(Axis::B));
    // not homed, so the platform stays put
    assert_eq!(parked[Axis::Z], PRINT_POSITION[Axis::Z]);

    resume(&mut m, HeaterPolicy::LeaveOn);
    assert_eq!(m.pipeline.current_position(), PRINT_POSITION);
    assert_eq!(m.pipeline.last_queued_position(), PRINT_POSITION);
    assert_eq!(m.core.translator().filament().signed_length(0), filament_before);
}

#[test]
fn job_continues_after_resume() {
    let mut m = machine();
    print_to(&mut m, PRINT_POSITION);
    pause(&mut m, HeaterPolicy::LeaveOn);

    // commands arriving while paused wait
    let next = Point::new(2_000, 500, 800, -400, 0);
    m.feed(&StreamBuilder::new().queue_point_new(next, 50_000, AxisMask::empty()).build());
    m.tick();
    assert!(!m.core.buffer().is_empty());

    resume(&mut m, HeaterPolicy::LeaveOn);
    m.run_until_idle(100);
    assert_eq!(m.pipeline.current_position(), next);
    assert_eq!(m.core.translator().filament().signed_length(0), -400);
}

#[test]
fn homed_machine_parks_platform() {
    let mut m = machine();
    m.feed(
        &StreamBuilder::new()
            .find_axes(false, AxisMask::CARTESIAN, 500, 60)
            .build(),
    );
    m.run_until_idle(100);
    print_to(&mut m, PRINT_POSITION);
    assert!(m.core.translator().cartesian_referenced());

    pause(&mut m, HeaterPolicy::LeaveOn);
    let config = MachineConfig::default();
    let z = config.axis(Axis::Z);
    let clear_z = z.max_steps - z.mm_to_steps(config.pause.clear_margin_mm);
    let parked = m.pipeline.current_position();
    assert_eq!(parked[Axis::Z], clear_z);
    assert_eq!(parked[Axis::X], PRINT_POSITION[Axis::X]);
    // parking is accelerated
    assert!(m.pipeline.submitted().last().is_some_and(|r| r.accelerate));

    resume(&mut m, HeaterPolicy::LeaveOn);
    assert_eq!(m.pipeline.current_position(), PRINT_POSITION);
}

#[test]
fn clear_unretract_skips_the_unretraction() {
    let mut m = machine();
    print_to(&mut m, PRINT_POSITION);
    pause(&mut m, HeaterPolicy::LeaveOn);
    m.core.clear_unretract();
    resume(&mut m, HeaterPolicy::LeaveOn);

    let here = m.pipeline.current_position();
    assert_eq!(here.with_cartesian_of(&PRINT_POSITION), here);
    // extruders stay where the pause left them, now called the anchor
    assert_eq!(here[Axis::A], PRINT_POSITION[Axis::A]);
    assert_eq!(here[Axis::X], PRINT_POSITION[Axis::X]);
}

// ── Heaters ─────────────────────────────────────────────────────────

#[test]
fn leave_on_never_touches_heaters() {
    let mut m = machine();
    m.toolhead.set_temperature(0, 220).unwrap();
    m.toolhead.set_fan(0, true).unwrap();
    print_to(&mut m, PRINT_POSITION);
    let writes = m.toolhead.temperature_writes();

    pause(&mut m, HeaterPolicy::LeaveOn);
    assert_eq!(m.toolhead.set_point(0), Ok(220));
    assert!(!m.toolhead.fan(0));

    resume(&mut m, HeaterPolicy::LeaveOn);
    assert_eq!(m.toolhead.temperature_writes(), writes);
    // fan comes back only after a heater suspension
    assert!(!m.toolhead.fan(0));
}

#[test]
fn suspended_heaters_are_restored_before_moving() {
    let mut m = machine();
    m.toolhead.set_temperature(0, 230).unwrap();
    m.toolhead.set_temperature(1, 0).unwrap();
    m.toolhead.set_platform_temperature(105).unwrap();
    print_to(&mut m, PRINT_POSITION);

    pause(&mut m, HeaterPolicy::ExtrudersAndPlatformOff);
    assert_eq!(m.toolhead.set_point(0), Ok(0));
    assert_eq!(m.toolhead.platform_set_point(), Ok(0));

    // hold in ExitWaitHeaters while the nozzle is cold
    m.toolhead.set_ready(0, false);
    assert!(m.core.pause(false, HeaterPolicy::ExtrudersAndPlatformOff));
    for _ in 0..10 {
        m.tick();
        m.pipeline.complete_all();
    }
    assert_eq!(m.core.pause_state(), PauseState::ExitWaitHeaters);
    assert_eq!(m.toolhead.set_point(0), Ok(230));
    assert_eq!(m.toolhead.set_point(1), Ok(0));
    assert_eq!(m.toolhead.platform_set_point(), Ok(105));
    assert!(m.toolhead.fan(0));

    m.toolhead.set_ready(0, true);
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::None));
    assert_eq!(m.pipeline.current_position(), PRINT_POSITION);
}

#[test]
fn extruders_off_keeps_platform() {
    let mut m = machine();
    m.toolhead.set_temperature(0, 230).unwrap();
    m.toolhead.set_platform_temperature(105).unwrap();
    print_to(&mut m, PRINT_POSITION);

    pause(&mut m, HeaterPolicy::ExtrudersOff);
    assert_eq!(m.toolhead.set_point(0), Ok(0));
    assert_eq!(m.toolhead.platform_set_point(), Ok(105));
}

// ── Requests ────────────────────────────────────────────────────────

#[test]
fn requests_out_of_order_are_ignored() {
    let mut m = machine();
    assert!(!m.core.pause(false, HeaterPolicy::LeaveOn));
    assert!(m.core.pause(true, HeaterPolicy::LeaveOn));
    // a second begin mid-chain does nothing
    assert!(!m.core.pause(true, HeaterPolicy::LeaveOn));
    assert!(!m.core.pause(false, HeaterPolicy::LeaveOn));
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));
    assert!(m.core.is_paused());
}
