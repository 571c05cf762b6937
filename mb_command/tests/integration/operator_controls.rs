//! Integration test: operator controls applied while a job runs.
//!
//! 1. A pause height stops the job once, when the platform gets there
//! 2. The build speed factor scales accelerated host moves only

use mb_command::hw::{MotionPipeline, Toolhead};
use mb_command::motion::MoveModifiers;
use mb_command::sim::{BoardEvent, SimMachine, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use mb_common::state::{HeaterPolicy, PauseState};

use super::tick_until;

fn machine() -> SimMachine {
    SimMachine::new(&MachineConfig::default())
}

/// Origin, then four layers 100 steps apart, each with an X move.
fn layered_job() -> Vec<u8> {
    (1..=4)
        .fold(StreamBuilder::new().set_position(Point::ZERO), |b, i| {
            b.queue_point_new(Point::new(i * 200, 0, i * 100, 0, 0), 10_000, AxisMask::empty())
        })
        .build()
}

// ── Pause height ────────────────────────────────────────────────────

#[test]
fn job_pauses_once_at_requested_height() {
    let mut m = machine();
    m.toolhead.set_temperature(0, 220).unwrap();
    m.core.set_pause_height(&m.pipeline, Some(250));
    m.feed(&layered_job());

    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));
    // the first layer at or above the height was queued, nothing after it
    assert_eq!(m.core.paused_position()[Axis::Z], 300);
    assert_eq!(m.core.line_number(), 4);
    assert_eq!(m.core.pause_height(), None);
    assert!(m.board.events().iter().any(|e| matches!(e, BoardEvent::Buzz { .. })));
    // heaters stay as they were
    assert_eq!(m.toolhead.set_point(0), Ok(220));

    assert!(m.core.pause(false, HeaterPolicy::LeaveOn));
    m.run_until_idle(100);
    assert_eq!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.pipeline.current_position(), Point::new(800, 0, 400, 0, 0));
    assert_eq!(m.core.line_number(), 5);
}

#[test]
fn cleared_height_never_pauses() {
    let mut m = machine();
    m.core.set_pause_height(&m.pipeline, Some(250));
    m.core.set_pause_height(&m.pipeline, None);
    m.feed(&layered_job());
    m.run_until_idle(100);

    assert_eq!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.pipeline.current_position()[Axis::Z], 400);
    assert_eq!(m.core.status().pause_height, None);
}

#[test]
fn height_set_above_platform_waits_for_it_to_come_down() {
    let mut m = machine();
    m.feed(
        &StreamBuilder::new()
            .set_position(Point::new(0, 0, 5_000, 0, 0))
            .build(),
    );
    m.run_until_idle(10);
    m.core.set_pause_height(&m.pipeline, Some(1_000));

    let job = StreamBuilder::new()
        .queue_point_new(Point::new(0, 0, 4_000, 0, 0), 10_000, AxisMask::empty())
        .queue_point_new(Point::new(0, 0, 500, 0, 0), 10_000, AxisMask::empty())
        .queue_point_new(Point::new(0, 0, 1_200, 0, 0), 10_000, AxisMask::empty())
        .build();
    m.feed(&job);

    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));
    assert_eq!(m.core.paused_position()[Axis::Z], 1_200);
}

#[test]
fn reset_forgets_pause_height() {
    let mut m = machine();
    m.core.set_pause_height(&m.pipeline, Some(250));
    m.reset();
    assert_eq!(m.core.pause_height(), None);
}

// ── Build speed ─────────────────────────────────────────────────────

#[test]
fn speed_flag_is_not_an_axis() {
    let mut m = machine();
    let job = StreamBuilder::new()
        .set_position(Point::new(100, 0, 0, 0, 0))
        .queue_point_new_ext(
            Point::new(880, 0, 0, 0, 0),
            1_600,
            AxisMask::empty(),
            MoveModifiers::SPEED_CONTROL,
            10.0,
            64 * 80,
        )
        .build();
    m.feed(&job);
    m.run_until_idle(20);

    assert_eq!(m.pipeline.current_position()[Axis::X], 880);
    let req = m.pipeline.submitted()[0];
    assert_eq!(req.rate, 1_600);
    assert_eq!(req.feedrate, 80.0);
}

#[test]
fn speed_factor_scales_job_but_not_parking() {
    let mut m = machine();
    m.feed(
        &StreamBuilder::new()
            .find_axes(false, AxisMask::CARTESIAN, 500, 60)
            .set_position(Point::ZERO)
            .build(),
    );
    m.run_until_idle(100);
    assert!(m.core.translator().cartesian_referenced());
    assert_eq!(m.core.set_speed_factor(2.0), 2.0);

    let job = StreamBuilder::new()
        .queue_point_new_ext(
            Point::new(880, 0, 100, 0, 0),
            1_600,
            AxisMask::empty(),
            MoveModifiers::empty(),
            10.0,
            64 * 80,
        )
        .build();
    m.feed(&job);
    m.run_until_idle(20);
    let printed = *m.pipeline.submitted().last().unwrap();
    assert_eq!(printed.rate, 3_200);
    assert_eq!(printed.feedrate, 160.0);
    assert_eq!(m.core.status().speed_factor, 2.0);

    assert!(m.core.pause(true, HeaterPolicy::LeaveOn));
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));
    let park = *m.pipeline.submitted().last().unwrap();
    let config = MachineConfig::default();
    let z = config.axis(Axis::Z);
    assert!(park.accelerate);
    assert_eq!(park.rate, (z.max_feedrate * z.steps_per_mm) as u32);
}
