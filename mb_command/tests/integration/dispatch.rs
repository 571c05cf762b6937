//! Integration test: whole jobs over the host link.
//!
//! Streams longer than the command buffer, build notifications, timed
//! waits and homing, run against the simulated machine end to end.

use mb_command::hw::{MotionPipeline, SettingsStore};
use mb_command::sim::{BoardEvent, SimMachine, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::point::{Axis, Point};
use mb_common::protocol::{AxisMask, ButtonBehavior};
use mb_common::state::{BuildState, ExecutionMode};

use super::{tick_until, x_moves};

fn machine() -> SimMachine {
    SimMachine::new(&MachineConfig::default())
}

/// Push `job` through the buffer as space frees up, ticking with instant
/// motion. Returns the ticks it took.
fn stream(m: &mut SimMachine, job: &[u8], max_ticks: usize) -> usize {
    let mut sent = 0;
    for n in 0..max_ticks {
        sent += m.feed(&job[sent..]);
        if sent == job.len() && m.core.buffer().is_empty() && m.core.mode() == ExecutionMode::Ready {
            return n;
        }
        m.tick();
        m.pipeline.complete_all();
    }
    panic!("job not done after {max_ticks} ticks ({sent}/{} bytes sent)", job.len());
}

// ── Streaming ───────────────────────────────────────────────────────

#[test]
fn job_larger_than_buffer_runs_in_order() {
    let mut m = machine();
    let job = x_moves(80).build();
    assert!(job.len() > m.core.buffer().capacity());

    stream(&mut m, &job, 1_000);

    assert_eq!(m.pipeline.current_position(), Point::new(8_000, 0, 0, 0, 0));
    assert_eq!(m.core.line_number(), 81);
    let xs: Vec<i32> = m.pipeline.submitted().iter().map(|r| r.target[Axis::X]).collect();
    assert!(xs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn unknown_bytes_between_commands_are_skipped() {
    let mut m = machine();
    let job = x_moves(2)
        .raw(&[0xee])
        .queue_point_new(Point::new(300, 0, 0, 0, 0), 10_000, AxisMask::empty())
        .build();

    stream(&mut m, &job, 100);

    assert_eq!(m.pipeline.current_position()[Axis::X], 300);
    assert_eq!(m.core.line_number(), 4);
}

// ── Build lifecycle ─────────────────────────────────────────────────

#[test]
fn build_notifications_track_the_job() {
    let mut m = machine();
    let job = StreamBuilder::new()
        .build_start(1_000, "bracket")
        .build_percent(10)
        .set_position(Point::ZERO)
        .queue_point_new(Point::new(100, 0, 0, -96, 0), 10_000, AxisMask::empty())
        .build_percent(100)
        .build_end()
        .build();
    m.feed(&job);

    assert!(tick_until(&mut m, 10, |m| m.core.build_state() == BuildState::Running));
    stream(&mut m, &[], 100);

    assert_eq!(m.core.build_state(), BuildState::Finished);
    let events = m.board.events();
    assert!(events.contains(&BoardEvent::BuildStarted("bracket".into())));
    assert!(events.contains(&BoardEvent::BuildEnded(0)));
    assert_eq!(m.core.status().build_state, BuildState::Finished);
}

#[test]
fn another_copy_commits_filament() {
    let mut m = machine();
    let job = StreamBuilder::new()
        .set_position(Point::ZERO)
        .queue_point_new(Point::new(100, 0, 0, -500, 0), 10_000, AxisMask::empty())
        .build();
    stream(&mut m, &job, 100);
    assert_eq!(m.core.translator().filament().length(0), 500);

    m.with_io(|core, io| core.build_another_copy(io));

    assert_eq!(m.settings.filament_lifetime(0), 500);
    assert_eq!(m.core.translator().filament().length(0), 0);
    assert!(m.core.buffer().is_empty());
}

// ── Waits ───────────────────────────────────────────────────────────

#[test]
fn delay_holds_the_next_command() {
    let mut m = machine();
    m.feed(&StreamBuilder::new().delay(250).change_tool(1).build());
    m.tick();
    assert_eq!(m.core.mode(), ExecutionMode::Delay);

    m.step(100_000);
    m.step(100_000);
    assert_eq!(m.core.mode(), ExecutionMode::Delay);
    assert_eq!(m.core.translator().tool(), 0);

    m.step(60_000);
    m.step(0);
    assert_eq!(m.core.mode(), ExecutionMode::Ready);
    assert_eq!(m.core.translator().tool(), 1);
}

#[test]
fn button_pause_holds_until_pressed() {
    let mut m = machine();
    m.board.set_interface(true);
    let job = x_moves(1)
        .beep(880, 200)
        .pause_for_button(0xff, 0, ButtonBehavior::CLEAR_SCREEN)
        .queue_point_new(Point::new(500, 0, 0, 0, 0), 10_000, AxisMask::empty())
        .build();
    m.feed(&job);

    assert!(tick_until(&mut m, 10, |m| m.core.mode() == ExecutionMode::WaitOnButton));
    for _ in 0..5 {
        m.step(1_000_000);
    }
    assert_eq!(m.core.mode(), ExecutionMode::WaitOnButton);
    assert_eq!(m.pipeline.current_position()[Axis::X], 100);

    m.board.press_button();
    stream(&mut m, &[], 10);
    assert_eq!(m.pipeline.current_position()[Axis::X], 500);
    assert_eq!(m.board.messages_hidden(), 1);
    let events = m.board.events();
    assert!(events.contains(&BoardEvent::Buzz { frequency: 880, duration_ms: 200, repeats: 0 }));
    assert!(events.contains(&BoardEvent::WaitForButton(0xff)));
}

#[test]
fn homed_job_marks_cartesian_referenced() {
    let mut m = machine();
    let job = StreamBuilder::new()
        .find_axes(false, AxisMask::X | AxisMask::Y, 500, 30)
        .find_axes(true, AxisMask::Z, 500, 30)
        .set_position(Point::ZERO)
        .store_home(AxisMask::CARTESIAN)
        .build();
    m.feed(&job);

    assert!(tick_until(&mut m, 10, |m| m.core.mode() == ExecutionMode::Homing));
    assert!(m.pipeline.is_homing());
    assert!(!m.core.translator().cartesian_referenced());
    stream(&mut m, &[], 100);

    assert!(m.core.translator().cartesian_referenced());
    assert_eq!(m.core.line_number(), 4);
    assert_eq!(m.settings.home_position(Axis::X), 0);
    assert!(!m.pipeline.is_running());
}
