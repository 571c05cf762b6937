//! Integration test: ditto printing.
//!
//! With ditto enabled on a two-tool machine every extruder move and
//! temperature request for the active tool is mirrored onto the idle one.

use mb_command::hw::{MemorySettings, MotionPipeline, SettingKey, Toolhead};
use mb_command::motion::SingleExtruder;
use mb_command::sim::{SimMachine, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use mb_common::state::{HeaterPolicy, PauseState};

use super::tick_until;

fn ditto_settings() -> MemorySettings {
    MemorySettings::new().with(SettingKey::DittoEnabled, 1)
}

fn ditto_machine() -> SimMachine {
    SimMachine::with_settings(&MachineConfig::default(), ditto_settings())
}

#[test]
fn relative_extrusion_drives_both_nozzles() {
    let mut m = ditto_machine();
    assert!(m.core.translator().ditto());

    let job = StreamBuilder::new()
        .set_position(Point::ZERO)
        .queue_point_new(Point::new(200, 0, 0, 100, 0), 10_000, AxisMask::A)
        .queue_point_new(Point::new(400, 0, 0, 100, 0), 10_000, AxisMask::A)
        .build();
    m.feed(&job);
    m.run_until_idle(100);

    let here = m.pipeline.current_position();
    assert_eq!(here[Axis::X], 400);
    assert_eq!(here[Axis::A], 200);
    assert_eq!(here[Axis::B], 200);
    assert_eq!(m.core.translator().filament().signed_length(0), 200);
    assert_eq!(m.core.translator().filament().signed_length(1), 200);
}

#[test]
fn heating_job_mirrors_set_points() {
    let mut m = ditto_machine();
    let job = StreamBuilder::new()
        .set_temperature(0, 215)
        .set_platform_temperature(100)
        .wait_for_tool(0, 0)
        .wait_for_platform(0)
        .build();
    m.feed(&job);
    m.run_until_idle(100);

    assert_eq!(m.toolhead.set_point(0), Ok(215));
    assert_eq!(m.toolhead.set_point(1), Ok(215));
    assert_eq!(m.toolhead.platform_set_point(), Ok(100));
    assert_eq!(m.core.line_number(), 4);
}

#[test]
fn pause_keeps_nozzles_together() {
    let mut m = ditto_machine();
    let job = StreamBuilder::new()
        .set_position(Point::ZERO)
        .queue_point_new(Point::new(500, 500, 0, -300, 0), 50_000, AxisMask::empty())
        .build();
    m.feed(&job);
    m.run_until_idle(100);
    let printed = m.pipeline.current_position();
    assert_eq!(printed[Axis::A], printed[Axis::B]);

    assert!(m.core.pause(true, HeaterPolicy::LeaveOn));
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::Paused));
    let parked = m.pipeline.current_position();
    assert_eq!(parked[Axis::A], parked[Axis::B]);

    assert!(m.core.pause(false, HeaterPolicy::LeaveOn));
    assert!(tick_until(&mut m, 50, |m| m.core.pause_state() == PauseState::None));
    assert_eq!(m.pipeline.current_position(), printed);
}

#[test]
fn single_tool_machine_ignores_ditto() {
    let mut config = MachineConfig::default();
    config.tools.count = 1;
    let m: SimMachine = SimMachine::with_settings(&config, ditto_settings());
    assert!(!m.core.translator().ditto());

    let m: SimMachine<SingleExtruder> =
        SimMachine::with_settings(&MachineConfig::default(), ditto_settings());
    assert!(!m.core.translator().ditto());
}
