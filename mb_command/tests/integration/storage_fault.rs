//! Integration test: storage card faults during playback.
//!
//! 1. A read fault mid-job shuts the machine down safely: filament
//!    committed, heaters off, axes disabled, buffer flushed
//! 2. Without a panel the build parks and ends cancelled
//! 3. With a panel the pause chain stops in `Error` until acknowledged
//! 4. A clean end of file only finishes playback

use mb_command::hw::{PlaybackSource, SettingsStore, Toolhead};
use mb_command::sim::{BoardEvent, SimMachine, SimPlayback, StreamBuilder};
use mb_common::config::MachineConfig;
use mb_common::error::StorageFault;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;
use mb_common::state::{BuildState, PauseState};

use super::x_moves;

fn machine() -> SimMachine {
    SimMachine::new(&MachineConfig::default())
}

/// Fill from the card and tick with instant motion until `done`.
fn play_until(
    m: &mut SimMachine,
    card: &mut SimPlayback,
    max_ticks: usize,
    done: impl Fn(&SimMachine) -> bool,
) -> bool {
    for _ in 0..max_ticks {
        if done(m) {
            return true;
        }
        m.with_io(|core, io| core.fill_from_storage(io, card));
        m.tick();
        m.pipeline.complete_all();
    }
    done(m)
}

/// A job longer than the command buffer whose extruder moves, so there
/// is filament to commit by the time the card fails near its end.
fn extruding_job() -> Vec<u8> {
    let start = StreamBuilder::new()
        .enable_axes(AxisMask::all(), true)
        .set_position(Point::ZERO);
    (1..=30)
        .fold(start, |b, i| {
            b.queue_point_new(Point::new(i * 50, 0, 0, -i * 10, 0), 10_000, AxisMask::empty())
        })
        .build()
}

// ── Shutdown ────────────────────────────────────────────────────────

#[test]
fn read_fault_without_panel_cancels_build() {
    let mut m = machine();
    m.toolhead.set_temperature(0, 220).unwrap();
    m.toolhead.set_platform_temperature(100).unwrap();
    let job = extruding_job();
    let mut card = SimPlayback::new(job.clone()).with_fault(job.len() - 10, StorageFault::Read);

    assert!(play_until(&mut m, &mut card, 500, |m| m.pipeline.is_enabled(Axis::X)));
    assert!(play_until(&mut m, &mut card, 500, |m| {
        m.core.build_state() == BuildState::Cancelled
    }));

    assert!(m.core.storage_error());
    assert_eq!(m.core.error_message(), Some("SD read error"));
    assert_eq!(m.core.pause_state(), PauseState::None);
    assert!(m.core.buffer().is_empty());
    assert!(!card.is_playing());
    assert_eq!(m.toolhead.set_point(0), Ok(0));
    assert_eq!(m.toolhead.platform_set_point(), Ok(0));
    for axis in Axis::ALL {
        assert!(!m.pipeline.is_enabled(axis), "{axis:?} still enabled");
    }
    assert!(m.board.events().contains(&BoardEvent::Error("SD read error")));
    // the filament used so far went to the lifetime counter
    assert!(m.settings.filament_lifetime(0) > 0);
}

#[test]
fn read_fault_with_panel_waits_for_acknowledgement() {
    let mut m = machine();
    m.board.set_interface(true);
    let job = extruding_job();
    let mut card = SimPlayback::new(job.clone()).with_fault(job.len() - 10, StorageFault::NoCard);

    assert!(play_until(&mut m, &mut card, 500, |m| {
        m.core.pause_state() == PauseState::Error
    }));
    assert_eq!(m.core.build_state(), BuildState::Cancelling);
    assert_eq!(m.core.error_message(), Some("SD card removed"));

    // nothing moves while the error stands
    let submitted = m.pipeline.submitted().len();
    for _ in 0..5 {
        m.tick();
    }
    assert_eq!(m.pipeline.submitted().len(), submitted);

    assert!(m.core.clear_pause_error());
    assert_eq!(m.core.pause_state(), PauseState::None);
    assert_eq!(m.core.build_state(), BuildState::Cancelled);
    assert_eq!(m.core.error_message(), None);
    assert!(!m.core.storage_error());
    assert!(!m.core.clear_pause_error());
}

// ── Clean end ───────────────────────────────────────────────────────

#[test]
fn clean_end_of_file_finishes_playback() {
    let mut m = machine();
    let mut card = SimPlayback::new(x_moves(3).build_end().build());

    assert!(play_until(&mut m, &mut card, 200, |m| {
        m.core.build_state() == BuildState::Finished && m.core.buffer().is_empty()
    }));
    assert!(card.is_finished());
    assert!(!m.core.storage_error());
    assert_eq!(m.core.line_number(), 5);
}
