mod dispatch;
mod ditto;
mod operator_controls;
mod pause_resume;
mod pstop;
mod storage_fault;

use mb_command::sim::{SimMachine, StreamBuilder};
use mb_common::point::Point;
use mb_common::protocol::AxisMask;

/// Tick with instant motion until `done` holds. Returns whether it did.
pub fn tick_until(m: &mut SimMachine, max_ticks: usize, done: impl Fn(&SimMachine) -> bool) -> bool {
    for _ in 0..max_ticks {
        if done(m) {
            return true;
        }
        m.tick();
        m.pipeline.complete_all();
    }
    done(m)
}

/// Define the origin, then `n` timed X moves of 100 steps each.
pub fn x_moves(n: i32) -> StreamBuilder {
    (1..=n).fold(StreamBuilder::new().set_position(Point::ZERO), |b, i| {
        b.queue_point_new(Point::new(i * 100, 0, 0, 0, 0), 10_000, AxisMask::empty())
    })
}
