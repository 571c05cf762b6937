//! Filament usage accounting.
//!
//! Tracks net extruder motion in steps, per extruder, as a side effect of
//! every accepted move. Absolute moves contribute the difference from the
//! previously recorded extruder coordinate, relative moves contribute
//! their delta directly.

use mb_common::consts::EXTRUDER_COUNT;
use mb_common::point::{Axis, Point};
use mb_common::protocol::AxisMask;

use crate::hw::SettingsStore;

/// Per-extruder filament accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilamentCounters {
    /// Net steps since the last commit.
    length: [i64; EXTRUDER_COUNT],
    /// Total of the previous job, kept for reporting after a commit.
    last_length: [i64; EXTRUDER_COUNT],
    /// Extruder coordinate seen in the last accepted move.
    last_position: [i32; EXTRUDER_COUNT],
}

impl FilamentCounters {
    pub const fn new() -> Self {
        Self {
            length: [0; EXTRUDER_COUNT],
            last_length: [0; EXTRUDER_COUNT],
            last_position: [0; EXTRUDER_COUNT],
        }
    }

    /// Account for one move in host coordinates. `relative` selects which
    /// extruder components are deltas.
    pub fn record(&mut self, target: &Point, relative: AxisMask) {
        for e in 0..EXTRUDER_COUNT {
            let axis = Axis::extruder(e);
            let value = target[axis];
            if relative.contains_index(axis.index()) {
                self.length[e] += value as i64;
                self.last_position[e] = self.last_position[e].wrapping_add(value);
            } else {
                self.length[e] += value as i64 - self.last_position[e] as i64;
                self.last_position[e] = value;
            }
        }
    }

    /// The host redefined the extruder coordinates without moving.
    pub fn set_position(&mut self, a: i32, b: i32) {
        self.last_position = [a, b];
    }

    /// Move the running totals (by magnitude) into the persisted lifetime
    /// counters and keep them as the "last job" figures.
    pub fn commit(&mut self, settings: &mut dyn SettingsStore) {
        for e in 0..EXTRUDER_COUNT {
            let steps = self.length[e].abs();
            if steps > 0 {
                settings.add_filament_lifetime(e, steps);
                self.last_length[e] = steps;
                self.length[e] = 0;
            }
        }
    }

    /// Absolute net steps of `extruder` since the last commit.
    #[inline]
    pub fn length(&self, extruder: usize) -> i64 {
        self.length[extruder].abs()
    }

    /// Signed net steps of `extruder` since the last commit.
    #[inline]
    pub fn signed_length(&self, extruder: usize) -> i64 {
        self.length[extruder]
    }

    #[inline]
    pub fn last_length(&self, extruder: usize) -> i64 {
        self.last_length[extruder].abs()
    }

    #[inline]
    pub fn last_position(&self, extruder: usize) -> i32 {
        self.last_position[extruder]
    }

    pub fn clear_last(&mut self) {
        self.last_length = [0; EXTRUDER_COUNT];
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::MemorySettings;

    #[test]
    fn absolute_moves_accumulate_differences() {
        let mut f = FilamentCounters::new();
        f.record(&Point::new(0, 0, 0, -100, 0), AxisMask::empty());
        f.record(&Point::new(0, 0, 0, -250, 40), AxisMask::empty());
        assert_eq!(f.signed_length(0), -250);
        assert_eq!(f.length(0), 250);
        assert_eq!(f.signed_length(1), 40);
        assert_eq!(f.last_position(0), -250);
    }

    #[test]
    fn relative_moves_add_delta_and_advance_position() {
        let mut f = FilamentCounters::new();
        f.set_position(1000, 0);
        f.record(&Point::new(0, 0, 0, 100, 0), AxisMask::A);
        assert_eq!(f.signed_length(0), 100);
        assert_eq!(f.last_position(0), 1100);
        // absolute afterwards measures from the advanced position
        f.record(&Point::new(0, 0, 0, 1150, 0), AxisMask::empty());
        assert_eq!(f.signed_length(0), 150);
    }

    #[test]
    fn set_position_does_not_count_motion() {
        let mut f = FilamentCounters::new();
        f.set_position(5000, 5000);
        f.record(&Point::new(0, 0, 0, 5000, 5010), AxisMask::empty());
        assert_eq!(f.signed_length(0), 0);
        assert_eq!(f.signed_length(1), 10);
    }

    #[test]
    fn commit_moves_totals_to_lifetime() {
        let mut settings = MemorySettings::new();
        let mut f = FilamentCounters::new();
        f.record(&Point::new(0, 0, 0, 300, -20), AxisMask::empty());
        f.commit(&mut settings);
        assert_eq!(settings.filament_lifetime(0), 300);
        // extruding in the negative direction still counts as usage
        assert_eq!(settings.filament_lifetime(1), 20);
        assert_eq!(f.length(0), 0);
        assert_eq!(f.last_length(0), 300);
        assert_eq!(f.last_length(1), 20);
        // nothing pending: a second commit is a no-op
        f.commit(&mut settings);
        assert_eq!(settings.filament_lifetime(0), 300);
        f.clear_last();
        assert_eq!(f.last_length(0), 0);
    }
}
