//! Toolhead offsets.
//!
//! Dual-extruder carriages store the measured nozzle separation in one of
//! two encodings, depending on which firmware generation wrote it:
//!
//! | Encoding | Stored X | Applied |
//! |----------|----------|---------|
//! | `Deviation` (0) | error from the nominal separation | T0 = +½, T1 = −½ |
//! | `FullSeparation` (1) | the full separation | T0 = 0, T1 = all |
//!
//! A stored X whose magnitude is at or below the threshold (~4 mm) can only
//! be a deviation; anything larger can only be a full separation. When the
//! stored value was written in the other encoding it is converted in memory
//! (never written back) with `nominal − stored` for X and a sign flip for Y.
//! The conversion runs once, from the raw stored values, at every reset.

use mb_common::config::MachineConfig;
use mb_common::point::{Axis, Point};

/// On-disk encoding of the stored toolhead offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OffsetEncoding {
    /// Deviation from the nominal separation, split between both tools.
    Deviation = 0,
    /// Full separation, applied to the second tool only.
    #[default]
    FullSeparation = 1,
}

impl OffsetEncoding {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Deviation),
            1 => Some(Self::FullSeparation),
            _ => None,
        }
    }
}

/// Step-unit constants for offset decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetScale {
    /// Deviation/full-separation threshold [steps].
    pub threshold_steps: i32,
    /// Nominal separation [steps], rounded.
    pub nominal_steps: i32,
}

impl OffsetScale {
    /// Threshold uses whole X steps per mm, matching stored legacy values.
    pub fn from_config(config: &MachineConfig) -> Self {
        let spm_x = config.axis(Axis::X).steps_per_mm;
        Self {
            threshold_steps: ((spm_x as i32) as f32 * config.motion.offset_threshold_mm) as i32,
            nominal_steps: (0.5 + config.motion.ideal_separation_mm * spm_x) as i32,
        }
    }
}

/// Per-tool offset vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolOffsets {
    tools: [Point; 2],
}

impl ToolOffsets {
    pub const ZERO: ToolOffsets = ToolOffsets {
        tools: [Point::ZERO; 2],
    };

    /// Decode stored raw X/Y offsets written in either encoding into the
    /// layout `encoding` expects.
    pub fn derive(raw_x: i32, raw_y: i32, encoding: OffsetEncoding, scale: OffsetScale) -> Self {
        let looks_like_deviation = raw_x.unsigned_abs() <= scale.threshold_steps.unsigned_abs();
        let needs_conversion = match encoding {
            OffsetEncoding::Deviation => !looks_like_deviation,
            OffsetEncoding::FullSeparation => looks_like_deviation,
        };
        let (x, y) = if needs_conversion {
            (scale.nominal_steps.wrapping_sub(raw_x), raw_y.wrapping_neg())
        } else {
            (raw_x, raw_y)
        };

        let mut offsets = Self::ZERO;
        match encoding {
            OffsetEncoding::Deviation => {
                offsets.tools[0][Axis::X] = x / 2;
                offsets.tools[1][Axis::X] = -(x / 2);
                offsets.tools[0][Axis::Y] = y / 2;
                offsets.tools[1][Axis::Y] = -(y / 2);
            }
            OffsetEncoding::FullSeparation => {
                offsets.tools[1][Axis::X] = x;
                offsets.tools[1][Axis::Y] = y;
            }
        }
        offsets
    }

    #[inline]
    pub fn for_tool(&self, tool: u8) -> Point {
        self.tools[(tool & 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> OffsetScale {
        // 88 whole steps/mm → 4 mm threshold of 352 steps; 33 mm nominal.
        OffsetScale {
            threshold_steps: 352,
            nominal_steps: 2923,
        }
    }

    #[test]
    fn scale_from_default_config() {
        let s = OffsetScale::from_config(&MachineConfig::default());
        assert_eq!(s.threshold_steps, 352);
        assert_eq!(s.nominal_steps, (0.5 + 33.0 * 88.573_186f32) as i32);
    }

    // ── Full-separation encoding ──

    #[test]
    fn full_separation_native_value_goes_to_second_tool() {
        let o = ToolOffsets::derive(2950, -12, OffsetEncoding::FullSeparation, scale());
        assert_eq!(o.for_tool(0), Point::ZERO);
        assert_eq!(o.for_tool(1), Point::new(2950, -12, 0, 0, 0));
    }

    #[test]
    fn full_separation_converts_stored_deviation_exactly_once() {
        // 20 steps deviation written by the older generation
        let o = ToolOffsets::derive(20, 8, OffsetEncoding::FullSeparation, scale());
        assert_eq!(o.for_tool(1)[Axis::X], 2923 - 20);
        assert_eq!(o.for_tool(1)[Axis::Y], -8);
        // Applying the conversion a second time would land back near the raw
        // deviation with the wrong sign; make sure that is not what happened.
        assert_ne!(o.for_tool(1)[Axis::X], 2923 - (2923 - 20));
        assert_eq!(o.for_tool(0), Point::ZERO);
    }

    #[test]
    fn derivation_is_idempotent_from_raw_values() {
        let first = ToolOffsets::derive(20, 8, OffsetEncoding::FullSeparation, scale());
        let second = ToolOffsets::derive(20, 8, OffsetEncoding::FullSeparation, scale());
        assert_eq!(first, second);
    }

    #[test]
    fn threshold_boundary_counts_as_deviation() {
        let o = ToolOffsets::derive(352, 0, OffsetEncoding::FullSeparation, scale());
        assert_eq!(o.for_tool(1)[Axis::X], 2923 - 352);
        let o = ToolOffsets::derive(-352, 0, OffsetEncoding::FullSeparation, scale());
        assert_eq!(o.for_tool(1)[Axis::X], 2923 + 352);
        let o = ToolOffsets::derive(353, 0, OffsetEncoding::FullSeparation, scale());
        assert_eq!(o.for_tool(1)[Axis::X], 353);
    }

    // ── Deviation encoding ──

    #[test]
    fn deviation_native_value_splits_between_tools() {
        let o = ToolOffsets::derive(30, -10, OffsetEncoding::Deviation, scale());
        assert_eq!(o.for_tool(0), Point::new(15, -5, 0, 0, 0));
        assert_eq!(o.for_tool(1), Point::new(-15, 5, 0, 0, 0));
    }

    #[test]
    fn deviation_converts_stored_full_separation() {
        let o = ToolOffsets::derive(2943, 6, OffsetEncoding::Deviation, scale());
        // 2923 - 2943 = -20 → ±10
        assert_eq!(o.for_tool(0)[Axis::X], -10);
        assert_eq!(o.for_tool(1)[Axis::X], 10);
        assert_eq!(o.for_tool(0)[Axis::Y], -3);
        assert_eq!(o.for_tool(1)[Axis::Y], 3);
    }

    #[test]
    fn encoding_from_u8() {
        assert_eq!(OffsetEncoding::from_u8(0), Some(OffsetEncoding::Deviation));
        assert_eq!(OffsetEncoding::from_u8(1), Some(OffsetEncoding::FullSeparation));
        assert_eq!(OffsetEncoding::from_u8(2), None);
    }
}
