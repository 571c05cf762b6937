//! Five-axis step vectors.
//!
//! Every position the core handles is a [`Point`]: signed 32-bit step counts
//! for X, Y, Z and the two extruders A and B, in that declaration order.
//! The order matters: it breaks ties when choosing a move's master axis.

use core::ops::{Add, Index, IndexMut, Sub};

use serde::{Deserialize, Serialize};

use crate::consts::{CARTESIAN_COUNT, STEPPER_COUNT};

/// Stepper axis, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
    /// First extruder.
    A = 3,
    /// Second extruder.
    B = 4,
}

impl Axis {
    /// All axes in declaration order.
    pub const ALL: [Axis; STEPPER_COUNT] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::A),
            4 => Some(Self::B),
            _ => None,
        }
    }

    /// Axis driving extruder `index` (0 → A, anything else → B).
    #[inline]
    pub const fn extruder(index: usize) -> Self {
        if index == 0 { Self::A } else { Self::B }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_cartesian(self) -> bool {
        (self as usize) < CARTESIAN_COUNT
    }

    /// Display label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// A position or delta in steps, one component per [`Axis`].
///
/// Arithmetic wraps: targets come straight off the wire and a malformed
/// host must not be able to panic the command loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point([i32; STEPPER_COUNT]);

impl Point {
    pub const ZERO: Point = Point([0; STEPPER_COUNT]);

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32, a: i32, b: i32) -> Self {
        Self([x, y, z, a, b])
    }

    #[inline]
    pub const fn from_array(coords: [i32; STEPPER_COUNT]) -> Self {
        Self(coords)
    }

    #[inline]
    pub const fn get(&self, axis: Axis) -> i32 {
        self.0[axis as usize]
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, value: i32) {
        self.0[axis as usize] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &i32> {
        self.0.iter()
    }

    /// Copy of `self` with the cartesian components replaced by `other`'s.
    pub fn with_cartesian_of(mut self, other: &Point) -> Self {
        self.0[..CARTESIAN_COUNT].copy_from_slice(&other.0[..CARTESIAN_COUNT]);
        self
    }
}

impl Index<usize> for Point {
    type Output = i32;

    #[inline]
    fn index(&self, index: usize) -> &i32 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Point {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut i32 {
        &mut self.0[index]
    }
}

impl Index<Axis> for Point {
    type Output = i32;

    #[inline]
    fn index(&self, axis: Axis) -> &i32 {
        &self.0[axis as usize]
    }
}

impl IndexMut<Axis> for Point {
    #[inline]
    fn index_mut(&mut self, axis: Axis) -> &mut i32 {
        &mut self.0[axis as usize]
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        let mut out = self;
        for (o, r) in out.0.iter_mut().zip(rhs.0) {
            *o = o.wrapping_add(r);
        }
        out
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        let mut out = self;
        for (o, r) in out.0.iter_mut().zip(rhs.0) {
            *o = o.wrapping_sub(r);
        }
        out
    }
}

impl From<[i32; STEPPER_COUNT]> for Point {
    fn from(coords: [i32; STEPPER_COUNT]) -> Self {
        Self(coords)
    }
}
