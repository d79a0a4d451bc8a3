//! World positions and simulation time.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Simulation time in seconds, supplied by the driving loop.
///
/// Nothing in the simulation reads a wall clock; every time-dependent call
/// takes the current `SimTime` explicitly.
pub type SimTime = f64;

/// Position of an actor in 3-D world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Z coordinate (height), defaults to 0
    #[serde(default)]
    pub z: f32,
}

impl Position {
    /// World origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Creates a position on the ground plane.
    #[must_use]
    pub const fn flat(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0)
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        Vec3::from(*self).distance(Vec3::from(*other))
    }

    /// Checks whether `other` lies within `radius` (inclusive).
    #[must_use]
    pub fn within(&self, other: &Self, radius: f32) -> bool {
        self.distance_to(other) <= radius
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_3d() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(2.0, 3.0, 6.0);
        assert!((a.distance_to(&b) - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_within_is_inclusive() {
        let a = Position::flat(0.0, 0.0);
        let b = Position::flat(3.0, 4.0);
        assert!(a.within(&b, 5.0));
        assert!(!a.within(&b, 4.99));
    }

    #[test]
    fn test_vec3_round_trip() {
        let p = Position::new(1.0, -2.0, 0.5);
        let v: Vec3 = p.into();
        assert_eq!(Position::from(v), p);
    }
}
