//! Spatial primitives shared by the topology builder, planner and agents.
//!
//! The world is Y-up: waypoint layouts are classified on the X/Z ground
//! plane, and headings are yaw angles around the Y axis.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Distances below this are treated as coincident points.
pub const EPSILON: f32 = 1e-4;

/// 3D position vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Linear interpolation; `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        *self + (*other - *self) * t
    }

    /// Coordinate along a ground-plane axis.
    pub fn along(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Z => self.z,
        }
    }

    /// Yaw (radians around +Y) of the direction from `self` to `target`,
    /// or `None` when the two points coincide on the ground plane.
    pub fn heading_to(&self, target: &Self) -> Option<f32> {
        let dx = target.x - self.x;
        let dz = target.z - self.z;
        if dx.abs() < EPSILON && dz.abs() < EPSILON {
            None
        } else {
            Some(dx.atan2(dz))
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

/// Horizontal axis used when sorting or clustering waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Z,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Axis::X => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

/// Ground-plane bounding extents of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Extents {
    /// Returns `None` for an empty point set.
    pub fn of<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ext = Self {
            min_x: first.x,
            max_x: first.x,
            min_z: first.z,
            max_z: first.z,
        };
        for p in iter {
            ext.min_x = ext.min_x.min(p.x);
            ext.max_x = ext.max_x.max(p.x);
            ext.min_z = ext.min_z.min(p.z);
            ext.max_z = ext.max_z.max(p.z);
        }
        Some(ext)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> f32 {
        self.max_z - self.min_z
    }

    pub fn along(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.width(),
            Axis::Z => self.depth(),
        }
    }

    /// (major, minor) extent lengths.
    pub fn major_minor(&self) -> (f32, f32) {
        let (w, d) = (self.width(), self.depth());
        if w >= d {
            (w, d)
        } else {
            (d, w)
        }
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Interpolate between two yaw angles along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = wrap_angle(to - from);
    wrap_angle(from + delta * t.clamp(0.0, 1.0))
}
