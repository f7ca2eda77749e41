//! Minimal 3D vector math shared by the authority and observers

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (other - self).length()
    }

    /// Returns the unit vector in the same direction, or zero for degenerate input
    pub fn normalized(self) -> Vec3 {
        let length = self.length();
        if length > f32::EPSILON && length.is_finite() {
            self * (1.0 / length)
        } else {
            Vec3::ZERO
        }
    }

    /// Projects onto the ground plane
    pub fn flattened(self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    pub fn is_zero(self) -> bool {
        self.length() <= f32::EPSILON
    }

    /// Angle between two directions in degrees
    pub fn angle_deg(self, other: Vec3) -> f32 {
        let a = self.normalized();
        let b = other.normalized();
        if a.is_zero() || b.is_zero() {
            return 180.0;
        }
        a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// Turns a direction towards `target` by a blend factor in [0, 1]
    ///
    /// Normalized linear blend; close enough to a slerp for the small
    /// per-tick steps agents take. Opposite directions snap to the target.
    pub fn rotate_towards(self, target: Vec3, factor: f32) -> Vec3 {
        let from = self.normalized();
        let to = target.normalized();
        if to.is_zero() {
            return from;
        }
        if from.is_zero() {
            return to;
        }

        let t = factor.clamp(0.0, 1.0);
        let blended = from * (1.0 - t) + to * t;
        if blended.is_zero() {
            to
        } else {
            blended.normalized()
        }
    }

    /// Moves towards `target` by at most `max_step`
    pub fn move_towards(self, target: Vec3, max_step: f32) -> Vec3 {
        let delta = target - self;
        let distance = delta.length();
        if distance <= max_step || distance <= f32::EPSILON {
            target
        } else {
            self + delta * (max_step / distance)
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}
