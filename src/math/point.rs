use super::vec::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

#[derive(Deserialize, Serialize, PartialEq, Clone, Copy, Debug, Default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.,
            y: 0.,
            z: 0.,
        }
    }

    pub fn to(&self, rhs: Point3) -> Vec3 {
        rhs - *self
    }

    pub fn distance_to(&self, rhs: Point3) -> f32 {
        (rhs - *self).norm()
    }

    /// Point at fraction `f` of the way from `self` to `rhs`.
    pub fn lerp(&self, rhs: Point3, f: f32) -> Point3 {
        *self + (rhs - *self) * f
    }
}

impl Sub for Point3 {
    type Output = Vec3;

    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add<Vec3> for Point3 {
    type Output = Point3;

    fn add(self, rhs: Vec3) -> Self::Output {
        Point3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Sub<Vec3> for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Vec3) -> Self::Output {
        Point3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}
