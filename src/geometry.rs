//! Geometry primitives shared by cursors and compilers
//!
//! Cursors always hold millimetres and degrees; conversion to metres or
//! radians happens at emission time through the helpers in this module.

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// TCP position in millimetres
pub type Point = Vector3<f64>;

/// TCP orientation
pub type Rotation = UnitQuaternion<f64>;

/// Decimal places used when rendering each unit
pub mod precision {
    pub const MILLIMETRES: u32 = 3;
    pub const METRES: u32 = 5;
    pub const DEGREES: u32 = 3;
    pub const RADIANS: u32 = 5;
    pub const QUATERNION: u32 = 4;
    pub const SECONDS: u32 = 3;
}

/// Six axis angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joints(pub [f64; 6]);

impl Joints {
    pub fn new(j1: f64, j2: f64, j3: f64, j4: f64, j5: f64, j6: f64) -> Self {
        Self([j1, j2, j3, j4, j5, j6])
    }

    pub fn to_radians(&self) -> [f64; 6] {
        self.0.map(f64::to_radians)
    }
}

impl Add for Joints {
    type Output = Joints;

    fn add(self, rhs: Joints) -> Joints {
        let mut out = self.0;
        for (value, delta) in out.iter_mut().zip(rhs.0) {
            *value += delta;
        }
        Joints(out)
    }
}

impl fmt::Display for Joints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", format_list(&self.0, precision::DEGREES))
    }
}

/// Build a rotation of `degrees` around `axis`. A zero-length axis yields identity.
pub fn rotation_from_axis_angle(axis: Point, degrees: f64) -> Rotation {
    match Unit::try_new(axis, f64::EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, degrees.to_radians()),
        None => UnitQuaternion::identity(),
    }
}

/// Build a rotation from `[w, x, y, z]` components, normalizing them.
/// Components must already be validated with [`checked_rotation_from_wxyz`].
pub fn rotation_from_wxyz(q: [f64; 4]) -> Rotation {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Like [`rotation_from_wxyz`], but `None` for zero-length or non-finite components
pub fn checked_rotation_from_wxyz(q: [f64; 4]) -> Option<Rotation> {
    if q.iter().any(|c| !c.is_finite()) {
        return None;
    }
    UnitQuaternion::try_new(Quaternion::new(q[0], q[1], q[2], q[3]), f64::EPSILON)
}

/// Quaternion components as `[w, x, y, z]`
pub fn quaternion_wxyz(rotation: &Rotation) -> [f64; 4] {
    let q = rotation.quaternion();
    [q.w, q.i, q.j, q.k]
}

/// Axis and angle in degrees. Identity reports a zero angle around +Z.
pub fn axis_angle_degrees(rotation: &Rotation) -> (Point, f64) {
    match rotation.axis_angle() {
        Some((axis, angle)) => (axis.into_inner(), angle.to_degrees()),
        None => (Vector3::z(), 0.0),
    }
}

/// Rotation vector (axis scaled by angle) in radians, as URScript poses expect
pub fn rotation_vector(rotation: &Rotation) -> Point {
    rotation.scaled_axis()
}

/// Intrinsic ZYX Euler angles `(A, B, C)` in degrees, KUKA convention
pub fn euler_zyx_degrees(rotation: &Rotation) -> (f64, f64, f64) {
    let (roll, pitch, yaw) = rotation.euler_angles();
    (yaw.to_degrees(), pitch.to_degrees(), roll.to_degrees())
}

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let multiplier = 10.0_f64.powi(decimals as i32);
    let rounded = (value * multiplier).round() / multiplier;
    // Normalizes -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Shortest decimal rendering of `value` after rounding
pub fn format_number(value: f64, decimals: u32) -> String {
    format!("{}", round_to(value, decimals))
}

/// Comma separated list of rounded numbers
pub fn format_list(values: &[f64], decimals: u32) -> String {
    values
        .iter()
        .map(|v| format_number(*v, decimals))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `[x, y, z]` in millimetres
pub fn format_point(point: &Point) -> String {
    format!("[{}]", format_list(point.as_slice(), precision::MILLIMETRES))
}
