//! Action model - the vocabulary of platform-independent motion requests
//!
//! An [`ActionKind`] is built by one of the factory functions below and never
//! changes afterwards. The chain stamps it with a sequence id into an
//! [`Action`] and shares that one record, behind an `Arc`, with every cursor.

use crate::geometry::{self, precision, Joints, Point, Rotation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interpolation mode for Cartesian moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionType {
    #[default]
    Linear,
    Joint,
}

/// Frame in which relative vectors and rotations are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceFrame {
    #[default]
    World,
    Local,
}

impl fmt::Display for MotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionType::Linear => write!(f, "linear"),
            MotionType::Joint => write!(f, "joint"),
        }
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceFrame::World => write!(f, "world"),
            ReferenceFrame::Local => write!(f, "local"),
        }
    }
}

/// One request variant with only the fields it needs
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Translation {
        vector: Point,
        relative: bool,
    },
    Rotation {
        rotation: Rotation,
        relative: bool,
    },
    Transformation {
        vector: Point,
        rotation: Rotation,
        relative: bool,
        translation_first: bool,
    },
    Joints {
        joints: Joints,
        relative: bool,
    },
    Speed {
        value: i32,
        relative: bool,
    },
    Zone {
        value: i32,
        relative: bool,
    },
    Motion(MotionType),
    Coordinates(ReferenceFrame),
    /// `true` pushes the current settings, `false` pops them
    PushPop(bool),
    Message(String),
    Wait {
        millis: u64,
    },
}

impl ActionKind {
    pub fn translate(vector: Point) -> Self {
        ActionKind::Translation { vector, relative: true }
    }

    pub fn translate_to(position: Point) -> Self {
        ActionKind::Translation { vector: position, relative: false }
    }

    pub fn rotate(rotation: Rotation) -> Self {
        ActionKind::Rotation { rotation, relative: true }
    }

    pub fn rotate_to(rotation: Rotation) -> Self {
        ActionKind::Rotation { rotation, relative: false }
    }

    pub fn transform(vector: Point, rotation: Rotation, translation_first: bool) -> Self {
        ActionKind::Transformation { vector, rotation, relative: true, translation_first }
    }

    pub fn transform_to(position: Point, rotation: Rotation) -> Self {
        ActionKind::Transformation {
            vector: position,
            rotation,
            relative: false,
            translation_first: true,
        }
    }

    pub fn axes(delta: Joints) -> Self {
        ActionKind::Joints { joints: delta, relative: true }
    }

    pub fn axes_to(joints: Joints) -> Self {
        ActionKind::Joints { joints, relative: false }
    }

    pub fn speed(delta: i32) -> Self {
        ActionKind::Speed { value: delta, relative: true }
    }

    pub fn speed_to(value: i32) -> Self {
        ActionKind::Speed { value, relative: false }
    }

    pub fn zone(delta: i32) -> Self {
        ActionKind::Zone { value: delta, relative: true }
    }

    pub fn zone_to(value: i32) -> Self {
        ActionKind::Zone { value, relative: false }
    }

    pub fn motion(motion_type: MotionType) -> Self {
        ActionKind::Motion(motion_type)
    }

    pub fn coordinates(frame: ReferenceFrame) -> Self {
        ActionKind::Coordinates(frame)
    }

    pub fn push_settings() -> Self {
        ActionKind::PushPop(true)
    }

    pub fn pop_settings() -> Self {
        ActionKind::PushPop(false)
    }

    pub fn message(text: impl Into<String>) -> Self {
        ActionKind::Message(text.into())
    }

    pub fn wait(millis: u64) -> Self {
        ActionKind::Wait { millis }
    }

    /// Whether compiling this action needs a target (Cartesian or joint)
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            ActionKind::Translation { .. }
                | ActionKind::Rotation { .. }
                | ActionKind::Transformation { .. }
                | ActionKind::Joints { .. }
        )
    }

    /// Whether the action is read against existing state
    pub fn is_relative(&self) -> bool {
        match self {
            ActionKind::Translation { relative, .. }
            | ActionKind::Rotation { relative, .. }
            | ActionKind::Transformation { relative, .. }
            | ActionKind::Joints { relative, .. }
            | ActionKind::Speed { relative, .. }
            | ActionKind::Zone { relative, .. } => *relative,
            _ => false,
        }
    }
}

fn describe_move(vector: &Point) -> String {
    format!(
        "Move {} mm along {}",
        geometry::format_number(vector.norm(), precision::MILLIMETRES),
        geometry::format_point(vector)
    )
}

fn describe_rotation(rotation: &Rotation) -> String {
    let (axis, angle) = geometry::axis_angle_degrees(rotation);
    format!(
        "Rotate {} deg around {}",
        geometry::format_number(angle, precision::DEGREES),
        geometry::format_point(&axis)
    )
}

fn describe_orientation(rotation: &Rotation) -> String {
    format!(
        "[{}]",
        geometry::format_list(&geometry::quaternion_wxyz(rotation), precision::QUATERNION)
    )
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Translation { vector, relative: true } => write!(f, "{}", describe_move(vector)),
            ActionKind::Translation { vector, relative: false } => {
                write!(f, "Move to {} mm", geometry::format_point(vector))
            }
            ActionKind::Rotation { rotation, relative: true } => write!(f, "{}", describe_rotation(rotation)),
            ActionKind::Rotation { rotation, relative: false } => {
                write!(f, "Rotate to {}", describe_orientation(rotation))
            }
            ActionKind::Transformation { vector, rotation, relative: true, translation_first } => {
                if *translation_first {
                    write!(f, "{} and {}", describe_move(vector), describe_rotation(rotation).to_lowercase())
                } else {
                    write!(f, "{} and {}", describe_rotation(rotation), describe_move(vector).to_lowercase())
                }
            }
            ActionKind::Transformation { vector, rotation, relative: false, .. } => write!(
                f,
                "Transform to {} mm {}",
                geometry::format_point(vector),
                describe_orientation(rotation)
            ),
            ActionKind::Joints { joints, relative: true } => {
                write!(f, "Increase joint rotations by {} deg", joints)
            }
            ActionKind::Joints { joints, relative: false } => {
                write!(f, "Set joint rotations to {} deg", joints)
            }
            ActionKind::Speed { value, relative: true } => write!(f, "Increase speed by {} mm/s", value),
            ActionKind::Speed { value, relative: false } => write!(f, "Set speed to {} mm/s", value),
            ActionKind::Zone { value, relative: true } => {
                write!(f, "Increase approximation radius by {} mm", value)
            }
            ActionKind::Zone { value, relative: false } => {
                write!(f, "Set approximation radius to {} mm", value)
            }
            ActionKind::Motion(motion_type) => write!(f, "Set motion type to '{}'", motion_type),
            ActionKind::Coordinates(frame) => write!(f, "Set reference frame to '{}'", frame),
            ActionKind::PushPop(true) => write!(f, "Push settings to stack"),
            ActionKind::PushPop(false) => write!(f, "Pop settings from stack"),
            ActionKind::Message(text) => write!(f, "Display message \"{}\"", text),
            ActionKind::Wait { millis } => write!(f, "Wait {} ms", millis),
        }
    }
}

/// An issued action, stamped with its sequence id
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: u64,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(id: u64, kind: ActionKind) -> Self {
        Self { id, kind }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rotation_from_axis_angle;
    use nalgebra::Vector3;

    #[test]
    fn test_descriptions() {
        assert_eq!(
            ActionKind::translate(Vector3::new(100.0, 0.0, 0.0)).to_string(),
            "Move 100 mm along [100, 0, 0]"
        );
        assert_eq!(
            ActionKind::rotate(rotation_from_axis_angle(Vector3::z(), 90.0)).to_string(),
            "Rotate 90 deg around [0, 0, 1]"
        );
        assert_eq!(ActionKind::speed_to(5).to_string(), "Set speed to 5 mm/s");
        assert_eq!(ActionKind::zone(-2).to_string(), "Increase approximation radius by -2 mm");
        assert_eq!(ActionKind::wait(1500).to_string(), "Wait 1500 ms");
        assert_eq!(
            ActionKind::coordinates(ReferenceFrame::Local).to_string(),
            "Set reference frame to 'local'"
        );
        assert_eq!(Action::new(7, ActionKind::pop_settings()).to_string(), "#7 Pop settings from stack");
    }

    #[test]
    fn test_transformation_order_in_description() {
        let v = Vector3::new(0.0, 0.0, 10.0);
        let r = rotation_from_axis_angle(Vector3::x(), 45.0);
        let translate_first = ActionKind::transform(v, r, true).to_string();
        let rotate_first = ActionKind::transform(v, r, false).to_string();
        assert!(translate_first.starts_with("Move 10 mm"));
        assert!(rotate_first.starts_with("Rotate 45 deg"));
    }

    #[test]
    fn test_motion_and_relative_flags() {
        assert!(ActionKind::axes_to(Joints::default()).is_motion());
        assert!(!ActionKind::message("hi").is_motion());
        assert!(ActionKind::speed(10).is_relative());
        assert!(!ActionKind::translate_to(Vector3::zeros()).is_relative());
        assert!(!ActionKind::push_settings().is_relative());
    }
}
