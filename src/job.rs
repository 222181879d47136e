//! YAML job files - a named list of motion steps
//!
//! ```yaml
//! name: Square
//! steps:
//!   - speed_to: 100
//!   - move: [100, 0, 0]
//!   - rotate: { axis: [0, 0, 1], angle: 90 }
//!   - block
//!   - message: "Done"
//! ```

use crate::action::{ActionKind, MotionType, ReferenceFrame};
use crate::geometry::{self, Joints, Point};
use crate::{Result, RobokitError};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxisAngle {
    pub axis: [f64; 3],
    /// Degrees
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelativeTransform {
    pub vector: [f64; 3],
    pub axis: [f64; 3],
    pub angle: f64,
    #[serde(default = "default_translation_first")]
    pub translation_first: bool,
}

fn default_translation_first() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AbsoluteTransform {
    pub position: [f64; 3],
    /// `[w, x, y, z]`
    pub rotation: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    Move([f64; 3]),
    MoveTo([f64; 3]),
    Rotate(AxisAngle),
    /// `[w, x, y, z]`
    RotateTo([f64; 4]),
    Transform(RelativeTransform),
    TransformTo(AbsoluteTransform),
    Axes([f64; 6]),
    AxesTo([f64; 6]),
    Speed(i32),
    SpeedTo(i32),
    Zone(i32),
    ZoneTo(i32),
    Motion(MotionType),
    Coordinates(ReferenceFrame),
    Push,
    Pop,
    Message(String),
    /// Milliseconds
    Wait(u64),
    /// Flag everything before this step as the block
    Block,
}

/// What a job step asks the chain to do
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Issue(ActionKind),
    MarkBlock,
}

fn point(values: &[f64; 3]) -> Point {
    Point::new(values[0], values[1], values[2])
}

impl JobStep {
    pub fn instruction(&self) -> Instruction {
        let kind = match self {
            JobStep::Move(v) => ActionKind::translate(point(v)),
            JobStep::MoveTo(p) => ActionKind::translate_to(point(p)),
            JobStep::Rotate(r) => ActionKind::rotate(geometry::rotation_from_axis_angle(point(&r.axis), r.angle)),
            JobStep::RotateTo(q) => ActionKind::rotate_to(geometry::rotation_from_wxyz(*q)),
            JobStep::Transform(t) => ActionKind::transform(
                point(&t.vector),
                geometry::rotation_from_axis_angle(point(&t.axis), t.angle),
                t.translation_first,
            ),
            JobStep::TransformTo(t) => {
                ActionKind::transform_to(point(&t.position), geometry::rotation_from_wxyz(t.rotation))
            }
            JobStep::Axes(j) => ActionKind::axes(Joints(*j)),
            JobStep::AxesTo(j) => ActionKind::axes_to(Joints(*j)),
            JobStep::Speed(v) => ActionKind::speed(*v),
            JobStep::SpeedTo(v) => ActionKind::speed_to(*v),
            JobStep::Zone(v) => ActionKind::zone(*v),
            JobStep::ZoneTo(v) => ActionKind::zone_to(*v),
            JobStep::Motion(m) => ActionKind::motion(*m),
            JobStep::Coordinates(f) => ActionKind::coordinates(*f),
            JobStep::Push => ActionKind::push_settings(),
            JobStep::Pop => ActionKind::pop_settings(),
            JobStep::Message(text) => ActionKind::message(text.clone()),
            JobStep::Wait(millis) => ActionKind::wait(*millis),
            JobStep::Block => return Instruction::MarkBlock,
        };
        Instruction::Issue(kind)
    }

    /// Absolute rotations must be normalizable quaternions
    fn validate(&self, index: usize) -> Result<()> {
        let rotation = match self {
            JobStep::RotateTo(q) => q,
            JobStep::TransformTo(t) => &t.rotation,
            _ => return Ok(()),
        };
        if geometry::checked_rotation_from_wxyz(*rotation).is_none() {
            return Err(RobokitError::Config(format!(
                "steps[{}]: rotation {:?} is not a valid quaternion",
                index, rotation
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobFile {
    pub name: String,
    /// Steps are single-key maps (`- move: [..]`) or bare names (`- push`)
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<JobStep>,
}

impl JobFile {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        let job: JobFile = serde_yaml::from_str(content)?;
        if job.name.trim().is_empty() {
            return Err(RobokitError::Config("job name must not be empty".to_string()));
        }
        for (index, step) in job.steps.iter().enumerate() {
            step.validate(index)?;
        }
        Ok(job)
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.steps.iter().map(JobStep::instruction).collect()
    }

    /// Whether the job marks a block anywhere
    pub fn uses_block(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, JobStep::Block))
    }
}
