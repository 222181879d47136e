//! Universal Robots URScript backend
//!
//! URScript works in metres and radians, and takes speed and blend radius as
//! arguments of each motion, so no speed or zone declarations are emitted.
//! `movel` reads `v` as tool speed in m/s but `movej` reads it as joint speed
//! in rad/s, so for joint moves the speed setting is taken as degrees per second.

use super::{replay, Compiler, Platform, Step, Target};
use crate::action::{ActionKind, MotionType};
use crate::cursor::{CursorState, RobotCursor};
use crate::error::CompileError;
use crate::geometry::{self, precision, Joints, Point, Rotation};

/// Default tool acceleration in m/s^2
const LINEAR_ACCELERATION: &str = "1.2";
/// Default joint acceleration in rad/s^2
const JOINT_ACCELERATION: &str = "1.4";

#[derive(Debug, Clone, Copy, Default)]
pub struct UrScriptCompiler;

fn metres(millimetres: f64) -> String {
    geometry::format_number(millimetres / 1000.0, precision::METRES)
}

fn radians(value: f64) -> String {
    geometry::format_number(value, precision::RADIANS)
}

fn pose(position: &Point, rotation: &Rotation) -> String {
    let r = geometry::rotation_vector(rotation);
    format!(
        "p[{},{},{},{},{},{}]",
        metres(position.x),
        metres(position.y),
        metres(position.z),
        radians(r.x),
        radians(r.y),
        radians(r.z)
    )
}

fn joint_list(joints: &Joints) -> String {
    format!(
        "[{}]",
        joints
            .to_radians()
            .iter()
            .map(|j| radians(*j))
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn target_literal(target: &Target) -> String {
    match target {
        Target::Pose(position, rotation) => pose(position, rotation),
        Target::Axes(joints) => joint_list(joints),
    }
}

fn urscript_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `v=` and `r=` arguments from the cursor's mm/s and mm
fn motion_arguments(state: &CursorState) -> String {
    format!(
        "v={}, r={}",
        metres(f64::from(state.speed)),
        metres(f64::from(state.zone))
    )
}

/// Same as [`motion_arguments`] with the speed read as deg/s
fn joint_motion_arguments(state: &CursorState) -> String {
    format!(
        "v={}, r={}",
        radians(f64::from(state.speed).to_radians()),
        metres(f64::from(state.zone))
    )
}

fn instruction(step: &Step, inline: bool) -> Result<Option<String>, CompileError> {
    let state = &step.state;
    let line = match &step.action.kind {
        ActionKind::Translation { .. }
        | ActionKind::Rotation { .. }
        | ActionKind::Transformation { .. }
        | ActionKind::Joints { .. } => {
            let target = if inline {
                target_literal(&step.target()?)
            } else {
                step.target_name()
            };
            let is_joint_move =
                matches!(step.action.kind, ActionKind::Joints { .. }) || state.motion_type == MotionType::Joint;
            if is_joint_move {
                format!("movej({}, a={}, {})", target, JOINT_ACCELERATION, joint_motion_arguments(state))
            } else {
                format!("movel({}, a={}, {})", target, LINEAR_ACCELERATION, motion_arguments(state))
            }
        }
        ActionKind::Message(text) => format!("textmsg(\"{}\")", urscript_string(text)),
        ActionKind::Wait { millis } => format!(
            "sleep({})",
            geometry::format_number(*millis as f64 / 1000.0, precision::SECONDS)
        ),
        ActionKind::Speed { .. }
        | ActionKind::Zone { .. }
        | ActionKind::Motion(_)
        | ActionKind::Coordinates(_)
        | ActionKind::PushPop(_) => return Ok(None),
    };
    Ok(Some(line))
}

impl Compiler for UrScriptCompiler {
    fn platform(&self) -> Platform {
        Platform::Ur
    }

    fn extension(&self) -> &'static str {
        "script"
    }

    fn generate_program(
        &self,
        name: &str,
        cursor: &RobotCursor,
        use_block: bool,
        inline_targets: bool,
    ) -> Result<Vec<String>, CompileError> {
        let steps = replay(cursor, use_block)?;

        let mut declarations = Vec::new();
        let mut body = Vec::new();
        for step in &steps {
            if step.action.kind.is_motion() && !inline_targets {
                declarations.push(format!(
                    "{}={}",
                    step.target_name(),
                    target_literal(&step.target()?)
                ));
            }
            if let Some(line) = instruction(step, inline_targets)? {
                body.push(line);
            }
        }

        let mut program = vec![format!("def {}():", name)];
        if !declarations.is_empty() {
            program.extend(declarations.into_iter().map(|line| format!("  {}", line)));
            program.push(String::new());
        }
        program.extend(body.into_iter().map(|line| format!("  {}", line)));
        program.push("end".to_string());
        Ok(program)
    }

    fn stream_instruction(&self, step: &Step) -> Result<Vec<String>, CompileError> {
        Ok(instruction(step, true)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::chain::Stage;
    use crate::geometry::rotation_from_axis_angle;
    use nalgebra::Vector3;

    #[test]
    fn test_program_in_metres_and_radians() {
        let chain = chain_with(vec![
            ActionKind::translate(Vector3::new(100.0, 0.0, 0.0)),
            ActionKind::rotate(rotation_from_axis_angle(Vector3::z(), 90.0)),
            ActionKind::axes_to(Joints::new(0.0, -90.0, 90.0, 0.0, 180.0, 0.0)),
            ActionKind::message("Ready"),
            ActionKind::wait(250),
        ]);
        let program = UrScriptCompiler
            .generate_program("demo", write_cursor(&chain), false, false)
            .unwrap();

        let expected = vec![
            "def demo():",
            "  target1=p[0.4,0,0.5,0,0,0]",
            "  target2=p[0.4,0,0.5,0,0,1.5708]",
            "  jtarget3=[0,-1.5708,1.5708,0,3.14159,0]",
            "",
            "  movel(target1, a=1.2, v=0.02, r=0.005)",
            "  movel(target2, a=1.2, v=0.02, r=0.005)",
            "  movej(jtarget3, a=1.4, v=0.34907, r=0.005)",
            "  textmsg(\"Ready\")",
            "  sleep(0.25)",
            "end",
        ];
        assert_eq!(program, expected);
    }

    #[test]
    fn test_inline_targets_skip_declarations() {
        let chain = chain_with(vec![
            ActionKind::motion(MotionType::Joint),
            ActionKind::speed_to(250),
            ActionKind::zone_to(0),
            ActionKind::translate(Vector3::new(0.0, 0.0, 100.0)),
        ]);
        let program = UrScriptCompiler
            .generate_program("inline", write_cursor(&chain), false, true)
            .unwrap();
        assert_eq!(
            program,
            vec![
                "def inline():".to_string(),
                "  movej(p[0.3,0,0.6,0,0,0], a=1.4, v=4.36332, r=0)".to_string(),
                "end".to_string(),
            ]
        );
    }

    #[test]
    fn test_joint_moves_take_speed_in_radians() {
        let chain = chain_with(vec![
            ActionKind::speed_to(90),
            ActionKind::translate(Vector3::new(10.0, 0.0, 0.0)),
            ActionKind::motion(MotionType::Joint),
            ActionKind::translate(Vector3::new(10.0, 0.0, 0.0)),
        ]);
        let steps = replay(write_cursor(&chain), false).unwrap();
        assert_eq!(
            UrScriptCompiler.stream_instruction(&steps[1]).unwrap(),
            vec!["movel(p[0.31,0,0.5,0,0,0], a=1.2, v=0.09, r=0.005)".to_string()]
        );
        assert_eq!(
            UrScriptCompiler.stream_instruction(&steps[3]).unwrap(),
            vec!["movej(p[0.32,0,0.5,0,0,0], a=1.4, v=1.5708, r=0.005)".to_string()]
        );
    }

    #[test]
    fn test_stream_instruction_is_inline() {
        let mut chain = chain_with(vec![ActionKind::translate(Vector3::new(0.0, 10.0, 0.0))]);
        let steps = replay(write_cursor(&chain), false).unwrap();
        let lines = UrScriptCompiler.stream_instruction(&steps[0]).unwrap();
        assert_eq!(lines, vec!["movel(p[0.3,0.01,0.5,0,0,0], a=1.2, v=0.02, r=0.005)".to_string()]);

        chain.issue(ActionKind::speed(5)).unwrap();
        let steps = replay(write_cursor(&chain), false).unwrap();
        assert!(UrScriptCompiler.stream_instruction(&steps[1]).unwrap().is_empty());
        assert_eq!(chain.cursor(Stage::Write).unwrap().buffer().pending_len(), 2);
    }
}
