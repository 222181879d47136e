//! KUKA KRL backend
//!
//! KRL sets speed and approximation distance through system variables, so
//! they are emitted as separate instructions whenever the value in effect
//! changes. There is no portable message instruction; messages become a
//! placeholder comment.

use super::{replay, Compiler, Platform, Step, Target};
use crate::action::{ActionKind, MotionType};
use crate::cursor::RobotCursor;
use crate::error::CompileError;
use crate::geometry::{self, precision, Joints, Point, Rotation};

#[derive(Debug, Clone, Copy, Default)]
pub struct KrlCompiler;

fn mm(value: f64) -> String {
    geometry::format_number(value, precision::MILLIMETRES)
}

fn deg(value: f64) -> String {
    geometry::format_number(value, precision::DEGREES)
}

fn frame(position: &Point, rotation: &Rotation) -> String {
    let (a, b, c) = geometry::euler_zyx_degrees(rotation);
    format!(
        "{{X {}, Y {}, Z {}, A {}, B {}, C {}}}",
        mm(position.x),
        mm(position.y),
        mm(position.z),
        deg(a),
        deg(b),
        deg(c)
    )
}

fn axis(joints: &Joints) -> String {
    let values = joints
        .0
        .iter()
        .enumerate()
        .map(|(i, j)| format!("A{} {}", i + 1, deg(*j)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", values)
}

fn target_literal(target: &Target) -> String {
    match target {
        Target::Pose(position, rotation) => frame(position, rotation),
        Target::Axes(joints) => axis(joints),
    }
}

/// Tracks the speed and zone last written so settings are only re-emitted on change
#[derive(Debug, Default)]
struct Body {
    inline: bool,
    speed: Option<u32>,
    zone: Option<u32>,
    lines: Vec<String>,
}

impl Body {
    fn new(inline: bool) -> Self {
        Self {
            inline,
            ..Self::default()
        }
    }

    fn push_settings(&mut self, step: &Step) {
        let state = &step.state;
        if self.speed != Some(state.speed) {
            self.lines.push(format!(
                "$VEL.CP = {}",
                geometry::format_number(f64::from(state.speed) / 1000.0, precision::METRES)
            ));
            self.speed = Some(state.speed);
        }
        if self.zone != Some(state.zone) {
            self.lines.push(format!("$APO.CDIS = {}", mm(f64::from(state.zone))));
            self.zone = Some(state.zone);
        }
    }

    fn push(&mut self, step: &Step) -> Result<(), CompileError> {
        let state = &step.state;
        match &step.action.kind {
            ActionKind::Translation { .. }
            | ActionKind::Rotation { .. }
            | ActionKind::Transformation { .. }
            | ActionKind::Joints { .. } => {
                self.push_settings(step);
                let target = if self.inline {
                    target_literal(&step.target()?)
                } else {
                    step.target_name()
                };
                let command = match (&step.action.kind, state.motion_type) {
                    (ActionKind::Joints { .. }, _) | (_, MotionType::Joint) => "PTP",
                    _ => "LIN",
                };
                let approximation = if state.zone > 0 { " C_DIS" } else { "" };
                self.lines.push(format!("{} {}{}", command, target, approximation));
            }
            ActionKind::Message(text) => {
                self.lines
                    .push(format!("; MESSAGE NOT SUPPORTED IN KRL: \"{}\"", text.replace('\n', " ")));
            }
            ActionKind::Wait { millis } => self.lines.push(format!(
                "WAIT SEC {}",
                geometry::format_number(*millis as f64 / 1000.0, precision::SECONDS)
            )),
            ActionKind::Speed { .. }
            | ActionKind::Zone { .. }
            | ActionKind::Motion(_)
            | ActionKind::Coordinates(_)
            | ActionKind::PushPop(_) => {}
        }
        Ok(())
    }
}

impl Compiler for KrlCompiler {
    fn platform(&self) -> Platform {
        Platform::Kuka
    }

    fn extension(&self) -> &'static str {
        "src"
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
        let mut assignments = Vec::new();
        let mut body = Body::new(inline_targets);
        for step in &steps {
            if step.action.kind.is_motion() && !inline_targets {
                let target = step.target()?;
                let data_type = match target {
                    Target::Pose(..) => "FRAME",
                    Target::Axes(_) => "AXIS",
                };
                declarations.push(format!("DECL {} {}", data_type, step.target_name()));
                assignments.push(format!("{} = {}", step.target_name(), target_literal(&target)));
            }
            body.push(step)?;
        }

        let mut program = vec![
            "&ACCESS RVP".to_string(),
            "&REL 1".to_string(),
            format!("DEF {}()", name),
        ];
        if !declarations.is_empty() {
            program.push("  ; DECLARATIONS".to_string());
            program.extend(declarations.into_iter().map(|line| format!("  {}", line)));
            program.push(String::new());
        }
        program.push("  ; INITIALIZATION".to_string());
        program.push("  BAS(#INITMOV, 0)".to_string());
        program.extend(assignments.into_iter().map(|line| format!("  {}", line)));
        program.push(String::new());
        program.push("  ; INSTRUCTIONS".to_string());
        program.extend(body.lines.into_iter().map(|line| format!("  {}", line)));
        program.push("END".to_string());
        Ok(program)
    }

    fn stream_instruction(&self, step: &Step) -> Result<Vec<String>, CompileError> {
        let mut body = Body::new(true);
        body.push(step)?;
        Ok(body.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::geometry::rotation_from_axis_angle;
    use nalgebra::Vector3;

    #[test]
    fn test_program_layout() {
        let chain = chain_with(vec![
            ActionKind::translate(Vector3::new(0.0, 0.0, -100.0)),
            ActionKind::rotate(rotation_from_axis_angle(Vector3::z(), 45.0)),
            ActionKind::zone_to(0),
            ActionKind::speed_to(100),
            ActionKind::axes_to(Joints::new(0.0, -90.0, 90.0, 0.0, 0.0, 0.0)),
            ActionKind::wait(500),
        ]);
        let program = KrlCompiler
            .generate_program("demo", write_cursor(&chain), false, false)
            .unwrap();

        let expected = vec![
            "&ACCESS RVP",
            "&REL 1",
            "DEF demo()",
            "  ; DECLARATIONS",
            "  DECL FRAME target1",
            "  DECL FRAME target2",
            "  DECL AXIS jtarget5",
            "",
            "  ; INITIALIZATION",
            "  BAS(#INITMOV, 0)",
            "  target1 = {X 300, Y 0, Z 400, A 0, B 0, C 0}",
            "  target2 = {X 300, Y 0, Z 400, A 45, B 0, C 0}",
            "  jtarget5 = {A1 0, A2 -90, A3 90, A4 0, A5 0, A6 0}",
            "",
            "  ; INSTRUCTIONS",
            "  $VEL.CP = 0.02",
            "  $APO.CDIS = 5",
            "  LIN target1 C_DIS",
            "  LIN target2 C_DIS",
            "  $VEL.CP = 0.1",
            "  $APO.CDIS = 0",
            "  PTP jtarget5",
            "  WAIT SEC 0.5",
            "END",
        ];
        assert_eq!(program, expected);
    }

    #[test]
    fn test_messages_become_placeholder_comments() {
        let chain = chain_with(vec![ActionKind::message("Hello")]);
        let program = KrlCompiler
            .generate_program("msg", write_cursor(&chain), false, true)
            .unwrap();
        assert!(program.contains(&"  ; MESSAGE NOT SUPPORTED IN KRL: \"Hello\"".to_string()));
        assert!(!program.iter().any(|line| line.contains("DECL")));
    }

    #[test]
    fn test_stream_instruction_carries_settings() {
        let chain = chain_with(vec![
            ActionKind::motion(MotionType::Joint),
            ActionKind::translate(Vector3::new(10.0, 0.0, 0.0)),
        ]);
        let steps = replay(write_cursor(&chain), false).unwrap();
        assert!(KrlCompiler.stream_instruction(&steps[0]).unwrap().is_empty());
        assert_eq!(
            KrlCompiler.stream_instruction(&steps[1]).unwrap(),
            vec![
                "$VEL.CP = 0.02".to_string(),
                "$APO.CDIS = 5".to_string(),
                "PTP {X 310, Y 0, Z 500, A 0, B 0, C 0} C_DIS".to_string(),
            ]
        );
    }
}
