//! Readable listing of what each action does to the simulated robot

use super::{replay, Compiler, Platform, Step};
use crate::cursor::{CursorState, RobotCursor};
use crate::error::CompileError;
use crate::geometry::{self, precision};

#[derive(Debug, Clone, Copy, Default)]
pub struct HumanCompiler;

fn describe_state(state: &CursorState) -> String {
    let mut parts = Vec::new();
    if let Some(position) = &state.position {
        parts.push(format!("pos {} mm", geometry::format_point(position)));
    }
    if let Some(rotation) = &state.rotation {
        parts.push(format!(
            "rot [{}]",
            geometry::format_list(&geometry::quaternion_wxyz(rotation), precision::QUATERNION)
        ));
    }
    if let Some(joints) = &state.joints {
        parts.push(format!("joints {} deg", joints));
    }
    parts.push(format!("speed {} mm/s", state.speed));
    parts.push(format!("zone {} mm", state.zone));
    parts.push(format!("{} {}", state.motion_type, state.reference_frame));
    parts.join(", ")
}

fn line(step: &Step) -> String {
    format!("{} -> {}", step.action, describe_state(&step.state))
}

impl Compiler for HumanCompiler {
    fn platform(&self) -> Platform {
        Platform::Human
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn generate_program(
        &self,
        name: &str,
        cursor: &RobotCursor,
        use_block: bool,
        _inline_targets: bool,
    ) -> Result<Vec<String>, CompileError> {
        let steps = replay(cursor, use_block)?;
        let mut program = vec![
            format!("# Program: {}", name),
            format!("# Start: {}", describe_state(&cursor.state())),
            format!("# Actions: {}", steps.len()),
            String::new(),
        ];
        program.extend(steps.iter().map(line));
        Ok(program)
    }

    fn stream_instruction(&self, step: &Step) -> Result<Vec<String>, CompileError> {
        Ok(vec![line(step)])
    }
}
