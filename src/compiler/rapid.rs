//! ABB RAPID backend

use super::{replay, Compiler, Platform, Step, Target, UniqueValues};
use crate::action::{ActionKind, MotionType};
use crate::cursor::RobotCursor;
use crate::error::CompileError;
use crate::geometry::{self, precision, Joints, Point, Rotation};

/// Zone radii with built-in `zN` zonedata on every ABB controller
const PREDEFINED_ZONES: [u32; 13] = [1, 5, 10, 15, 20, 30, 40, 50, 60, 80, 100, 150, 200];

const TOOL: &str = "tool0\\WObj:=wobj0";

/// Unresolved external axes
const EXTERNAL_AXES: &str = "[9E9,9E9,9E9,9E9,9E9,9E9]";

#[derive(Debug, Clone, Copy, Default)]
pub struct RapidCompiler;

fn mm(value: f64) -> String {
    geometry::format_number(value, precision::MILLIMETRES)
}

fn speed_name(speed: u32) -> String {
    format!("vel{}", speed)
}

fn zone_name(zone: u32) -> String {
    if zone == 0 {
        "fine".to_string()
    } else if PREDEFINED_ZONES.contains(&zone) {
        format!("z{}", zone)
    } else {
        format!("zone{}", zone)
    }
}

fn needs_zone_declaration(zone: u32) -> bool {
    zone != 0 && !PREDEFINED_ZONES.contains(&zone)
}

fn speed_declaration(speed: u32) -> String {
    format!("CONST speeddata {}:=[{},{},5000,1000];", speed_name(speed), speed, speed)
}

/// Same proportions as the built-in zonedata
fn zone_declaration(zone: u32) -> String {
    let z = f64::from(zone);
    format!(
        "CONST zonedata {}:=[FALSE,{},{},{},{},{},{}];",
        zone_name(zone),
        mm(z),
        mm(1.5 * z),
        mm(1.5 * z),
        mm(0.15 * z),
        mm(1.5 * z),
        mm(0.15 * z)
    )
}

/// robtarget literal with default axis configuration
fn robtarget(position: &Point, rotation: &Rotation) -> String {
    let q = geometry::quaternion_wxyz(rotation);
    format!(
        "[[{},{},{}],[{}],[0,0,0,0],{}]",
        mm(position.x),
        mm(position.y),
        mm(position.z),
        q.iter()
            .map(|c| geometry::format_number(*c, precision::QUATERNION))
            .collect::<Vec<_>>()
            .join(","),
        EXTERNAL_AXES
    )
}

fn jointtarget(joints: &Joints) -> String {
    format!(
        "[[{}],{}]",
        joints
            .0
            .iter()
            .map(|j| geometry::format_number(*j, precision::DEGREES))
            .collect::<Vec<_>>()
            .join(","),
        EXTERNAL_AXES
    )
}

fn target_literal(target: &Target) -> String {
    match target {
        Target::Pose(position, rotation) => robtarget(position, rotation),
        Target::Axes(joints) => jointtarget(joints),
    }
}

fn target_declaration(step: &Step) -> Result<String, CompileError> {
    let target = step.target()?;
    let data_type = match target {
        Target::Pose(..) => "robtarget",
        Target::Axes(_) => "jointtarget",
    };
    Ok(format!(
        "CONST {} {}:={};",
        data_type,
        step.target_name(),
        target_literal(&target)
    ))
}

/// RAPID strings escape quotes and backslashes by doubling them
fn rapid_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\"\"")
}

fn instruction(step: &Step, inline: bool) -> Result<Option<String>, CompileError> {
    let state = &step.state;
    let line = match &step.action.kind {
        ActionKind::Translation { .. } | ActionKind::Rotation { .. } | ActionKind::Transformation { .. } => {
            let target = if inline {
                target_literal(&step.target()?)
            } else {
                step.target_name()
            };
            let command = match state.motion_type {
                MotionType::Linear => "MoveL",
                MotionType::Joint => "MoveJ",
            };
            format!(
                "{} {}, {}, {}, {};",
                command,
                target,
                speed_name(state.speed),
                zone_name(state.zone),
                TOOL
            )
        }
        ActionKind::Joints { .. } => {
            let target = if inline {
                target_literal(&step.target()?)
            } else {
                step.target_name()
            };
            format!(
                "MoveAbsJ {}, {}, {}, {};",
                target,
                speed_name(state.speed),
                zone_name(state.zone),
                TOOL
            )
        }
        ActionKind::Message(text) => format!("TPWrite \"{}\";", rapid_string(text)),
        ActionKind::Wait { millis } => format!(
            "WaitTime {};",
            geometry::format_number(*millis as f64 / 1000.0, precision::SECONDS)
        ),
        // Settings only change the simulated state
        ActionKind::Speed { .. }
        | ActionKind::Zone { .. }
        | ActionKind::Motion(_)
        | ActionKind::Coordinates(_)
        | ActionKind::PushPop(_) => return Ok(None),
    };
    Ok(Some(line))
}

impl Compiler for RapidCompiler {
    fn platform(&self) -> Platform {
        Platform::Abb
    }

    fn extension(&self) -> &'static str {
        "mod"
    }

    fn generate_program(
        &self,
        name: &str,
        cursor: &RobotCursor,
        use_block: bool,
        inline_targets: bool,
    ) -> Result<Vec<String>, CompileError> {
        let steps = replay(cursor, use_block)?;

        let mut speeds = UniqueValues::default();
        let mut zones = UniqueValues::default();
        let mut targets = Vec::new();
        let mut body = Vec::new();

        for step in &steps {
            if step.action.kind.is_motion() {
                speeds.insert(step.state.speed);
                if needs_zone_declaration(step.state.zone) {
                    zones.insert(step.state.zone);
                }
                if !inline_targets {
                    targets.push(target_declaration(step)?);
                }
            }
            if let Some(line) = instruction(step, inline_targets)? {
                body.push(line);
            }
        }

        let mut declarations: Vec<String> = speeds.iter().map(speed_declaration).collect();
        declarations.extend(zones.iter().map(zone_declaration));
        declarations.extend(targets);

        let mut program = vec![format!("MODULE {}", name), String::new()];
        if !declarations.is_empty() {
            program.extend(declarations.into_iter().map(|line| format!("  {}", line)));
            program.push(String::new());
        }
        program.push("  PROC main()".to_string());
        program.push("    ConfJ \\Off;".to_string());
        program.push("    ConfL \\Off;".to_string());
        program.push(String::new());
        program.extend(body.into_iter().map(|line| format!("    {}", line)));
        program.push("  ENDPROC".to_string());
        program.push(String::new());
        program.push("ENDMODULE".to_string());
        Ok(program)
    }

    fn stream_instruction(&self, step: &Step) -> Result<Vec<String>, CompileError> {
        Ok(instruction(step, true)?.into_iter().collect())
    }
}
