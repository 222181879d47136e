//! RobotCursor - simulated robot state that advances one action at a time
//!
//! A cursor validates each action against its current state, and either
//! commits the complete transition or leaves the state untouched. Cursors
//! that apply immediately (the virtual and motion stages) validate before
//! buffering. Buffered cursors (the write stage) keep actions pending until
//! `apply_next` is driven by a compiler replay or by the chain.

use crate::action::{Action, ActionKind, MotionType, ReferenceFrame};
use crate::buffer::ActionBuffer;
use crate::config::{CollisionPolicy, SafetyConfig};
use crate::error::CursorError;
use crate::geometry::{Joints, Point, Rotation};
use crate::settings::{Settings, SettingsStack};
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot of everything a cursor simulates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub position: Option<Point>,
    pub rotation: Option<Rotation>,
    pub joints: Option<Joints>,
    pub speed: u32,
    pub zone: u32,
    pub motion_type: MotionType,
    pub reference_frame: ReferenceFrame,
}

/// State handed to [`RobotCursor::initialize`]
pub type InitialState = CursorState;

impl Default for CursorState {
    fn default() -> Self {
        Self {
            position: None,
            rotation: None,
            joints: None,
            speed: 20,
            zone: 5,
            motion_type: MotionType::Linear,
            reference_frame: ReferenceFrame::World,
        }
    }
}

impl CursorState {
    /// Default settings at a known Cartesian pose
    pub fn at_pose(position: Point, rotation: Rotation) -> Self {
        Self {
            position: Some(position),
            rotation: Some(rotation),
            ..Self::default()
        }
    }

    /// Default settings at known axis values
    pub fn at_joints(joints: Joints) -> Self {
        Self {
            joints: Some(joints),
            ..Self::default()
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            speed: self.speed,
            zone: self.zone,
            motion_type: self.motion_type,
            reference_frame: self.reference_frame,
        }
    }

    fn restore(&mut self, settings: &Settings) {
        self.speed = settings.speed;
        self.zone = settings.zone;
        self.motion_type = settings.motion_type;
        self.reference_frame = settings.reference_frame;
    }
}

/// Recorded when a target crosses the table under the warn-only policy
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyWarning {
    pub action_id: u64,
    pub z: f64,
    pub table_height: f64,
}

impl std::fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Action #{} moves the TCP to Z {:.3} mm, below the table at {:.3} mm",
            self.action_id, self.z, self.table_height
        )
    }
}

/// What `issue` did with an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Stored as pending, not applied yet
    Buffered,
    /// Applied and recorded as released
    Applied,
}

enum StackOp {
    None,
    Push(Settings),
    Pop,
}

struct Transition {
    state: CursorState,
    stack: StackOp,
    warning: Option<SafetyWarning>,
}

#[derive(Debug, Clone)]
pub struct RobotCursor {
    name: String,
    state: CursorState,
    initialized: bool,
    apply_immediately: bool,
    buffer: ActionBuffer,
    settings_stack: SettingsStack,
    safety: SafetyConfig,
    warnings: Vec<SafetyWarning>,
}

impl RobotCursor {
    pub fn new(name: impl Into<String>, apply_immediately: bool, safety: SafetyConfig) -> Self {
        Self {
            name: name.into(),
            state: CursorState::default(),
            initialized: false,
            apply_immediately,
            buffer: ActionBuffer::new(),
            settings_stack: SettingsStack::new(),
            safety,
            warnings: Vec::new(),
        }
    }

    /// Set the starting state. Allowed exactly once.
    pub fn initialize(&mut self, initial: InitialState) -> Result<(), CursorError> {
        if self.initialized {
            return Err(CursorError::AlreadyInitialized);
        }
        self.state = initial;
        // Cartesian pose and axis values never coexist
        if self.state.position.is_some() || self.state.rotation.is_some() {
            self.state.joints = None;
        }
        self.initialized = true;
        debug!("Cursor '{}' initialized", self.name);
        Ok(())
    }

    /// Buffer an action, applying it right away on immediate cursors.
    /// A rejected action is neither buffered nor applied.
    pub fn issue(&mut self, action: Arc<Action>) -> Result<IssueOutcome, CursorError> {
        if !self.apply_immediately {
            self.buffer.add(action);
            return Ok(IssueOutcome::Buffered);
        }

        self.apply(&action)?;
        self.buffer.add(action);
        self.buffer.take_next();
        Ok(IssueOutcome::Applied)
    }

    /// Apply the oldest pending action. On failure the action stays pending.
    pub fn apply_next(&mut self) -> Result<Arc<Action>, CursorError> {
        let action = self
            .buffer
            .peek_next()
            .cloned()
            .ok_or(CursorError::NothingPending)?;
        self.apply(&action)?;
        self.buffer.take_next();
        Ok(action)
    }

    fn apply(&mut self, action: &Action) -> Result<(), CursorError> {
        let transition = self.transition(action)?;

        self.state = transition.state;
        match transition.stack {
            StackOp::None => {}
            StackOp::Push(settings) => self.settings_stack.push(settings),
            StackOp::Pop => {
                self.settings_stack.pop();
            }
        }
        if let Some(warning) = transition.warning {
            warn!("Cursor '{}': {}", self.name, warning);
            self.warnings.push(warning);
        }

        debug!("Cursor '{}' applied {}", self.name, action);
        Ok(())
    }

    /// Compute the state after `action` without touching `self`
    fn transition(&self, action: &Action) -> Result<Transition, CursorError> {
        if action.kind.is_relative() && !self.initialized {
            return Err(CursorError::NotInitialized);
        }

        let mut next = self.state;
        let mut stack = StackOp::None;
        let mut warning = None;

        match &action.kind {
            ActionKind::Translation { vector, relative } => {
                let position = if *relative {
                    let current = next.position.ok_or(CursorError::MissingPosition)?;
                    match next.reference_frame {
                        ReferenceFrame::World => current + vector,
                        ReferenceFrame::Local => {
                            let rotation = next.rotation.ok_or(CursorError::MissingRotation)?;
                            current + rotation.transform_vector(vector)
                        }
                    }
                } else {
                    // No kinematics to infer an orientation from
                    if next.rotation.is_none() {
                        return Err(CursorError::MissingRotation);
                    }
                    *vector
                };
                warning = self.check_table(action.id, &position)?;
                next.position = Some(position);
                next.joints = None;
            }

            ActionKind::Rotation { rotation, relative } => {
                let current_position = next.position.ok_or(CursorError::MissingPosition)?;
                let new_rotation = if *relative {
                    let current = next.rotation.ok_or(CursorError::MissingRotation)?;
                    match next.reference_frame {
                        ReferenceFrame::World => rotation * current,
                        ReferenceFrame::Local => current * rotation,
                    }
                } else {
                    *rotation
                };
                next.position = Some(current_position);
                next.rotation = Some(new_rotation);
                next.joints = None;
            }

            ActionKind::Transformation { vector, rotation, relative, translation_first } => {
                let (position, new_rotation) = if *relative {
                    let position = next.position.ok_or(CursorError::MissingPosition)?;
                    let current = next.rotation.ok_or(CursorError::MissingRotation)?;
                    match next.reference_frame {
                        ReferenceFrame::World => (position + vector, rotation * current),
                        ReferenceFrame::Local => {
                            let new_rotation = current * rotation;
                            // Translating second uses the already rotated frame
                            let frame = if *translation_first { current } else { new_rotation };
                            (position + frame.transform_vector(vector), new_rotation)
                        }
                    }
                } else {
                    (*vector, *rotation)
                };
                warning = self.check_table(action.id, &position)?;
                next.position = Some(position);
                next.rotation = Some(new_rotation);
                next.joints = None;
            }

            ActionKind::Joints { joints, relative } => {
                let new_joints = if *relative {
                    next.joints.ok_or(CursorError::MissingJoints)? + *joints
                } else {
                    *joints
                };
                next.joints = Some(new_joints);
                next.position = None;
                next.rotation = None;
            }

            ActionKind::Speed { value, relative } => {
                next.speed = step_value(next.speed, *value, *relative);
            }

            ActionKind::Zone { value, relative } => {
                next.zone = step_value(next.zone, *value, *relative);
            }

            ActionKind::Motion(motion_type) => next.motion_type = *motion_type,

            ActionKind::Coordinates(frame) => next.reference_frame = *frame,

            ActionKind::PushPop(true) => stack = StackOp::Push(next.settings()),

            ActionKind::PushPop(false) => {
                let settings = self.settings_stack.peek().ok_or(CursorError::SettingsStackEmpty)?;
                next.restore(settings);
                stack = StackOp::Pop;
            }

            ActionKind::Message(_) | ActionKind::Wait { .. } => {}
        }

        Ok(Transition { state: next, stack, warning })
    }

    fn check_table(&self, action_id: u64, position: &Point) -> Result<Option<SafetyWarning>, CursorError> {
        if !self.safety.check_table_collision || position.z >= self.safety.table_height {
            return Ok(None);
        }
        match self.safety.policy {
            CollisionPolicy::Stop => Err(CursorError::TableCollision {
                z: position.z,
                table_height: self.safety.table_height,
            }),
            CollisionPolicy::Warn => Ok(Some(SafetyWarning {
                action_id,
                z: position.z,
                table_height: self.safety.table_height,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn applies_immediately(&self) -> bool {
        self.apply_immediately
    }

    pub fn buffer(&self) -> &ActionBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ActionBuffer {
        &mut self.buffer
    }

    pub fn settings_depth(&self) -> usize {
        self.settings_stack.depth()
    }

    /// Warnings recorded since the last call
    pub fn take_warnings(&mut self) -> Vec<SafetyWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// Increment or replace a scalar setting, floored at zero
fn step_value(current: u32, value: i32, relative: bool) -> u32 {
    let target = if relative {
        i64::from(current) + i64::from(value)
    } else {
        i64::from(value)
    };
    target.clamp(0, i64::from(u32::MAX)) as u32
}
