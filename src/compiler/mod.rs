//! Compiler backends - turn a cursor's buffered actions into device programs
//!
//! Every backend replays the pending actions on a snapshot of the cursor, so
//! each instruction sees the cumulative speed, zone and pose in effect at that
//! point. Replaying a snapshot leaves the live cursor untouched; applying the
//! compiled actions for real is [`crate::CursorChain::release`].

pub mod human;
pub mod krl;
pub mod rapid;
pub mod urscript;

use crate::action::{Action, ActionKind};
use crate::cursor::{CursorState, RobotCursor};
use crate::error::CompileError;
use crate::geometry::{Joints, Point, Rotation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use human::HumanCompiler;
pub use krl::KrlCompiler;
pub use rapid::RapidCompiler;
pub use urscript::UrScriptCompiler;

/// Target languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// ABB RAPID
    #[default]
    Abb,
    /// Universal Robots URScript
    Ur,
    /// KUKA KRL
    Kuka,
    /// Readable listing for debugging
    Human,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Abb => write!(f, "abb"),
            Platform::Ur => write!(f, "ur"),
            Platform::Kuka => write!(f, "kuka"),
            Platform::Human => write!(f, "human"),
        }
    }
}

/// One replayed action with the cursor state right after applying it
#[derive(Debug, Clone)]
pub struct Step {
    pub action: Arc<Action>,
    pub state: CursorState,
}

/// What a motion instruction moves to
pub(crate) enum Target {
    Pose(Point, Rotation),
    Axes(Joints),
}

impl Step {
    pub(crate) fn target(&self) -> Result<Target, CompileError> {
        let missing = || CompileError::MissingTarget(self.action.id);
        match self.action.kind {
            ActionKind::Joints { .. } => Ok(Target::Axes(self.state.joints.ok_or_else(missing)?)),
            _ => {
                let position = self.state.position.ok_or_else(missing)?;
                let rotation = self.state.rotation.ok_or_else(missing)?;
                Ok(Target::Pose(position, rotation))
            }
        }
    }

    /// Variable name used for this step's target in declaration mode
    pub(crate) fn target_name(&self) -> String {
        match self.action.kind {
            ActionKind::Joints { .. } => format!("jtarget{}", self.action.id),
            _ => format!("target{}", self.action.id),
        }
    }
}

pub trait Compiler: Send + Sync {
    fn platform(&self) -> Platform;

    /// File extension for exported programs
    fn extension(&self) -> &'static str;

    /// Build a full program from the marked block (or all pending actions) of `cursor`
    fn generate_program(
        &self,
        name: &str,
        cursor: &RobotCursor,
        use_block: bool,
        inline_targets: bool,
    ) -> Result<Vec<String>, CompileError>;

    /// Standalone instruction lines for a single streamed step, targets inlined
    fn stream_instruction(&self, step: &Step) -> Result<Vec<String>, CompileError>;
}

pub fn compiler_for(platform: Platform) -> Box<dyn Compiler> {
    match platform {
        Platform::Abb => Box::new(RapidCompiler),
        Platform::Ur => Box::new(UrScriptCompiler),
        Platform::Kuka => Box::new(KrlCompiler),
        Platform::Human => Box::new(HumanCompiler),
    }
}

/// Replay the block (or all pending actions) on a snapshot of `cursor`
pub fn replay(cursor: &RobotCursor, use_block: bool) -> Result<Vec<Step>, CompileError> {
    let mut snapshot = cursor.clone();
    let actions = if use_block {
        snapshot
            .buffer_mut()
            .peek_block_pending(false)
            .ok_or(CompileError::NoBlockMarked)?
    } else {
        snapshot.buffer_mut().peek_all_pending(false)
    };

    let mut steps = Vec::with_capacity(actions.len());
    for expected in &actions {
        let action = snapshot
            .apply_next()
            .map_err(|source| CompileError::Replay { action: expected.id, source })?;
        steps.push(Step {
            action,
            state: snapshot.state(),
        });
    }
    Ok(steps)
}

/// Distinct values in first-seen order
#[derive(Debug, Default)]
pub(crate) struct UniqueValues {
    seen: Vec<u32>,
}

impl UniqueValues {
    /// Returns true the first time `value` is seen
    pub(crate) fn insert(&mut self, value: u32) -> bool {
        if self.seen.contains(&value) {
            false
        } else {
            self.seen.push(value);
            true
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.seen.iter().copied()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::chain::{CursorChain, Stage};
    use crate::config::SafetyConfig;
    use crate::error::CursorError;
    use nalgebra::Vector3;

    #[test]
    fn test_replay_leaves_cursor_untouched() {
        let chain = chain_with(vec![
            ActionKind::speed(10),
            ActionKind::translate(Vector3::new(0.0, 0.0, -100.0)),
        ]);
        let cursor = write_cursor(&chain);
        let before = cursor.state();

        let steps = replay(cursor, false).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].state.speed, 30);
        assert_eq!(steps[1].state.position, Some(Point::new(300.0, 0.0, 400.0)));

        assert_eq!(cursor.state(), before);
        assert_eq!(cursor.buffer().pending_len(), 2);
    }

    #[test]
    fn test_replay_block_requires_marker() {
        let mut chain = chain_with(vec![ActionKind::wait(10)]);
        assert_eq!(replay(write_cursor(&chain), true).unwrap_err(), CompileError::NoBlockMarked);

        chain.mark_block(Stage::Write).unwrap();
        chain.issue(ActionKind::wait(20)).unwrap();
        let steps = replay(write_cursor(&chain), true).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action.id, 1);
    }

    #[test]
    fn test_replay_reports_failing_action() {
        let mut chain = CursorChain::new(vec![
            RobotCursor::new("virtual", true, SafetyConfig::disabled()),
            RobotCursor::new("write", false, SafetyConfig::default()),
        ]);
        chain
            .initialize(CursorState::at_pose(Point::new(0.0, 0.0, 50.0), Rotation::identity()))
            .unwrap();
        chain.issue(ActionKind::wait(10)).unwrap();
        chain.issue(ActionKind::translate(Vector3::new(0.0, 0.0, -100.0))).unwrap();

        match replay(write_cursor(&chain), false) {
            Err(CompileError::Replay { action, source }) => {
                assert_eq!(action, 2);
                assert!(matches!(source, CursorError::TableCollision { .. }));
            }
            other => panic!("unexpected {:?}", other.map(|steps| steps.len())),
        }
        assert_eq!(write_cursor(&chain).buffer().pending_len(), 2);
    }

    #[test]
    fn test_every_platform_compiles_deterministically() {
        let chain = chain_with(vec![
            ActionKind::translate(Vector3::new(50.0, 0.0, 0.0)),
            ActionKind::message("Halfway"),
            ActionKind::wait(250),
        ]);
        for platform in [Platform::Abb, Platform::Ur, Platform::Kuka, Platform::Human] {
            let compiler = compiler_for(platform);
            assert_eq!(compiler.platform(), platform);
            let first = compiler.generate_program("Demo", write_cursor(&chain), false, false).unwrap();
            let second = compiler.generate_program("Demo", write_cursor(&chain), false, false).unwrap();
            assert_eq!(first, second);
            assert!(!first.is_empty());
        }
    }

    #[test]
    fn test_unique_values_keep_first_seen_order() {
        let mut values = UniqueValues::default();
        assert!(values.insert(50));
        assert!(values.insert(5));
        assert!(!values.insert(50));
        assert_eq!(values.iter().collect::<Vec<_>>(), vec![50, 5]);
    }
}
