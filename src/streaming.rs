//! Streaming mode - hand the device one write-stage action at a time
//!
//! After an action that produced instructions, the streamer waits for the
//! device to report that it consumed them before it advances again. Issuing
//! keeps working in the meantime; new actions simply stay buffered.

use crate::action::Action;
use crate::chain::{CursorChain, Issued, Stage};
use crate::compiler::{Compiler, Step};
use crate::cursor::SafetyWarning;
use crate::error::CursorError;
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// One action handed to the device by [`Streamer::tick`]
#[derive(Debug, Clone, PartialEq)]
pub struct Streamed {
    pub action: Arc<Action>,
    /// Empty for settings-only actions
    pub lines: Vec<String>,
    /// Raised by the write stage while applying the action
    pub warnings: Vec<SafetyWarning>,
}

#[derive(Debug, Default)]
pub struct Streamer {
    awaiting_ack: bool,
    sent: usize,
}

impl Streamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether instructions were sent that the device has not acknowledged yet
    pub fn is_awaiting(&self) -> bool {
        self.awaiting_ack
    }

    /// Actions applied through this streamer so far
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Apply at most one pending write-stage action.
    ///
    /// `ready` acknowledges the previous instructions. Returns `None` when
    /// stalled on an acknowledgement or when nothing is pending; otherwise the
    /// applied action with its instruction lines.
    pub fn tick(&mut self, ready: bool, chain: &mut CursorChain, compiler: &dyn Compiler) -> Result<Option<Streamed>> {
        if ready {
            self.awaiting_ack = false;
        }
        if self.awaiting_ack {
            return Ok(None);
        }

        let write = chain
            .cursor(Stage::Write)
            .ok_or(CursorError::UnknownStage(Stage::Write.index()))?;
        if !write.buffer().has_pending() {
            return Ok(None);
        }

        let Issued { action, warnings } = chain.apply_next(Stage::Write)?;
        let state = chain
            .cursor(Stage::Write)
            .ok_or(CursorError::UnknownStage(Stage::Write.index()))?
            .state();
        let lines = compiler.stream_instruction(&Step {
            action: Arc::clone(&action),
            state,
        })?;

        self.sent += 1;
        self.awaiting_ack = !lines.is_empty();
        debug!("Streamed action {} ({} lines)", self.sent, lines.len());
        Ok(Some(Streamed { action, lines, warnings }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::compiler::UrScriptCompiler;
    use crate::config::{CollisionPolicy, SafetyConfig};
    use crate::cursor::{CursorState, RobotCursor};
    use crate::geometry::{Point, Rotation};
    use crate::RobokitError;
    use nalgebra::Vector3;

    fn chain() -> CursorChain {
        let mut chain = CursorChain::standard(&SafetyConfig::default());
        chain
            .initialize(CursorState::at_pose(Point::new(300.0, 0.0, 500.0), Rotation::identity()))
            .unwrap();
        chain
    }

    #[test]
    fn test_tick_waits_for_readiness() {
        let mut chain = chain();
        chain.issue(ActionKind::translate(Vector3::new(10.0, 0.0, 0.0))).unwrap();
        chain.issue(ActionKind::translate(Vector3::new(10.0, 0.0, 0.0))).unwrap();

        let mut streamer = Streamer::new();
        let first = streamer.tick(false, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        assert_eq!(first.action.id, 1);
        assert_eq!(first.lines.len(), 1);
        assert!(streamer.is_awaiting());

        // No acknowledgement yet: nothing advances, issuing still buffers
        assert!(streamer.tick(false, &mut chain, &UrScriptCompiler).unwrap().is_none());
        chain.issue(ActionKind::wait(100)).unwrap();
        assert_eq!(chain.cursor(Stage::Write).unwrap().buffer().pending_len(), 2);

        let second = streamer.tick(true, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        assert_eq!(second.lines, vec!["movel(p[0.32,0,0.5,0,0,0], a=1.2, v=0.02, r=0.005)".to_string()]);
        assert!(second.warnings.is_empty());

        let motion = chain.cursor(Stage::Motion).unwrap().state();
        assert_eq!(motion.position, Some(Point::new(320.0, 0.0, 500.0)));
        assert_eq!(streamer.sent(), 2);
    }

    #[test]
    fn test_settings_actions_do_not_wait() {
        let mut chain = chain();
        chain.issue(ActionKind::speed_to(100)).unwrap();
        chain.issue(ActionKind::wait(10)).unwrap();

        let mut streamer = Streamer::new();
        let speed = streamer.tick(false, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        assert!(speed.lines.is_empty());
        assert!(!streamer.is_awaiting());
        let wait = streamer.tick(false, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        assert_eq!(wait.lines, vec!["sleep(0.01)".to_string()]);
        assert!(streamer.tick(true, &mut chain, &UrScriptCompiler).unwrap().is_none());
    }

    #[test]
    fn test_failed_action_stays_pending() {
        let checked = SafetyConfig::default();
        let mut chain = CursorChain::new(vec![
            RobotCursor::new("virtual", true, SafetyConfig::disabled()),
            RobotCursor::new("write", false, checked.clone()),
            RobotCursor::new("motion", true, checked),
        ]);
        chain
            .initialize(CursorState::at_pose(Point::new(0.0, 0.0, 50.0), Rotation::identity()))
            .unwrap();
        chain.issue(ActionKind::translate(Vector3::new(0.0, 0.0, -100.0))).unwrap();

        let mut streamer = Streamer::new();
        let result = streamer.tick(false, &mut chain, &UrScriptCompiler);
        assert!(matches!(
            result,
            Err(RobokitError::Cursor(CursorError::TableCollision { .. }))
        ));
        assert_eq!(chain.cursor(Stage::Write).unwrap().buffer().pending_len(), 1);
        assert!(!streamer.is_awaiting());
        assert_eq!(streamer.sent(), 0);
    }

    #[test]
    fn test_tick_reports_write_stage_warnings() {
        let warn = SafetyConfig {
            policy: CollisionPolicy::Warn,
            ..SafetyConfig::default()
        };
        let mut chain = CursorChain::standard(&warn);
        chain
            .initialize(CursorState::at_pose(Point::new(0.0, 0.0, 10.0), Rotation::identity()))
            .unwrap();
        chain.issue(ActionKind::translate(Vector3::new(0.0, 0.0, -50.0))).unwrap();
        chain.issue(ActionKind::wait(10)).unwrap();

        let mut streamer = Streamer::new();
        let dipped = streamer.tick(false, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        let ids: Vec<u64> = dipped.warnings.iter().map(|w| w.action_id).collect();
        assert_eq!(ids, vec![1]);

        let wait = streamer.tick(true, &mut chain, &UrScriptCompiler).unwrap().unwrap();
        assert_eq!(wait.action.id, 2);
        assert!(wait.warnings.is_empty());
    }
}
