//! CursorChain - ordered pipeline of cursors addressed by index
//!
//! Actions enter at index 0. Whenever a cursor applies an action, the chain
//! hands that same `Arc<Action>` to the next cursor, so a stage only ever sees
//! actions every stage before it accepted.

use crate::action::{Action, ActionKind};
use crate::config::{Config, SafetyConfig};
use crate::cursor::{InitialState, IssueOutcome, RobotCursor, SafetyWarning};
use crate::error::CursorError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The three stages of a standard chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Simulates every request as soon as it is issued
    Virtual,
    /// Holds actions until they are compiled or streamed
    Write,
    /// Mirrors what has been handed to the device
    Motion,
}

impl Stage {
    pub fn index(self) -> usize {
        match self {
            Stage::Virtual => 0,
            Stage::Write => 1,
            Stage::Motion => 2,
        }
    }
}

impl From<Stage> for usize {
    fn from(stage: Stage) -> usize {
        stage.index()
    }
}

/// Result of a successful issue or apply
#[derive(Debug, Clone, PartialEq)]
pub struct Issued {
    pub action: Arc<Action>,
    /// Safety warnings raised by the stage that applied it
    pub warnings: Vec<SafetyWarning>,
}

/// Result of a successful release
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Released {
    pub count: usize,
    pub warnings: Vec<SafetyWarning>,
}

#[derive(Debug, Clone)]
pub struct CursorChain {
    cursors: Vec<RobotCursor>,
    last_id: u64,
}

impl CursorChain {
    pub fn new(cursors: Vec<RobotCursor>) -> Self {
        Self { cursors, last_id: 0 }
    }

    /// Virtual (immediate) -> write (buffered) -> motion (immediate)
    pub fn standard(safety: &SafetyConfig) -> Self {
        Self::new(vec![
            RobotCursor::new("virtual", true, safety.clone()),
            RobotCursor::new("write", false, safety.clone()),
            RobotCursor::new("motion", true, safety.clone()),
        ])
    }

    /// Standard chain initialized from the configured home state
    pub fn from_config(config: &Config) -> Result<Self, CursorError> {
        let mut chain = Self::standard(&config.safety);
        chain.initialize(config.cursor.initial_state())?;
        Ok(chain)
    }

    /// Initialize every cursor with the same state
    pub fn initialize(&mut self, initial: InitialState) -> Result<(), CursorError> {
        if self.cursors.iter().any(RobotCursor::is_initialized) {
            return Err(CursorError::AlreadyInitialized);
        }
        for cursor in &mut self.cursors {
            cursor.initialize(initial)?;
        }
        info!("Initialized cursor chain of {} stages", self.cursors.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn cursor(&self, stage: impl Into<usize>) -> Option<&RobotCursor> {
        self.cursors.get(stage.into())
    }

    fn cursor_mut(&mut self, stage: usize) -> Result<&mut RobotCursor, CursorError> {
        self.cursors.get_mut(stage).ok_or(CursorError::UnknownStage(stage))
    }

    /// Stamp `kind` with the next id and issue it to the first cursor.
    /// Only warnings from the first cursor are reported.
    pub fn issue(&mut self, kind: ActionKind) -> Result<Issued, CursorError> {
        let action = Arc::new(Action::new(self.last_id + 1, kind));
        let head = self.cursor_mut(0)?;

        let outcome = head.issue(Arc::clone(&action));
        let warnings = head.take_warnings();
        match outcome {
            Ok(IssueOutcome::Applied) => {
                self.last_id = action.id;
                self.forward(0, Arc::clone(&action));
            }
            Ok(IssueOutcome::Buffered) => self.last_id = action.id,
            Err(e) => {
                warn!("Rejected {}: {}", action, e);
                return Err(e);
            }
        }

        Ok(Issued { action, warnings })
    }

    /// Apply the next pending action of `stage` and forward it downstream.
    /// Only warnings from `stage` itself are reported.
    pub fn apply_next(&mut self, stage: impl Into<usize>) -> Result<Issued, CursorError> {
        let stage = stage.into();
        let cursor = self.cursor_mut(stage)?;
        let action = cursor.apply_next()?;
        let warnings = cursor.take_warnings();
        self.forward(stage, Arc::clone(&action));
        Ok(Issued { action, warnings })
    }

    /// Apply the marked block (or all pending actions) of `stage`, in order.
    /// Stops at the first rejected action, which stays pending.
    pub fn release(&mut self, stage: impl Into<usize>, use_block: bool) -> Result<Released, CursorError> {
        let stage = stage.into();
        let buffer = self.cursor_mut(stage)?.buffer();
        let count = if use_block {
            buffer.block_len()
        } else {
            buffer.pending_len()
        };

        let mut released = Released::default();
        while released.count < count {
            match self.apply_next(stage) {
                Ok(applied) => {
                    released.count += 1;
                    released.warnings.extend(applied.warnings);
                }
                Err(e) => {
                    error!("Release of stage {} stopped after {} actions: {}", stage, released.count, e);
                    return Err(e);
                }
            }
        }
        debug!("Released {} actions from stage {}", count, stage);
        Ok(released)
    }

    pub fn mark_block(&mut self, stage: impl Into<usize>) -> Result<(), CursorError> {
        self.cursor_mut(stage.into())?.buffer_mut().mark_block();
        Ok(())
    }

    /// Drop every pending action of `stage` without applying it
    pub fn discard_pending(&mut self, stage: impl Into<usize>) -> Result<usize, CursorError> {
        let stage = stage.into();
        let dropped = self.cursor_mut(stage)?.buffer_mut().discard_pending();
        if dropped > 0 {
            info!("Discarded {} pending actions from stage {}", dropped, stage);
        }
        Ok(dropped)
    }

    /// Hand `action` to the stages after `from`. Their warnings repeat the
    /// originating stage's and are only logged.
    fn forward(&mut self, from: usize, action: Arc<Action>) {
        let mut index = from + 1;
        while let Some(child) = self.cursors.get_mut(index) {
            let outcome = child.issue(Arc::clone(&action));
            child.take_warnings();
            match outcome {
                Ok(IssueOutcome::Applied) => index += 1,
                Ok(IssueOutcome::Buffered) => break,
                Err(e) => {
                    error!("Cursor '{}' rejected forwarded {}: {}", child.name(), action, e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::cursor::CursorState;
    use crate::geometry::{Point, Rotation};
    use nalgebra::Vector3;

    fn chain() -> CursorChain {
        let mut chain = CursorChain::standard(&SafetyConfig::default());
        chain
            .initialize(CursorState::at_pose(Point::new(0.0, 0.0, 200.0), Rotation::identity()))
            .unwrap();
        chain
    }

    fn pending(chain: &CursorChain, stage: Stage) -> usize {
        chain.cursor(stage).map(|c| c.buffer().pending_len()).unwrap_or(0)
    }

    #[test]
    fn test_issue_applies_virtual_and_buffers_write() {
        let mut chain = chain();
        let issued = chain.issue(ActionKind::translate(Vector3::new(10.0, 0.0, 0.0))).unwrap();
        assert_eq!(issued.action.id, 1);

        let virtual_state = chain.cursor(Stage::Virtual).unwrap().state();
        assert_eq!(virtual_state.position, Some(Point::new(10.0, 0.0, 200.0)));

        let write = chain.cursor(Stage::Write).unwrap();
        assert_eq!(write.state().position, Some(Point::new(0.0, 0.0, 200.0)));
        assert_eq!(pending(&chain, Stage::Write), 1);
        assert!(chain.cursor(Stage::Motion).unwrap().buffer().is_empty_ever());
    }

    #[test]
    fn test_apply_next_forwards_same_action() {
        let mut chain = chain();
        let issued = chain.issue(ActionKind::speed_to(80)).unwrap();
        let applied = chain.apply_next(Stage::Write).unwrap();
        assert!(Arc::ptr_eq(&issued.action, &applied.action));

        let motion = chain.cursor(Stage::Motion).unwrap();
        assert_eq!(motion.state().speed, 80);
        assert!(Arc::ptr_eq(&motion.buffer().released()[0], &issued.action));
    }

    #[test]
    fn test_rejected_issue_reaches_nobody() {
        let mut chain = chain();
        let result = chain.issue(ActionKind::translate(Vector3::new(0.0, 0.0, -500.0)));
        assert!(matches!(result, Err(CursorError::TableCollision { .. })));
        assert_eq!(pending(&chain, Stage::Write), 0);
        assert!(chain.cursor(Stage::Virtual).unwrap().buffer().is_empty_ever());

        // The rejected issue did not consume an id
        let issued = chain.issue(ActionKind::wait(10)).unwrap();
        assert_eq!(issued.action.id, 1);
    }

    #[test]
    fn test_release_block_then_rest() {
        let mut chain = chain();
        chain.issue(ActionKind::speed(5)).unwrap();
        chain.issue(ActionKind::speed(5)).unwrap();
        chain.mark_block(Stage::Write).unwrap();
        chain.issue(ActionKind::speed(5)).unwrap();

        assert_eq!(chain.release(Stage::Write, true).unwrap().count, 2);
        assert_eq!(chain.cursor(Stage::Motion).unwrap().state().speed, 30);
        assert_eq!(pending(&chain, Stage::Write), 1);

        assert_eq!(chain.release(Stage::Write, true), Ok(Released::default()));
        assert_eq!(chain.release(Stage::Write, false).unwrap().count, 1);
        assert_eq!(chain.cursor(Stage::Motion).unwrap().state().speed, 35);
    }

    #[test]
    fn test_ids_increase_in_issue_order() {
        let mut chain = chain();
        for _ in 0..4 {
            chain.issue(ActionKind::wait(1)).unwrap();
        }
        chain.release(Stage::Write, false).unwrap();
        let ids: Vec<u64> = chain
            .cursor(Stage::Motion)
            .unwrap()
            .buffer()
            .released()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_discard_and_unknown_stage() {
        let mut chain = chain();
        chain.issue(ActionKind::wait(1)).unwrap();
        assert_eq!(chain.discard_pending(Stage::Write), Ok(1));
        assert_eq!(chain.apply_next(Stage::Write), Err(CursorError::NothingPending));
        assert_eq!(chain.apply_next(7usize), Err(CursorError::UnknownStage(7)));
    }

    #[test]
    fn test_warnings_belong_to_the_releasing_request() {
        let safety = SafetyConfig {
            policy: CollisionPolicy::Warn,
            ..SafetyConfig::default()
        };
        let mut chain = CursorChain::standard(&safety);
        chain
            .initialize(CursorState::at_pose(Point::new(0.0, 0.0, 10.0), Rotation::identity()))
            .unwrap();

        let issued = chain.issue(ActionKind::translate(Vector3::new(0.0, 0.0, -50.0))).unwrap();
        let ids: Vec<u64> = issued.warnings.iter().map(|w| w.action_id).collect();
        assert_eq!(ids, vec![1]);

        // Write raises its own warning on release; motion's copy is not reported
        let released = chain.release(Stage::Write, false).unwrap();
        assert_eq!(released.count, 1);
        let ids: Vec<u64> = released.warnings.iter().map(|w| w.action_id).collect();
        assert_eq!(ids, vec![1]);

        let wait = chain.issue(ActionKind::wait(10)).unwrap();
        assert!(wait.warnings.is_empty());
        assert!(chain.release(Stage::Write, false).unwrap().warnings.is_empty());
    }

    #[test]
    fn test_double_initialize_fails() {
        let mut chain = chain();
        assert_eq!(
            chain.initialize(CursorState::default()),
            Err(CursorError::AlreadyInitialized)
        );
    }
}
