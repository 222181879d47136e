//! Settings stack for scoped speed/zone/motion/frame overrides

use crate::action::{MotionType, ReferenceFrame};
use serde::{Deserialize, Serialize};

/// The overridable part of a cursor's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub speed: u32,
    pub zone: u32,
    pub motion_type: MotionType,
    pub reference_frame: ReferenceFrame,
}

/// LIFO of settings snapshots
#[derive(Debug, Clone, Default)]
pub struct SettingsStack {
    stack: Vec<Settings>,
}

impl SettingsStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, settings: Settings) {
        self.stack.push(settings);
    }

    /// Most recently pushed settings, or `None` on underflow
    pub fn pop(&mut self) -> Option<Settings> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<&Settings> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
