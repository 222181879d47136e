//! ActionBuffer - ordered pending/released log owned by each cursor

use crate::action::Action;
use std::collections::VecDeque;
use std::sync::Arc;

/// Two-partition action log. Actions leave `pending` only from the front
/// and land at the back of `released`, so issue order is never lost.
#[derive(Debug, Clone, Default)]
pub struct ActionBuffer {
    pending: VecDeque<Arc<Action>>,
    released: Vec<Arc<Action>>,
    /// Length of the pending prefix flagged as one compilation unit
    block_len: Option<usize>,
    received_any: bool,
}

impl ActionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to pending
    pub fn add(&mut self, action: Arc<Action>) {
        self.pending.push_back(action);
        self.received_any = true;
    }

    /// Oldest pending action without consuming it
    pub fn peek_next(&self) -> Option<&Arc<Action>> {
        self.pending.front()
    }

    /// Move the oldest pending action to released and return it
    pub fn take_next(&mut self) -> Option<Arc<Action>> {
        let action = self.pending.pop_front()?;
        self.released.push(Arc::clone(&action));
        self.block_len = match self.block_len {
            Some(len) if len > 1 => Some(len - 1),
            _ => None,
        };
        Some(action)
    }

    /// Snapshot of every pending action, optionally moving them all to released
    pub fn peek_all_pending(&mut self, flush: bool) -> Vec<Arc<Action>> {
        let snapshot: Vec<_> = self.pending.iter().cloned().collect();
        if flush {
            self.released.extend(self.pending.drain(..));
            self.block_len = None;
        }
        snapshot
    }

    /// Snapshot of the flagged block, optionally moving it to released.
    /// Returns `None` when no block is marked.
    pub fn peek_block_pending(&mut self, flush: bool) -> Option<Vec<Arc<Action>>> {
        let len = self.block_len?;
        let snapshot: Vec<_> = self.pending.iter().take(len).cloned().collect();
        if flush {
            self.released.extend(self.pending.drain(..len));
            self.block_len = None;
        }
        Some(snapshot)
    }

    /// Flag everything currently pending as one compilation unit
    pub fn mark_block(&mut self) {
        if !self.pending.is_empty() {
            self.block_len = Some(self.pending.len());
        }
    }

    pub fn has_block(&self) -> bool {
        self.block_len.is_some()
    }

    pub fn block_len(&self) -> usize {
        self.block_len.unwrap_or(0)
    }

    /// Drop all pending actions without releasing them; returns how many were dropped
    pub fn discard_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.block_len = None;
        count
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn released(&self) -> &[Arc<Action>] {
        &self.released
    }

    /// True if the buffer has never received an action
    pub fn is_empty_ever(&self) -> bool {
        !self.received_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use proptest::prelude::*;

    fn action(id: u64) -> Arc<Action> {
        Arc::new(Action::new(id, ActionKind::wait(id * 10)))
    }

    fn ids(actions: &[Arc<Action>]) -> Vec<u64> {
        actions.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_take_next_moves_to_released() {
        let mut buffer = ActionBuffer::new();
        assert!(buffer.is_empty_ever());
        assert!(buffer.take_next().is_none());

        buffer.add(action(1));
        buffer.add(action(2));
        assert!(!buffer.is_empty_ever());
        assert_eq!(buffer.peek_next().map(|a| a.id), Some(1));

        assert_eq!(buffer.take_next().map(|a| a.id), Some(1));
        assert_eq!(ids(buffer.released()), vec![1]);
        assert_eq!(buffer.pending_len(), 1);
    }

    #[test]
    fn test_peek_all_pending_without_flush_keeps_state() {
        let mut buffer = ActionBuffer::new();
        for id in 1..=3 {
            buffer.add(action(id));
        }

        assert_eq!(ids(&buffer.peek_all_pending(false)), vec![1, 2, 3]);
        assert_eq!(ids(&buffer.peek_all_pending(false)), vec![1, 2, 3]);
        assert!(buffer.released().is_empty());

        assert_eq!(ids(&buffer.peek_all_pending(true)), vec![1, 2, 3]);
        assert_eq!(buffer.pending_len(), 0);
        assert_eq!(ids(buffer.released()), vec![1, 2, 3]);
    }

    #[test]
    fn test_block_marks_prefix() {
        let mut buffer = ActionBuffer::new();
        assert!(buffer.peek_block_pending(false).is_none());

        buffer.add(action(1));
        buffer.add(action(2));
        buffer.mark_block();
        buffer.add(action(3));

        assert_eq!(buffer.peek_block_pending(false).map(|b| ids(&b)), Some(vec![1, 2]));
        assert_eq!(buffer.pending_len(), 3);

        // Consuming shrinks the block until it disappears
        buffer.take_next();
        assert_eq!(buffer.block_len(), 1);
        buffer.take_next();
        assert!(!buffer.has_block());
        assert_eq!(ids(&buffer.peek_all_pending(false)), vec![3]);
    }

    #[test]
    fn test_block_flush_releases_only_block() {
        let mut buffer = ActionBuffer::new();
        for id in 1..=3 {
            buffer.add(action(id));
            if id == 2 {
                buffer.mark_block();
            }
        }
        let block = buffer.peek_block_pending(true).unwrap_or_default();
        assert_eq!(ids(&block), vec![1, 2]);
        assert_eq!(ids(buffer.released()), vec![1, 2]);
        assert_eq!(ids(&buffer.peek_all_pending(false)), vec![3]);
    }

    #[test]
    fn test_discard_pending() {
        let mut buffer = ActionBuffer::new();
        buffer.add(action(1));
        buffer.add(action(2));
        buffer.mark_block();
        assert_eq!(buffer.discard_pending(), 2);
        assert!(!buffer.has_pending());
        assert!(!buffer.has_block());
        assert!(buffer.released().is_empty());
        assert!(!buffer.is_empty_ever());
    }

    proptest! {
        #[test]
        fn released_preserves_issue_order(count in 0usize..64, takes in 0usize..80) {
            let mut buffer = ActionBuffer::new();
            for id in 0..count as u64 {
                buffer.add(action(id));
            }
            for _ in 0..takes {
                buffer.take_next();
            }
            let expected: Vec<u64> = (0..count.min(takes) as u64).collect();
            prop_assert_eq!(ids(buffer.released()), expected);
            prop_assert_eq!(buffer.pending_len(), count.saturating_sub(takes));
        }
    }
}
