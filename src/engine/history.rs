//! Bounded buffer of recently-seen positions.
//!
//! The encoder wants up to seven prior positions, most recent first. The
//! facade owns one of these and ships a snapshot with every predict
//! message, so the worker never shares mutable state with the caller.

use std::collections::VecDeque;

use super::types::HISTORY_CAPACITY;

#[derive(Debug, Default, Clone)]
pub struct PositionHistory {
    entries: VecDeque<String>,
}

impl PositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position as the most recent one, dropping the oldest once
    /// the buffer is full.
    pub fn push(&mut self, fen: &str) {
        self.entries.push_front(fen.to_string());
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most-recent-first copy for shipping across the worker boundary.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_first() {
        let mut history = PositionHistory::new();
        history.push("first");
        history.push("second");
        assert_eq!(history.snapshot(), vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = PositionHistory::new();
        for i in 0..20 {
            history.push(&format!("fen-{i}"));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.snapshot()[0], "fen-19");
        assert_eq!(history.snapshot()[6], "fen-13");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut history = PositionHistory::new();
        history.push("fen");
        history.clear();
        assert!(history.is_empty());
    }
}
