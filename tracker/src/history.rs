use std::collections::VecDeque;

use serde::Serialize;

use crate::position::Position;

/// Insertion-ordered positions kept for display.
///
/// A bounded buffer behaves as a rolling window and evicts its oldest entry
/// once full. An unbounded buffer grows until it is replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryBuffer {
    positions: VecDeque<Position>,
    #[serde(skip)]
    capacity: Option<usize>,
}

impl HistoryBuffer {
    /// Creates a rolling buffer holding at most `capacity` positions.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            positions: VecDeque::new(),
            capacity: None,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Appends a position, evicting the oldest ones past capacity.
    pub fn push(&mut self, position: Position) {
        self.positions.push_back(position);
        self.trim();
    }

    /// Replaces the whole content, keeping only the newest entries if the
    /// buffer is bounded.
    pub fn replace(&mut self, positions: Vec<Position>) {
        self.positions = positions.into();
        self.trim();
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn last(&self) -> Option<&Position> {
        self.positions.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    fn trim(&mut self) {
        if let Some(capacity) = self.capacity {
            while self.positions.len() > capacity {
                self.positions.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn position(seconds: i64) -> Position {
        let timestamp = DateTime::<Utc>::from_timestamp(1_740_817_800 + seconds, 0).unwrap();
        Position::new(36.8, 10.18 + seconds as f64 * 0.001, timestamp).unwrap()
    }

    #[test]
    fn rolling_buffer_keeps_newest_entries() {
        let mut buffer = HistoryBuffer::bounded(3);

        for i in 0..5 {
            buffer.push(position(i));
        }

        assert_eq!(buffer.len(), 3);
        let kept: Vec<_> = buffer.iter().map(|p| p.timestamp.timestamp()).collect();
        assert_eq!(kept, vec![1_740_817_802, 1_740_817_803, 1_740_817_804]);
        assert_eq!(buffer.last(), Some(&position(4)));
    }

    #[test]
    fn identical_positions_are_not_deduplicated() {
        let mut buffer = HistoryBuffer::bounded(10);

        buffer.push(position(0));
        buffer.push(position(0));

        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn unbounded_buffer_is_replaced_wholesale() {
        let mut buffer = HistoryBuffer::unbounded();
        buffer.push(position(0));

        buffer.replace((10..40).map(position).collect());

        assert_eq!(buffer.len(), 30);
        assert_eq!(buffer.iter().next(), Some(&position(10)));
    }

    #[test]
    fn bounded_replace_truncates_to_newest() {
        let mut buffer = HistoryBuffer::bounded(2);

        buffer.replace(vec![position(0), position(1), position(2)]);

        let kept: Vec<_> = buffer.iter().cloned().collect();
        assert_eq!(kept, vec![position(1), position(2)]);
    }
}
