//! Bounded history buffer.
//!
//! Keeps the most recent items in arrival order and evicts the oldest once
//! the capacity is reached.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::collections::vec_deque::Iter;

// ============================================================================
// Constants
// ============================================================================

/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

// ============================================================================
// History
// ============================================================================

/// Fixed-capacity FIFO log.
///
/// A capacity of zero retains nothing.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// Creates an empty history with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Appends an item, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Returns the capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of retained items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is retained.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the newest item.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> Iter<'_, T> {
        self.items.iter()
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> History<T> {
    /// Copies the items, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<'a, T> IntoIterator for &'a History<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_keeps_most_recent() {
        let mut history = History::new(100);
        for i in 1..=150 {
            history.push(i);
        }

        assert_eq!(history.len(), 100);
        assert_eq!(history.iter().next(), Some(&51));
        assert_eq!(history.latest(), Some(&150));
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut history = History::new(0);
        history.push("a");
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new(3);
        history.push(1);
        history.push(2);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_default_capacity() {
        let history: History<u8> = History::default();
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    proptest! {
        #[test]
        fn prop_len_bounded_and_order_kept(cap in 1usize..64, n in 0usize..256) {
            let mut history = History::new(cap);
            for i in 0..n {
                history.push(i);
            }

            let expected: Vec<usize> = (n.saturating_sub(cap)..n).collect();
            prop_assert_eq!(history.len(), n.min(cap));
            prop_assert_eq!(history.to_vec(), expected);
        }
    }
}
