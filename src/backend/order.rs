//! Insertion Order Module
//!
//! First-observed ordering used for approximate capacity eviction.

use std::collections::VecDeque;

// == Insertion Order ==
/// Tracks the order in which keys were first stored.
///
/// - Front = oldest observed key
/// - Back = newest observed key
///
/// Reads do not reorder keys, so eviction is first-in-first-out rather than
/// least-recently-used.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Observe ==
    /// Records a key the first time it is seen. Overwrites keep their position.
    pub fn observe(&mut self, key: &str) {
        if !self.contains(key) {
            self.order.push_back(key.to_string());
        }
    }

    // == Remove ==
    /// Forgets a key.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Pop Oldest ==
    /// Returns and forgets the oldest observed key, None if empty.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    /// Drops every tracked key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_new() {
        let order = InsertionOrder::new();
        assert!(order.is_empty());
        assert_eq!(order.len(), 0);
    }

    #[test]
    fn test_pop_oldest_is_fifo() {
        let mut order = InsertionOrder::new();
        order.observe("a");
        order.observe("b");
        order.observe("c");

        assert_eq!(order.pop_oldest(), Some("a".to_string()));
        assert_eq!(order.pop_oldest(), Some("b".to_string()));
        assert_eq!(order.pop_oldest(), Some("c".to_string()));
        assert_eq!(order.pop_oldest(), None);
    }

    #[test]
    fn test_observe_existing_key_keeps_position() {
        let mut order = InsertionOrder::new();
        order.observe("a");
        order.observe("b");
        order.observe("a");

        assert_eq!(order.len(), 2);
        assert_eq!(order.pop_oldest(), Some("a".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut order = InsertionOrder::new();
        order.observe("a");
        order.observe("b");
        order.remove("a");
        order.remove("missing");

        assert_eq!(order.len(), 1);
        assert!(!order.contains("a"));
        assert!(order.contains("b"));
    }

    #[test]
    fn test_clear() {
        let mut order = InsertionOrder::new();
        order.observe("a");
        order.clear();
        assert!(order.is_empty());
    }
}
