use std::collections::VecDeque;

/// Creator and user feeds keep this many entries
pub const USER_FEED_CAPACITY: usize = 10;

/// The platform-wide feed keeps this many entries
pub const PLATFORM_FEED_CAPACITY: usize = 20;

/// Fixed-capacity buffer, newest entry first
#[derive(Debug, Clone)]
pub struct FeedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> FeedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head and drop whatever falls off the tail
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_newest_first() {
        let mut feed = FeedBuffer::new(3);
        feed.push(1);
        feed.push(2);
        assert_eq!(feed.snapshot(), vec![2, 1]);
        assert_eq!(feed.latest(), Some(&2));
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut feed = FeedBuffer::new(USER_FEED_CAPACITY);
        for i in 0..USER_FEED_CAPACITY + 5 {
            feed.push(i);
        }

        assert_eq!(feed.len(), USER_FEED_CAPACITY);
        let expected: Vec<usize> = (5..USER_FEED_CAPACITY + 5).rev().collect();
        assert_eq!(feed.snapshot(), expected);
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let mut feed = FeedBuffer::new(0);
        feed.push("x");
        assert!(feed.is_empty());
    }
}
