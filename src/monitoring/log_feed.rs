use crate::global_variables::LOG_FEED_CAPACITY;
use std::collections::VecDeque;

/// Short transition/error messages for the operator display, newest first.
/// Only the last `capacity` messages are kept.
#[derive(Debug, Clone)]
pub struct LogFeed {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for LogFeed {
    fn default() -> Self {
        Self::new(LOG_FEED_CAPACITY)
    }
}

impl LogFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push_front(message.into());
        self.entries.truncate(self.capacity);
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries().collect::<Vec<_>>().join("\n")
    }
}
