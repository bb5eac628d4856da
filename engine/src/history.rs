use std::collections::VecDeque;

use corelib::Digit;
use serde::Serialize;

use crate::error::{ConfigError, EngineError};

/// A run of two or more equal digits visible in the history window.
///
/// `start` and `end` are inclusive indices into [`DigitHistory::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterSpan {
    pub digit: Digit,
    pub start: usize,
    pub end: usize,
    /// The run reaches the newest digit and has not been broken yet.
    pub open: bool,
}

impl ClusterSpan {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

/// Bounded FIFO of the most recent digits of one instrument.
#[derive(Debug, Clone)]
pub struct DigitHistory {
    /// Oldest first
    window: VecDeque<Digit>,
    capacity: usize,
}

impl DigitHistory {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn append(&mut self, digit: Digit) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(digit);
    }

    /// Append an unvalidated value. Anything outside 0..=9 is rejected and
    /// leaves the history untouched.
    pub fn append_raw(&mut self, value: u8) -> Result<(), EngineError> {
        let digit = Digit::new(value)?;
        self.append(digit);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Digit> {
        self.window.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Digit> {
        self.window.iter()
    }

    pub fn latest(&self) -> Option<Digit> {
        self.window.back().copied()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Maximal runs of length >= 2 in the current window, oldest first.
    pub fn cluster_spans(&self) -> Vec<ClusterSpan> {
        let mut spans = Vec::new();
        let len = self.window.len();
        let mut start = 0;

        while start < len {
            let digit = self.window[start];
            let mut end = start;
            while end + 1 < len && self.window[end + 1] == digit {
                end += 1;
            }
            if end > start {
                spans.push(ClusterSpan {
                    digit,
                    start,
                    end,
                    open: end == len - 1,
                });
            }
            start = end + 1;
        }

        spans
    }
}
