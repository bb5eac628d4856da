//! Streak and cluster accounting for one instrument.
//!
//! A streak is open while consecutive digits match. It closes the moment a
//! different digit arrives; a closed streak of length >= 2 is a completed
//! cluster and produces exactly one [`ClusterCompleted`] event.

use std::collections::BTreeMap;

use corelib::Digit;
use serde::Serialize;
use tracing::trace;

/// Streak accounting for one digit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterState {
    /// Length of the open run, 0 when there is none.
    pub current_streak: usize,
    /// Lengths of completed runs, oldest first. Every entry is >= 2.
    pub completed: Vec<usize>,
}

impl ClusterState {
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_open(&self) -> bool {
        self.current_streak >= 2
    }
}

/// Emitted when a run of two or more equal digits is broken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterCompleted {
    pub digit: Digit,
    /// Length of the run that just closed.
    pub streak: usize,
    /// Completed clusters of `digit` including this one.
    pub completed_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterTracker {
    previous: Option<Digit>,
    /// Created lazily on a digit's first 2-run.
    states: BTreeMap<Digit, ClusterState>,
    observed: u64,
}

impl ClusterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next digit of the stream.
    pub fn observe(&mut self, digit: Digit) -> Option<ClusterCompleted> {
        self.observed += 1;

        // first digit: nothing to compare with
        let previous = self.previous.replace(digit)?;

        if digit == previous {
            self.extend_streak(digit);
            None
        } else {
            self.close_streak(previous)
        }
    }

    fn extend_streak(&mut self, digit: Digit) {
        let state = self.states.entry(digit).or_default();
        // the previous digit and this one already form a 2-run
        state.current_streak = if state.current_streak == 0 {
            2
        } else {
            state.current_streak + 1
        };
        trace!(digit = %digit, streak = state.current_streak, "streak extended");
    }

    fn close_streak(&mut self, digit: Digit) -> Option<ClusterCompleted> {
        let state = self.states.get_mut(&digit)?;
        let streak = std::mem::take(&mut state.current_streak);
        if streak < 2 {
            return None;
        }

        state.completed.push(streak);
        Some(ClusterCompleted {
            digit,
            streak,
            completed_count: state.completed.len(),
        })
    }

    pub fn state(&self, digit: Digit) -> Option<&ClusterState> {
        self.states.get(&digit)
    }

    pub fn completed_count(&self, digit: Digit) -> usize {
        self.states.get(&digit).map_or(0, ClusterState::completed_count)
    }

    pub fn completed_clusters(&self, digit: Digit) -> &[usize] {
        self.states
            .get(&digit)
            .map(|s| s.completed.as_slice())
            .unwrap_or(&[])
    }

    /// The run still in progress, if it is at least two long.
    pub fn open_streak(&self) -> Option<(Digit, usize)> {
        let digit = self.previous?;
        self.states
            .get(&digit)
            .filter(|s| s.is_open())
            .map(|s| (digit, s.current_streak))
    }

    pub fn states(&self) -> &BTreeMap<Digit, ClusterState> {
        &self.states
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }
}
