use std::collections::BTreeMap;

/// Counts how often a digit's completed-cluster count reached each value,
/// across every instrument. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    table: BTreeMap<usize, u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One call per cluster-completed event, with the count just reached.
    pub fn record(&mut self, completed_count: usize) {
        *self.table.entry(completed_count).or_insert(0) += 1;
    }

    pub fn get(&self, completed_count: usize) -> u64 {
        self.table.get(&completed_count).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.table.values().sum()
    }

    /// Ordered by group size.
    pub fn snapshot(&self) -> BTreeMap<usize, u64> {
        self.table.clone()
    }
}
