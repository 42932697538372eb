//! Cloud-formation bookkeeping.
//!
//! Tracks what the leader has reported across polls. The poll loop itself
//! (timing, HTTP) lives in cloudfuzz-client.

/// Counts polls and remembers the last member count the leader reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizationTracker {
    expected_size: usize,
    last_observed: Option<usize>,
    polls: u32,
    failed_polls: u32,
}

impl StabilizationTracker {
    /// Start tracking a cloud expected to reach `expected_size` members.
    pub fn new(expected_size: usize) -> Self {
        Self {
            expected_size,
            last_observed: None,
            polls: 0,
            failed_polls: 0,
        }
    }

    /// Record a successful poll. Returns true once the count matches.
    pub fn observe(&mut self, count: usize) -> bool {
        self.polls += 1;
        self.last_observed = Some(count);
        count == self.expected_size
    }

    /// Record a poll that did not produce a count (refused, malformed).
    pub fn poll_failed(&mut self) {
        self.polls += 1;
        self.failed_polls += 1;
    }

    /// Target member count.
    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Last count the leader reported, or 0 if it never answered.
    pub fn last_observed_count(&self) -> usize {
        self.last_observed.unwrap_or(0)
    }

    /// Whether the leader ever answered.
    pub fn has_observed(&self) -> bool {
        self.last_observed.is_some()
    }

    /// Total polls issued.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Polls that did not produce a count.
    pub fn failed_polls(&self) -> u32 {
        self.failed_polls
    }
}
