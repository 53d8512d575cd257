//! Status Code Tally
//!
//! Counts HTTP status codes observed since the last report. Draining zeroes
//! the counts but keeps every code seen so far, so reports list a stable set
//! of keys.
//!
//! The tally itself is not synchronized; [`super::Telemetry`] holds it behind
//! the same mutex as the ticker state.

use std::collections::BTreeMap;

/// Status code counts since the last drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTally {
    counts: BTreeMap<u16, u64>,
}

impl StatusTally {
    /// Create an empty tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `code`
    pub fn increment(&mut self, code: u16) {
        *self.counts.entry(code).or_insert(0) += 1;
    }

    /// Copy of the current counts
    pub fn snapshot(&self) -> BTreeMap<u16, u64> {
        self.counts.clone()
    }

    /// Return the current counts and reset each of them to zero
    pub fn drain(&mut self) -> BTreeMap<u16, u64> {
        let drained = self.counts.clone();
        for count in self.counts.values_mut() {
            *count = 0;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_new_code() {
        let mut tally = StatusTally::new();
        tally.increment(200);
        assert_eq!(tally.snapshot().get(&200), Some(&1));
    }

    #[test]
    fn test_increment_existing_code() {
        let mut tally = StatusTally::new();
        tally.increment(429);
        tally.increment(429);
        tally.increment(200);
        assert_eq!(tally.snapshot(), BTreeMap::from([(200, 1), (429, 2)]));
    }

    #[test]
    fn test_drain_keeps_keys_at_zero() {
        let mut tally = StatusTally::new();
        tally.increment(200);
        tally.increment(500);

        let drained = tally.drain();
        assert_eq!(drained, BTreeMap::from([(200, 1), (500, 1)]));
        assert_eq!(tally.snapshot(), BTreeMap::from([(200, 0), (500, 0)]));
    }

    #[test]
    fn test_drain_empty() {
        let mut tally = StatusTally::new();
        assert!(tally.drain().is_empty());
        assert!(tally.snapshot().is_empty());
    }
}
