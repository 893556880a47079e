//! Bounded in-memory log of bias transitions for the live session.
//!
//! Nothing here is persisted; the history lives as long as the engine.

use chrono::NaiveDateTime;
use nqfuse_core::scoring::Bias;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One bias transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub at: NaiveDateTime,
    pub bias: Bias,
    pub score: u8,
    /// First reason of the result that caused the transition, if any.
    pub key_reason: Option<String>,
}

/// Most recent transitions, oldest first. Capacity 0 keeps nothing.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    entries: VecDeque<SignalEntry>,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: SignalEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&SignalEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<SignalEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn entry(minute: i64, bias: Bias) -> SignalEntry {
        SignalEntry {
            at: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                + Duration::minutes(minute),
            bias,
            score: 50,
            key_reason: None,
        }
    }

    #[test]
    fn keeps_most_recent_entries() {
        let mut history = SignalHistory::new(3);
        for i in 0..5 {
            history.push(entry(i, Bias::Neutral));
        }
        assert_eq!(history.len(), 3);
        let minutes: Vec<_> = history.iter().map(|e| e.at).collect();
        assert_eq!(minutes[0], entry(2, Bias::Neutral).at);
        assert_eq!(history.latest().unwrap().at, entry(4, Bias::Neutral).at);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = SignalHistory::new(0);
        history.push(entry(0, Bias::Bearish));
        assert!(history.is_empty());
    }

    proptest! {
        /// The history never outgrows its capacity and always ends with the last push.
        #[test]
        fn bounded_and_latest_is_last_push(capacity in 0usize..20, pushes in 0i64..60) {
            let mut history = SignalHistory::new(capacity);
            for i in 0..pushes {
                history.push(entry(i, Bias::Bullish));
            }
            prop_assert!(history.len() <= capacity);
            prop_assert_eq!(history.len(), capacity.min(pushes as usize));
            if !history.is_empty() {
                prop_assert_eq!(
                    history.latest().map(|e| e.at),
                    Some(entry(pushes - 1, Bias::Bullish).at)
                );
            }
        }
    }
}
