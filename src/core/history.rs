//! Macrostep history tracking.
//!
//! Provides immutable tracking of completed macrosteps over time, following
//! the same record-returns-a-new-history discipline as snapshots.

use super::value::StateValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single completed macrostep.
///
/// # Example
///
/// ```rust
/// use pasture_sentinel::core::{StateValue, StepRecord};
/// use chrono::Utc;
///
/// let record = StepRecord {
///     event: "Start SOI".to_string(),
///     from: serde_json::from_str(r#"{"Undeployed":"Off"}"#).unwrap(),
///     to: serde_json::from_str(r#"{"Undeployed":"Unconfigured"}"#).unwrap(),
///     timestamp: Utc::now(),
/// };
/// assert!(record.to.matches("Undeployed.Unconfigured"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The signal that triggered the step
    pub event: String,
    /// Configuration before the step
    pub from: StateValue,
    /// Configuration after the step
    pub to: StateValue,
    /// When the step completed
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of macrosteps, optionally bounded.
///
/// History is immutable - `record` returns a new history with the step
/// added. A bounded history drops its oldest records first.
///
/// # Example
///
/// ```rust
/// use pasture_sentinel::core::{StateValue, StepHistory, StepRecord};
/// use chrono::Utc;
///
/// let history = StepHistory::new();
/// let history = history.record(StepRecord {
///     event: "go".to_string(),
///     from: StateValue::leaf("a"),
///     to: StateValue::leaf("b"),
///     timestamp: Utc::now(),
/// });
///
/// let path = history.path();
/// assert_eq!(path.len(), 2); // a -> b
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepHistory {
    records: VecDeque<StepRecord>,
    limit: Option<usize>,
}

impl StepHistory {
    /// Create a new, unbounded, empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history that keeps at most `limit` records.
    pub fn bounded(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Record a step, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, record: StepRecord) -> Self {
        let mut history = self.clone();
        history.push(record);
        history
    }

    /// Append a step in place, dropping the oldest record when the bound is
    /// reached.
    ///
    /// An unbounded history grows with every call.
    pub fn push(&mut self, record: StepRecord) {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }
            while self.records.len() >= limit {
                self.records.pop_front();
            }
        }
        self.records.push_back(record);
    }

    /// Configurations traversed: the first record's `from`, then the `to`
    /// of every record.
    pub fn path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.records.front() {
            path.push(&first.from);
        }
        for record in &self.records {
            path.push(&record.to);
        }
        path
    }

    /// Time between the first and last recorded steps.
    ///
    /// Returns `None` if the history is empty.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.front(), self.records.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Recorded steps, oldest first.
    pub fn records(&self) -> impl ExactSizeIterator<Item = &StepRecord> + DoubleEndedIterator {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
