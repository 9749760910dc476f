// Copyright 2025 Runlens Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a single named metric on one test result.
///
/// Every field is optional on the wire; a missing or null `is_successful`
/// counts as a failing metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricOutcome {
    pub is_successful: Option<bool>,
    pub reason: Option<String>,
    pub score: Option<f64>,
    pub threshold: Option<f64>,
}

/// Review counters attached to a result (comments, follow-up tasks).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultCounts {
    pub comments: Option<u32>,
    pub tasks: Option<u32>,
}

/// One executed test's outcome. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    /// Unique identifier for the result row
    pub id: String,

    /// Source test, when the backend links it
    pub test_id: Option<String>,

    /// Run this result belongs to (not always present on the row)
    pub test_run_id: Option<String>,

    /// Prompt used for this execution
    pub prompt_id: Option<String>,

    /// When this result was recorded
    pub created_at: Option<DateTime<Utc>>,

    /// The model output under evaluation
    pub output_text: String,

    /// Per-metric judgments keyed by metric name
    pub metrics: HashMap<String, MetricOutcome>,

    #[serde(default)]
    pub counts: ResultCounts,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestResult {
    /// Whether this result passed: the metric map is non-empty and every
    /// metric reports `is_successful == true`. An empty map never passes.
    pub fn is_passed(&self) -> bool {
        !self.metrics.is_empty()
            && self
                .metrics
                .values()
                .all(|m| m.is_successful == Some(true))
    }

    /// (passing metrics, total metrics) for this result.
    pub fn metric_counts(&self) -> (usize, usize) {
        let passed = self
            .metrics
            .values()
            .filter(|m| m.is_successful == Some(true))
            .count();
        (passed, self.metrics.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(ok: Option<bool>) -> MetricOutcome {
        MetricOutcome {
            is_successful: ok,
            ..Default::default()
        }
    }

    fn result(metrics: Vec<(&str, Option<bool>)>) -> TestResult {
        TestResult {
            id: "r1".into(),
            test_id: None,
            test_run_id: None,
            prompt_id: None,
            created_at: None,
            output_text: String::new(),
            metrics: metrics
                .into_iter()
                .map(|(name, ok)| (name.to_string(), metric(ok)))
                .collect(),
            counts: ResultCounts::default(),
            tags: vec![],
        }
    }

    #[test]
    fn empty_metrics_never_pass() {
        assert!(!result(vec![]).is_passed());
    }

    #[test]
    fn all_metrics_true_passes() {
        let r = result(vec![("relevance", Some(true)), ("toxicity", Some(true))]);
        assert!(r.is_passed());
    }

    #[test]
    fn single_false_metric_fails() {
        let r = result(vec![("relevance", Some(true)), ("toxicity", Some(false))]);
        assert!(!r.is_passed());
    }

    #[test]
    fn null_metric_counts_as_failing() {
        let r = result(vec![("relevance", Some(true)), ("toxicity", None)]);
        assert!(!r.is_passed());
    }

    #[test]
    fn metric_counts_split_passing_from_total() {
        let r = result(vec![
            ("a", Some(true)),
            ("b", Some(false)),
            ("c", None),
        ]);
        assert_eq!(r.metric_counts(), (1, 3));
    }
}
