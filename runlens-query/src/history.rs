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

//! Per-test history across runs.
//!
//! Collapses a test's results from many runs into one row per run: the
//! most recent result wins, newest runs first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use runlens_core::TestResult;

const UNKNOWN_RUN: &str = "unknown";

/// One run's entry in a test's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRow {
    pub result_id: String,
    pub test_run_id: String,
    pub test_run_name: String,
    pub passed: bool,
    pub passed_metrics: usize,
    pub total_metrics: usize,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Build history rows for one test from its results across runs.
///
/// Results missing a run id group under the literal `unknown` run and do
/// not resolve a name. Rows without a timestamp sort after dated ones.
pub fn build_history(
    results: &[TestResult],
    run_names: &HashMap<String, String>,
    limit: usize,
) -> Vec<HistoryRow> {
    let mut rows: Vec<HistoryRow> = results
        .iter()
        .map(|r| {
            let (passed_metrics, total_metrics) = r.metric_counts();
            let test_run_id = r
                .test_run_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_RUN.to_string());
            let test_run_name = if test_run_id == UNKNOWN_RUN {
                UNKNOWN_RUN.to_string()
            } else {
                run_names
                    .get(&test_run_id)
                    .cloned()
                    .unwrap_or_else(|| test_run_id.clone())
            };
            HistoryRow {
                result_id: r.id.clone(),
                test_run_id,
                test_run_name,
                passed: r.is_passed(),
                passed_metrics,
                total_metrics,
                executed_at: r.created_at,
            }
        })
        .collect();

    // None sorts before Some, so a descending sort puts undated rows last.
    rows.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));

    let mut seen: HashSet<String> = HashSet::new();
    rows.retain(|row| seen.insert(row.test_run_id.clone()));
    rows.truncate(limit);
    rows
}
