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

//! Normalization of permissive API payloads into the canonical model.
//!
//! The management API nests optional objects several levels deep and is
//! inconsistent about null vs. missing fields. The `Raw*` structs mirror
//! the wire shape with every field defaulted; the `normalize_*` functions
//! are the only place those shapes are interpreted. Fields that fail to
//! parse are defaulted or dropped, never propagated as dynamic values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::behavior::{Behavior, BehaviorMetric};
use crate::prompt::Prompt;
use crate::test_result::{MetricOutcome, ResultCounts, TestResult};
use crate::test_run::{NamedRef, RunAttributes, TestConfiguration, TestRun};

/// Metric entry as it appears under `test_metrics.metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetricOutcome {
    #[serde(default)]
    pub is_successful: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestOutput {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestMetrics {
    #[serde(default)]
    pub metrics: Option<HashMap<String, RawMetricOutcome>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCounts {
    #[serde(default)]
    pub comments: Option<u32>,
    #[serde(default)]
    pub tasks: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTag {
    #[serde(default)]
    pub name: Option<String>,
}

/// Test result row as returned by `GET /test_results`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestResult {
    /// Defaulted so one malformed row cannot fail a whole page decode;
    /// empty-id rows are dropped by the callers that list.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub test_run_id: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub test_output: Option<RawTestOutput>,
    #[serde(default)]
    pub test_metrics: Option<RawTestMetrics>,
    #[serde(default)]
    pub counts: Option<RawCounts>,
    #[serde(default)]
    pub tags: Option<Vec<RawTag>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNamedRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRunAttributes {
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestConfiguration {
    #[serde(default)]
    pub test_set: Option<RawNamedRef>,
    #[serde(default)]
    pub endpoint: Option<RawNamedRef>,
}

/// Test run row as returned by `GET /test_runs/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestRun {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub attributes: Option<RawRunAttributes>,
    #[serde(default)]
    pub test_configuration: Option<RawTestConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPrompt {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Behavior row; rows missing id or name are rejected during normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBehavior {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetricDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(err) => {
            tracing::debug!(value = raw, %err, "dropping unparseable timestamp");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn normalize_result(raw: RawTestResult) -> TestResult {
    let metrics = raw
        .test_metrics
        .and_then(|tm| tm.metrics)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, m)| {
            (
                name,
                MetricOutcome {
                    is_successful: m.is_successful,
                    reason: m.reason,
                    score: m.score,
                    threshold: m.threshold,
                },
            )
        })
        .collect();

    let tags = raw
        .tags
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| non_empty(t.name))
        .collect();

    TestResult {
        id: raw.id,
        test_id: non_empty(raw.test_id),
        test_run_id: non_empty(raw.test_run_id),
        prompt_id: non_empty(raw.prompt_id),
        created_at: parse_timestamp(raw.created_at.as_deref()),
        output_text: raw
            .test_output
            .and_then(|o| o.output)
            .unwrap_or_default(),
        metrics,
        counts: raw
            .counts
            .map(|c| ResultCounts {
                comments: c.comments,
                tasks: c.tasks,
            })
            .unwrap_or_default(),
        tags,
    }
}

pub fn normalize_run(raw: RawTestRun) -> TestRun {
    let attributes = raw
        .attributes
        .map(|a| RunAttributes {
            started_at: parse_timestamp(a.started_at.as_deref()),
            completed_at: parse_timestamp(a.completed_at.as_deref()),
            environment: non_empty(a.environment),
        })
        .unwrap_or_default();

    let named = |r: Option<RawNamedRef>| {
        r.map(|r| NamedRef {
            id: non_empty(r.id),
            name: non_empty(r.name),
        })
    };

    let test_configuration = raw
        .test_configuration
        .map(|c| TestConfiguration {
            test_set: named(c.test_set),
            endpoint: named(c.endpoint),
        })
        .unwrap_or_default();

    TestRun {
        id: raw.id,
        name: non_empty(raw.name),
        created_at: parse_timestamp(raw.created_at.as_deref()),
        attributes,
        test_configuration,
    }
}

pub fn normalize_prompt(raw: RawPrompt) -> Prompt {
    Prompt {
        content: raw.content.unwrap_or_default(),
        name: non_empty(raw.name),
    }
}

/// Returns `None` when the row lacks an id or a name.
pub fn normalize_behavior(raw: RawBehavior) -> Option<Behavior> {
    let id = non_empty(raw.id)?;
    let name = non_empty(raw.name)?;
    Some(Behavior {
        id,
        name,
        description: non_empty(raw.description),
        metrics: Vec::new(),
    })
}

/// Keeps only metric rows that carry a name.
pub fn normalize_metric_rows(rows: Vec<RawMetricDetail>) -> Vec<BehaviorMetric> {
    rows.into_iter()
        .filter_map(|m| {
            Some(BehaviorMetric {
                name: non_empty(m.name)?,
                description: m.description,
            })
        })
        .collect()
}
