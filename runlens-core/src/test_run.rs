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

use crate::test_result::TestResult;

/// Reference to a named entity (test set, endpoint).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Execution metadata recorded on a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunAttributes {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub environment: Option<String>,
}

/// What was run against what.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestConfiguration {
    pub test_set: Option<NamedRef>,
    pub endpoint: Option<NamedRef>,
}

/// One execution of a test set against an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRun {
    pub id: String,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: RunAttributes,
    #[serde(default)]
    pub test_configuration: TestConfiguration,
}

impl TestRun {
    /// Display name, falling back to the run id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// The timestamp shown for the run: start time when recorded,
    /// creation time otherwise.
    pub fn started_or_created(&self) -> Option<DateTime<Utc>> {
        self.attributes.started_at.or(self.created_at)
    }
}

/// Aggregate pass/fail statistics for a set of results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage of fully passing results, rounded to one decimal.
    pub pass_rate: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_passed()).count();
        let pass_rate = if total > 0 {
            (passed as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate,
        }
    }
}
