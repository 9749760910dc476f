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

//! Runlens Core
//!
//! Canonical data structures for test runs, test results, behaviors and
//! prompts, plus the normalization layer that maps permissive API payloads
//! into them.

pub mod behavior;
pub mod error;
pub mod normalize;
pub mod prompt;
pub mod test_result;
pub mod test_run;

pub use behavior::{Behavior, BehaviorMetric};
pub use error::{Result, RunlensError};
pub use normalize::{
    normalize_behavior, normalize_metric_rows, normalize_prompt, normalize_result, normalize_run,
    RawBehavior, RawCounts, RawMetricDetail, RawMetricOutcome, RawNamedRef, RawPrompt,
    RawRunAttributes, RawTag, RawTestConfiguration, RawTestMetrics, RawTestOutput, RawTestResult,
    RawTestRun,
};
pub use prompt::{Prompt, PromptMap};
pub use test_result::{MetricOutcome, ResultCounts, TestResult};
pub use test_run::{NamedRef, RunAttributes, RunSummary, TestConfiguration, TestRun};
