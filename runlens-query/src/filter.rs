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

//! Result-set filtering.
//!
//! Three sequential narrowing passes over a result collection: free-text
//! search, pass/fail status, behavior membership. Each pass is a pure
//! predicate; order does not affect the outcome.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::comparison::{ComparisonPair, PairOutcome};
use runlens_core::{Behavior, PromptMap, TestResult};

/// Pass/fail narrowing for the result list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Passed,
    Failed,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "passed" => Ok(StatusFilter::Passed),
            "failed" => Ok(StatusFilter::Failed),
            other => Err(format!("unknown status filter: {other}")),
        }
    }
}

/// Ephemeral filter state for a result list. Not persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterState {
    pub search_query: String,
    pub status: StatusFilter,
    pub selected_behaviors: Vec<String>,
}

fn matches_search(result: &TestResult, query: &str, prompts: &PromptMap) -> bool {
    let prompt_text = result
        .prompt_id
        .as_ref()
        .and_then(|pid| prompts.get(pid))
        .map(|p| p.content.to_lowercase())
        .unwrap_or_default();
    prompt_text.contains(query) || result.output_text.to_lowercase().contains(query)
}

/// Apply search, status and behavior filters, in that order.
pub fn apply_filters(
    results: &[TestResult],
    state: &FilterState,
    prompts: &PromptMap,
    behaviors: &[Behavior],
) -> Vec<TestResult> {
    let mut list: Vec<TestResult> = results.to_vec();

    let query = state.search_query.trim().to_lowercase();
    if !query.is_empty() {
        list.retain(|r| matches_search(r, &query, prompts));
    }

    match state.status {
        StatusFilter::All => {}
        StatusFilter::Passed => list.retain(|r| r.is_passed()),
        StatusFilter::Failed => list.retain(|r| !r.is_passed()),
    }

    if !state.selected_behaviors.is_empty() {
        list.retain(|r| {
            state.selected_behaviors.iter().any(|id| {
                behaviors
                    .iter()
                    .find(|b| &b.id == id)
                    .is_some_and(|b| b.mentions_any(r.metrics.keys().map(String::as_str)))
            })
        });
    }

    list
}

/// Outcome narrowing for the comparison view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeFilter {
    #[default]
    All,
    Improved,
    Regressed,
    Unchanged,
}

impl FromStr for OutcomeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(OutcomeFilter::All),
            "improved" => Ok(OutcomeFilter::Improved),
            "regressed" => Ok(OutcomeFilter::Regressed),
            "unchanged" => Ok(OutcomeFilter::Unchanged),
            other => Err(format!("unknown outcome filter: {other}")),
        }
    }
}

impl OutcomeFilter {
    fn keeps(&self, outcome: PairOutcome) -> bool {
        match self {
            OutcomeFilter::All => true,
            OutcomeFilter::Improved => outcome == PairOutcome::Improved,
            OutcomeFilter::Regressed => outcome == PairOutcome::Regressed,
            OutcomeFilter::Unchanged => outcome == PairOutcome::Unchanged,
        }
    }
}

/// Filter comparison pairs by outcome, then by the same case-insensitive
/// search over the current side's prompt and output.
pub fn filter_pairs(
    pairs: &[ComparisonPair],
    filter: OutcomeFilter,
    search_query: &str,
    prompts: &PromptMap,
) -> Vec<ComparisonPair> {
    let query = search_query.trim().to_lowercase();
    pairs
        .iter()
        .filter(|p| filter.keeps(p.outcome()))
        .filter(|p| query.is_empty() || matches_search(&p.current, &query, prompts))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::match_runs;
    use runlens_core::{BehaviorMetric, MetricOutcome, Prompt, ResultCounts};
    use std::collections::HashMap;

    fn result(id: &str, prompt_id: Option<&str>, output: &str, metrics: &[(&str, bool)]) -> TestResult {
        TestResult {
            id: id.into(),
            test_id: None,
            test_run_id: None,
            prompt_id: prompt_id.map(Into::into),
            created_at: None,
            output_text: output.into(),
            metrics: metrics
                .iter()
                .map(|(name, ok)| {
                    (
                        name.to_string(),
                        MetricOutcome {
                            is_successful: Some(*ok),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            counts: ResultCounts::default(),
            tags: vec![],
        }
    }

    fn prompts() -> PromptMap {
        let mut map = HashMap::new();
        map.insert(
            "p1".to_string(),
            Prompt {
                content: "Summarize the quarterly report".into(),
                name: None,
            },
        );
        map
    }

    fn behaviors() -> Vec<Behavior> {
        vec![Behavior {
            id: "beh-1".into(),
            name: "Reliability".into(),
            description: None,
            metrics: vec![BehaviorMetric {
                name: "consistency".into(),
                description: None,
            }],
        }]
    }

    #[test]
    fn search_is_case_insensitive_over_output() {
        let results = vec![result("r1", None, "says hello world", &[("m", true)])];
        let state = FilterState {
            search_query: "HELLO".into(),
            ..Default::default()
        };
        let out = apply_filters(&results, &state, &PromptMap::new(), &[]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn search_matches_prompt_content() {
        let results = vec![result("r1", Some("p1"), "unrelated", &[("m", true)])];
        let state = FilterState {
            search_query: "quarterly".into(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&results, &state, &prompts(), &[]).len(), 1);
        // Without a prompt map entry the same query finds nothing.
        assert!(apply_filters(&results, &state, &PromptMap::new(), &[]).is_empty());
    }

    #[test]
    fn whitespace_only_search_is_skipped() {
        let results = vec![result("r1", None, "anything", &[("m", true)])];
        let state = FilterState {
            search_query: "   ".into(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&results, &state, &PromptMap::new(), &[]).len(), 1);
    }

    #[test]
    fn status_passed_on_all_failing_set_yields_empty() {
        let results = vec![
            result("r1", None, "", &[("m", false)]),
            result("r2", None, "", &[]),
        ];
        let state = FilterState {
            status: StatusFilter::Passed,
            ..Default::default()
        };
        assert!(apply_filters(&results, &state, &PromptMap::new(), &[]).is_empty());
    }

    #[test]
    fn behavior_filter_is_presence_not_pass() {
        // consistency failed, but the metric is present so the behavior matches
        let results = vec![
            result("r1", None, "", &[("consistency", false)]),
            result("r2", None, "", &[("other", true)]),
        ];
        let state = FilterState {
            selected_behaviors: vec!["beh-1".into()],
            ..Default::default()
        };
        let out = apply_filters(&results, &state, &PromptMap::new(), &behaviors());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "r1");
    }

    #[test]
    fn unknown_behavior_id_matches_nothing() {
        let results = vec![result("r1", None, "", &[("consistency", true)])];
        let state = FilterState {
            selected_behaviors: vec!["beh-missing".into()],
            ..Default::default()
        };
        assert!(apply_filters(&results, &state, &PromptMap::new(), &behaviors()).is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let results = vec![
            result("r1", Some("p1"), "hello", &[("consistency", true)]),
            result("r2", None, "other", &[("consistency", false)]),
        ];
        let state = FilterState {
            search_query: "".into(),
            status: StatusFilter::Failed,
            selected_behaviors: vec!["beh-1".into()],
        };
        let once = apply_filters(&results, &state, &prompts(), &behaviors());
        let twice = apply_filters(&once, &state, &prompts(), &behaviors());
        assert_eq!(once, twice);
    }

    #[test]
    fn pair_filter_narrows_by_outcome_and_search() {
        let current = vec![
            result("c1", Some("p1"), "now passing", &[("m", true)]),
            result("c2", None, "still failing", &[("m", false)]),
        ];
        let baseline = vec![
            result("b1", Some("p1"), "", &[("m", false)]),
            result("b2", None, "", &[("m", false)]),
        ];
        let pairs = match_runs(&current, Some(&baseline));

        let improved = filter_pairs(&pairs, OutcomeFilter::Improved, "", &prompts());
        assert_eq!(improved.len(), 1);
        assert_eq!(improved[0].id, "c1");

        let searched = filter_pairs(&pairs, OutcomeFilter::All, "QUARTERLY", &prompts());
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id, "c1");

        assert!(filter_pairs(&pairs, OutcomeFilter::Regressed, "", &prompts()).is_empty());
    }
}
