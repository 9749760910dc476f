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

//! Run-to-run comparison.
//!
//! Pairs the current run's results with a baseline run's results by prompt
//! identity, falling back to array position, and classifies each pair as
//! improved, regressed or unchanged.

use serde::{Deserialize, Serialize};

use runlens_core::{RunSummary, TestResult};

/// How a pair was matched. Positional matches are a best-effort heuristic
/// and can pair unrelated tests when prompt identity is missing; surfaces
/// that display pairs should flag them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prompt,
    Position,
}

/// Classification of a pair for filtering and display.
///
/// `Unchanged` covers both "same outcome on both sides" and "no baseline
/// data"; use [`ComparisonPair::baseline_passed`] to tell them apart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PairOutcome {
    Improved,
    Regressed,
    Unchanged,
}

impl PairOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairOutcome::Improved => "improved",
            PairOutcome::Regressed => "regressed",
            PairOutcome::Unchanged => "unchanged",
        }
    }
}

/// One current-run result paired with its baseline counterpart, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonPair {
    /// Id of the current-run result
    pub id: String,
    pub baseline: Option<TestResult>,
    pub current: TestResult,
    pub matched_by: Option<MatchKind>,
}

impl ComparisonPair {
    /// Pass state of the baseline side; `None` means no baseline data.
    pub fn baseline_passed(&self) -> Option<bool> {
        self.baseline.as_ref().map(TestResult::is_passed)
    }

    pub fn outcome(&self) -> PairOutcome {
        let current_passed = self.current.is_passed();
        match self.baseline_passed() {
            Some(false) if current_passed => PairOutcome::Improved,
            Some(true) if !current_passed => PairOutcome::Regressed,
            _ => PairOutcome::Unchanged,
        }
    }
}

/// Pair each current result with a baseline result.
///
/// Prompt identity wins when both sides carry the same `prompt_id`;
/// otherwise the baseline entry at the same index is used. A baseline of
/// `None` (not yet loaded) yields no pairs.
pub fn match_runs(
    current: &[TestResult],
    baseline: Option<&[TestResult]>,
) -> Vec<ComparisonPair> {
    let Some(baseline) = baseline else {
        return Vec::new();
    };

    current
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let by_prompt = c.prompt_id.as_deref().and_then(|pid| {
                baseline
                    .iter()
                    .find(|b| b.prompt_id.as_deref() == Some(pid))
            });
            let (matched, matched_by) = match by_prompt {
                Some(b) => (Some(b), Some(MatchKind::Prompt)),
                None => match baseline.get(idx) {
                    Some(b) => (Some(b), Some(MatchKind::Position)),
                    None => (None, None),
                },
            };
            ComparisonPair {
                id: c.id.clone(),
                baseline: matched.cloned(),
                current: c.clone(),
                matched_by,
            }
        })
        .collect()
}

/// Aggregate view of a comparison between two runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonSummary {
    pub pairs: usize,
    pub improved: usize,
    pub regressed: usize,
    pub unchanged: usize,
    pub current: RunSummary,
    pub baseline: RunSummary,
}

impl ComparisonSummary {
    /// Summaries are computed over the full result sets, not just the
    /// matched pairs, so pass rates match what each run reports alone.
    pub fn new(
        pairs: &[ComparisonPair],
        current: &[TestResult],
        baseline: &[TestResult],
    ) -> Self {
        let mut improved = 0;
        let mut regressed = 0;
        let mut unchanged = 0;
        for pair in pairs {
            match pair.outcome() {
                PairOutcome::Improved => improved += 1,
                PairOutcome::Regressed => regressed += 1,
                PairOutcome::Unchanged => unchanged += 1,
            }
        }
        Self {
            pairs: pairs.len(),
            improved,
            regressed,
            unchanged,
            current: RunSummary::from_results(current),
            baseline: RunSummary::from_results(baseline),
        }
    }
}
