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

//! Runlens Query
//!
//! Pure, synchronous analysis over already-fetched test-run data:
//! run-to-run comparison, result filtering, per-test history and CSV
//! export. Nothing in this crate performs I/O.

pub mod comparison;
pub mod export;
pub mod filter;
pub mod history;

pub use comparison::{
    match_runs, ComparisonPair, ComparisonSummary, MatchKind, PairOutcome,
};
pub use export::export_results_csv;
pub use filter::{apply_filters, filter_pairs, FilterState, OutcomeFilter, StatusFilter};
pub use history::{build_history, HistoryRow};
