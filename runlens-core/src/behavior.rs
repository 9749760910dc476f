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

use serde::{Deserialize, Serialize};

/// A metric that belongs to a behavior grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviorMetric {
    pub name: String,
    pub description: Option<String>,
}

/// A named grouping of metric names, used for filtering result sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Behavior {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metrics: Vec<BehaviorMetric>,
}

impl Behavior {
    /// Whether any of this behavior's metrics appears (by name) in the
    /// given metric keys. Presence only; pass/fail is not considered.
    pub fn mentions_any<'a>(&self, mut metric_names: impl Iterator<Item = &'a str>) -> bool {
        metric_names.any(|name| self.metrics.iter().any(|m| m.name == name))
    }
}
