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

//! Runlens Client
//!
//! Async client for the test-management REST API. Owns all I/O for the
//! workspace: batched result pagination, prompt and behavior fan-out, and
//! an explicit TTL cache for result pages. The analysis crates consume
//! only the canonical in-memory collections this crate produces.

pub mod cache;
pub mod client;

pub use cache::{CacheStats, PageCache, PageKey, ResultsPage};
pub use client::{ClientConfig, ClientError, Page, PageInfo, Result, RunlensClient};
