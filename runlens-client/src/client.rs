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

//! Async client for the test-management REST API.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{PageCache, PageKey, ResultsPage};
use runlens_core::{
    normalize_behavior, normalize_metric_rows, normalize_prompt, normalize_result, normalize_run,
    Behavior, Prompt, PromptMap, RawBehavior, RawMetricDetail, RawPrompt, RawTestResult,
    RawTestRun, TestResult, TestRun,
};

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Pagination envelope used by the list endpoints.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<PageInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "totalCount", default)]
    pub total_count: Option<u64>,
}

/// Metrics listings come back paginated or as a bare array depending on
/// the endpoint version; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetricsResponse {
    Paged(Page<RawMetricDetail>),
    Bare(Vec<RawMetricDetail>),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the management API
    pub base_url: String,
    /// Bearer token, when the deployment requires one
    pub api_key: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Page size for batched result fetches (default: 100)
    pub page_size: usize,
    /// TTL for cached result pages (default: 60 seconds)
    pub cache_ttl: Duration,
    /// Maximum cached pages (default: 1024)
    pub cache_capacity: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            page_size: 100,
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 1024,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// Safety cap on pagination depth; a run past this is truncated.
const MAX_RESULT_SKIP: usize = 10_000;

/// How many result rows to pull when building a test's history.
const HISTORY_FETCH_LIMIT: usize = 50;

/// Client for the test-management API.
pub struct RunlensClient {
    config: ClientConfig,
    http: HttpClient,
    pages: PageCache,
}

impl RunlensClient {
    pub fn new(config: ClientConfig) -> Self {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        let pages = PageCache::new(config.cache_capacity, config.cache_ttl);
        Self {
            config,
            http,
            pages,
        }
    }

    /// Page cache statistics (hits, misses, entries).
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.pages.stats()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut request = self.http.request(method, &url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<T> {
        let response = self.send(method, path, query).await?;
        Ok(response.json().await?)
    }

    /// Fetch one test run's metadata.
    pub async fn get_test_run(&self, run_id: &str) -> Result<TestRun> {
        let raw: RawTestRun = self
            .request(
                reqwest::Method::GET,
                &format!("/test_runs/{run_id}"),
                None,
            )
            .await?;
        Ok(normalize_run(raw))
    }

    async fn results_page(&self, filter: &str, skip: usize, limit: usize) -> Result<Page<RawTestResult>> {
        let query = [
            ("$filter", filter.to_string()),
            ("limit", limit.to_string()),
            ("skip", skip.to_string()),
            ("sort_by", "created_at".to_string()),
            ("sort_order", "desc".to_string()),
        ];
        self.request(reqwest::Method::GET, "/test_results", Some(&query))
            .await
    }

    /// Fetch every result for a run, batching through the paginated
    /// endpoint and reusing cached pages within the TTL.
    pub async fn fetch_all_results(&self, run_id: &str) -> Result<Vec<TestResult>> {
        let limit = self.config.page_size;
        let filter = format!("test_run_id eq '{run_id}'");
        let mut skip = 0usize;
        let mut out: Vec<TestResult> = Vec::new();

        loop {
            let key = PageKey::new(run_id, skip, limit);
            let page = match self.pages.get(&key).await {
                Some(page) => page,
                None => {
                    let raw = self.results_page(&filter, skip, limit).await?;
                    let page = Arc::new(ResultsPage {
                        total_count: raw.pagination.as_ref().and_then(|p| p.total_count),
                        results: raw.data.into_iter().map(normalize_result).collect(),
                    });
                    self.pages.insert(key, page.clone()).await;
                    page
                }
            };

            let fetched = page.results.len();
            out.extend(page.results.iter().cloned());

            if let Some(total) = page.total_count {
                if out.len() as u64 >= total {
                    break;
                }
            } else if fetched < limit {
                break;
            }

            skip += limit;
            if skip > MAX_RESULT_SKIP {
                tracing::warn!(run_id, skip, "result pagination hit the depth cap, truncating");
                break;
            }
        }

        Ok(out)
    }

    /// Fetch one prompt.
    pub async fn get_prompt(&self, prompt_id: &str) -> Result<Prompt> {
        let raw: RawPrompt = self
            .request(reqwest::Method::GET, &format!("/prompts/{prompt_id}"), None)
            .await?;
        Ok(normalize_prompt(raw))
    }

    /// Resolve the prompt map for a result set. Prompt ids are
    /// deduplicated; individual fetch failures degrade to absence.
    pub async fn fetch_prompts(&self, results: &[TestResult]) -> PromptMap {
        let ids: HashSet<&str> = results
            .iter()
            .filter_map(|r| r.prompt_id.as_deref())
            .collect();

        let mut prompts = PromptMap::new();
        for id in ids {
            match self.get_prompt(id).await {
                Ok(prompt) => {
                    prompts.insert(id.to_string(), prompt);
                }
                Err(err) => {
                    tracing::warn!(prompt_id = id, %err, "skipping prompt that failed to load");
                }
            }
        }
        prompts
    }

    /// Fetch a run's behaviors with their metric lists. A behavior whose
    /// metrics listing fails is kept with an empty metric list.
    pub async fn fetch_behaviors(&self, run_id: &str) -> Result<Vec<Behavior>> {
        let raw: Vec<RawBehavior> = self
            .request(
                reqwest::Method::GET,
                &format!("/test_runs/{run_id}/behaviors"),
                None,
            )
            .await?;

        let mut behaviors: Vec<Behavior> =
            raw.into_iter().filter_map(normalize_behavior).collect();

        for behavior in &mut behaviors {
            let response: Result<MetricsResponse> = self
                .request(
                    reqwest::Method::GET,
                    &format!("/behaviors/{}/metrics", behavior.id),
                    None,
                )
                .await;
            match response {
                Ok(MetricsResponse::Paged(page)) => {
                    behavior.metrics = normalize_metric_rows(page.data);
                }
                Ok(MetricsResponse::Bare(rows)) => {
                    behavior.metrics = normalize_metric_rows(rows);
                }
                Err(err) => {
                    tracing::warn!(
                        behavior_id = %behavior.id,
                        %err,
                        "metrics listing failed, keeping behavior without metrics"
                    );
                }
            }
        }

        Ok(behaviors)
    }

    /// Recent runs, newest first, for baseline selection. The current run
    /// and malformed rows are excluded.
    pub async fn list_test_runs(
        &self,
        exclude: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TestRun>> {
        let query = [
            ("limit", limit.to_string()),
            ("skip", "0".to_string()),
            ("sort_by", "created_at".to_string()),
            ("sort_order", "desc".to_string()),
        ];
        let page: Page<RawTestRun> = self
            .request(reqwest::Method::GET, "/test_runs", Some(&query))
            .await?;

        Ok(page
            .data
            .into_iter()
            .filter(|r| !r.id.is_empty() && Some(r.id.as_str()) != exclude)
            .map(normalize_run)
            .collect())
    }

    /// Last results recorded for one test, across runs.
    pub async fn fetch_history(&self, test_id: &str) -> Result<Vec<TestResult>> {
        let page = self
            .results_page(
                &format!("test_id eq '{test_id}'"),
                0,
                HISTORY_FETCH_LIMIT,
            )
            .await?;
        Ok(page.data.into_iter().map(normalize_result).collect())
    }

    /// Resolve run names for the runs referenced by a result set.
    /// Failures degrade to the run id.
    pub async fn resolve_run_names(&self, results: &[TestResult]) -> HashMap<String, String> {
        let ids: HashSet<&str> = results
            .iter()
            .filter_map(|r| r.test_run_id.as_deref())
            .collect();

        let mut names = HashMap::new();
        for id in ids {
            match self.get_test_run(id).await {
                Ok(run) => {
                    names.insert(id.to_string(), run.display_name().to_string());
                }
                Err(err) => {
                    tracing::warn!(run_id = id, %err, "run name lookup failed");
                }
            }
        }
        names
    }

    /// Download the server-rendered CSV for a run. The bytes are opaque.
    pub async fn download_results(&self, run_id: &str) -> Result<Vec<u8>> {
        let response = self
            .send(
                reqwest::Method::GET,
                &format!("/test_runs/{run_id}/download"),
                None,
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(url: &str) -> ClientConfig {
        ClientConfig::new(url).with_page_size(2)
    }

    #[tokio::test]
    async fn fetch_all_results_pages_until_total_count() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/test_results")
            .match_query(Matcher::UrlEncoded("skip".into(), "0".into()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": [
                        {"id": "r1", "test_output": {"output": "a"}},
                        {"id": "r2", "test_output": {"output": "b"}}
                    ],
                    "pagination": {"totalCount": 3}
                }"#,
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/test_results")
            .match_query(Matcher::UrlEncoded("skip".into(), "2".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"id": "r3"}], "pagination": {"totalCount": 3}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        let results = client.fetch_all_results("run-1").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "r1");
        assert_eq!(results[0].output_text, "a");
        assert_eq!(results[2].id, "r3");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn second_fetch_within_ttl_hits_the_page_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/test_results")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"id": "r1"}], "pagination": {"totalCount": 1}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        client.fetch_all_results("run-1").await.unwrap();
        client.fetch_all_results("run-1").await.unwrap();

        mock.assert_async().await;
        let stats = client.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn short_page_without_total_count_stops_pagination() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/test_results")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"id": "r1"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        let results = client.fetch_all_results("run-1").await.unwrap();
        assert_eq!(results.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/test_runs/run-1")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        match client.get_test_run("run-1").await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn behaviors_pick_up_metrics_from_paged_and_bare_responses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/test_runs/run-1/behaviors")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": "b1", "name": "Robustness"},
                    {"id": "b2", "name": "Compliance"},
                    {"name": "missing id"}
                ]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/behaviors/b1/metrics")
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"name": "consistency"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/behaviors/b2/metrics")
            .with_header("content-type", "application/json")
            .with_body(r#"[{"name": "pii_leak"}, {"description": "nameless"}]"#)
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        let behaviors = client.fetch_behaviors("run-1").await.unwrap();

        assert_eq!(behaviors.len(), 2);
        assert_eq!(behaviors[0].metrics[0].name, "consistency");
        assert_eq!(behaviors[1].metrics.len(), 1);
        assert_eq!(behaviors[1].metrics[0].name, "pii_leak");
    }

    #[tokio::test]
    async fn list_test_runs_excludes_current_and_malformed_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/test_runs")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": [
                    {"id": "run-1", "name": "Current"},
                    {"id": "run-2", "name": "Older"},
                    {"name": "no id"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        let runs = client.list_test_runs(Some("run-1"), 50).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "run-2");
    }

    #[tokio::test]
    async fn failed_prompt_fetches_degrade_to_absence() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/prompts/p1")
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": "say hi"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/prompts/p2")
            .with_status(404)
            .create_async()
            .await;

        let client = RunlensClient::new(config(&server.url()));
        let results: Vec<TestResult> = ["p1", "p2"]
            .iter()
            .enumerate()
            .map(|(i, pid)| TestResult {
                id: format!("r{i}"),
                test_id: None,
                test_run_id: None,
                prompt_id: Some(pid.to_string()),
                created_at: None,
                output_text: String::new(),
                metrics: Default::default(),
                counts: Default::default(),
                tags: vec![],
            })
            .collect();

        let prompts = client.fetch_prompts(&results).await;
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts["p1"].content, "say hi");
    }
}
