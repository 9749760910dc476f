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

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runlens_client::{ClientConfig, RunlensClient};
use runlens_core::{PromptMap, RunSummary, TestResult};
use runlens_query::{
    apply_filters, build_history, export_results_csv, filter_pairs, match_runs,
    ComparisonSummary, FilterState, MatchKind, OutcomeFilter, StatusFilter,
};

const HISTORY_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "runlens", version, about = "Inspect, compare and export test runs")]
struct Cli {
    /// Management API base URL
    #[arg(long, global = true, env = "RUNLENS_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token for the API
    #[arg(long, global = true, env = "RUNLENS_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a run's results, optionally filtered
    Summary {
        run_id: String,
        /// Case-insensitive search over prompt and output text
        #[arg(long)]
        search: Option<String>,
        /// all, passed or failed
        #[arg(long, default_value = "all")]
        status: String,
        /// Behavior id to filter on; repeatable
        #[arg(long = "behavior")]
        behaviors: Vec<String>,
    },

    /// Diff a run against a baseline run
    Compare {
        run_id: String,
        /// Baseline run to compare against
        #[arg(long)]
        baseline: String,
        /// all, improved, regressed or unchanged
        #[arg(long, default_value = "all")]
        outcome: String,
        #[arg(long)]
        search: Option<String>,
    },

    /// List recent runs (baseline candidates)
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show one test's outcome across runs
    History { test_id: String },

    /// Export a run's results as CSV
    Export {
        run_id: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Download the server-rendered CSV instead of building one
        #[arg(long)]
        remote: bool,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long = "behavior")]
        behaviors: Vec<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runlens=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Short prompt excerpt for list output, falling back to the result id.
fn prompt_snippet(result: &TestResult, prompts: &PromptMap, max: usize) -> String {
    let content = result
        .prompt_id
        .as_ref()
        .and_then(|pid| prompts.get(pid))
        .map(|p| p.content.as_str())
        .unwrap_or("");
    if content.is_empty() {
        let short: String = result.id.chars().take(8).collect();
        return format!("Test #{short}");
    }
    if content.chars().count() <= max {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}

fn pass_label(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Total: {}  Passed: {}  Failed: {}  Pass rate: {:.1}%",
        summary.total, summary.passed, summary.failed, summary.pass_rate
    );
}

async fn cmd_summary(
    client: &RunlensClient,
    run_id: &str,
    state: FilterState,
) -> Result<()> {
    let run = client.get_test_run(run_id).await?;
    let results = client.fetch_all_results(run_id).await?;
    let behaviors = client.fetch_behaviors(run_id).await?;
    let prompts = client.fetch_prompts(&results).await;

    println!("Run:         {}", run.display_name());
    if let Some(env) = &run.attributes.environment {
        println!("Environment: {env}");
    }
    if let Some(started) = run.started_or_created() {
        println!("Started:     {}", started.to_rfc3339());
    }
    if let Some(name) = run
        .test_configuration
        .test_set
        .as_ref()
        .and_then(|s| s.name.as_deref())
    {
        println!("Test set:    {name}");
    }
    if let Some(name) = run
        .test_configuration
        .endpoint
        .as_ref()
        .and_then(|e| e.name.as_deref())
    {
        println!("Endpoint:    {name}");
    }
    println!();
    print_summary(&RunSummary::from_results(&results));

    let filters_active = state != FilterState::default();
    let filtered = apply_filters(&results, &state, &prompts, &behaviors);
    if filters_active {
        println!("Matching filters: {} of {}", filtered.len(), results.len());
        println!();
        for result in &filtered {
            println!(
                "{}  {}  {}",
                pass_label(result.is_passed()),
                result.id,
                prompt_snippet(result, &prompts, 80)
            );
        }
    }

    Ok(())
}

async fn cmd_compare(
    client: &RunlensClient,
    run_id: &str,
    baseline_id: &str,
    outcome: OutcomeFilter,
    search: &str,
) -> Result<()> {
    let run = client.get_test_run(run_id).await?;
    let baseline_run = client.get_test_run(baseline_id).await?;
    let current = client.fetch_all_results(run_id).await?;
    let baseline = client.fetch_all_results(baseline_id).await?;
    let prompts = client.fetch_prompts(&current).await;

    let pairs = match_runs(&current, Some(&baseline));
    let summary = ComparisonSummary::new(&pairs, &current, &baseline);

    println!(
        "Current:  {}  ({:.1}% of {} passing)",
        run.display_name(),
        summary.current.pass_rate,
        summary.current.total
    );
    println!(
        "Baseline: {}  ({:.1}% of {} passing)",
        baseline_run.display_name(),
        summary.baseline.pass_rate,
        summary.baseline.total
    );
    println!(
        "Delta:    {:+.1} points  ({} improved, {} regressed, {} unchanged)",
        summary.current.pass_rate - summary.baseline.pass_rate,
        summary.improved,
        summary.regressed,
        summary.unchanged
    );
    println!();

    for pair in filter_pairs(&pairs, outcome, search, &prompts) {
        let positional = match pair.matched_by {
            Some(MatchKind::Position) => "  [positional match]",
            _ => "",
        };
        println!(
            "{:9}  {}  {}{}",
            pair.outcome().as_str(),
            pair.id,
            prompt_snippet(&pair.current, &prompts, 80),
            positional
        );
    }

    Ok(())
}

async fn cmd_runs(client: &RunlensClient, limit: usize) -> Result<()> {
    let runs = client.list_test_runs(None, limit).await?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(());
    }
    for run in runs {
        let when = run
            .started_or_created()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", run.id, when, run.display_name());
    }
    Ok(())
}

async fn cmd_history(client: &RunlensClient, test_id: &str) -> Result<()> {
    let results = client.fetch_history(test_id).await?;
    let run_names = client.resolve_run_names(&results).await;
    let rows = build_history(&results, &run_names, HISTORY_LIMIT);

    if rows.is_empty() {
        println!("No history for test {test_id}.");
        return Ok(());
    }
    for row in rows {
        let when = row
            .executed_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {}/{} metrics  {}  {}",
            pass_label(row.passed),
            when,
            row.passed_metrics,
            row.total_metrics,
            row.test_run_id,
            row.test_run_name
        );
    }
    Ok(())
}

async fn cmd_export(
    client: &RunlensClient,
    run_id: &str,
    output: Option<PathBuf>,
    remote: bool,
    state: FilterState,
) -> Result<()> {
    let bytes = if remote {
        client.download_results(run_id).await?
    } else {
        let results = client.fetch_all_results(run_id).await?;
        let behaviors = client.fetch_behaviors(run_id).await?;
        let prompts = client.fetch_prompts(&results).await;
        let filtered = apply_filters(&results, &state, &prompts, &behaviors);
        export_results_csv(&filtered, &prompts).into_bytes()
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes)?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ClientConfig::new(cli.url);
    if let Some(key) = cli.api_key {
        config = config.with_api_key(key);
    }
    let client = RunlensClient::new(config);

    match cli.command {
        Command::Summary {
            run_id,
            search,
            status,
            behaviors,
        } => {
            let state = FilterState {
                search_query: search.unwrap_or_default(),
                status: status.parse::<StatusFilter>().map_err(anyhow::Error::msg)?,
                selected_behaviors: behaviors,
            };
            cmd_summary(&client, &run_id, state).await
        }
        Command::Compare {
            run_id,
            baseline,
            outcome,
            search,
        } => {
            let outcome = outcome
                .parse::<OutcomeFilter>()
                .map_err(anyhow::Error::msg)?;
            cmd_compare(
                &client,
                &run_id,
                &baseline,
                outcome,
                search.as_deref().unwrap_or(""),
            )
            .await
        }
        Command::Runs { limit } => cmd_runs(&client, limit).await,
        Command::History { test_id } => cmd_history(&client, &test_id).await,
        Command::Export {
            run_id,
            output,
            remote,
            search,
            status,
            behaviors,
        } => {
            let state = FilterState {
                search_query: search.unwrap_or_default(),
                status: status.parse::<StatusFilter>().map_err(anyhow::Error::msg)?,
                selected_behaviors: behaviors,
            };
            cmd_export(&client, &run_id, output, remote, state).await
        }
    }
}
