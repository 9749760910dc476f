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

//! CSV export of result sets.

use runlens_core::{PromptMap, TestResult};

/// Render results as CSV, resolving prompt text through the prompt map.
pub fn export_results_csv(results: &[TestResult], prompts: &PromptMap) -> String {
    let mut csv = String::new();
    csv.push_str("id,test_id,prompt,output,passed,passed_metrics,total_metrics,tags\n");

    for result in results {
        let prompt = result
            .prompt_id
            .as_ref()
            .and_then(|pid| prompts.get(pid))
            .map(|p| p.content.as_str())
            .unwrap_or("");
        let (passed_metrics, total_metrics) = result.metric_counts();
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            escape_csv(&result.id),
            escape_csv(result.test_id.as_deref().unwrap_or("")),
            escape_csv(prompt),
            escape_csv(&result.output_text),
            result.is_passed(),
            passed_metrics,
            total_metrics,
            escape_csv(&result.tags.join(";")),
        ));
    }

    csv
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runlens_core::{MetricOutcome, Prompt, ResultCounts};
    use std::collections::HashMap;

    fn result(id: &str, output: &str) -> TestResult {
        TestResult {
            id: id.into(),
            test_id: Some("t1".into()),
            test_run_id: None,
            prompt_id: Some("p1".into()),
            created_at: None,
            output_text: output.into(),
            metrics: [(
                "m".to_string(),
                MetricOutcome {
                    is_successful: Some(true),
                    ..Default::default()
                },
            )]
            .into(),
            counts: ResultCounts::default(),
            tags: vec!["smoke".into(), "nightly".into()],
        }
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        let mut prompts: PromptMap = HashMap::new();
        prompts.insert(
            "p1".into(),
            Prompt {
                content: "say hi".into(),
                name: None,
            },
        );
        let csv = export_results_csv(&[result("r1", "hi")], &prompts);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,test_id,prompt,output,passed,passed_metrics,total_metrics,tags"
        );
        assert_eq!(lines.next().unwrap(), "r1,t1,say hi,hi,true,1,1,smoke;nightly");
    }

    #[test]
    fn commas_and_quotes_are_escaped() {
        let csv = export_results_csv(&[result("r1", "a, \"b\"")], &PromptMap::new());
        assert!(csv.contains("\"a, \"\"b\"\"\""));
    }

    #[test]
    fn unresolved_prompt_renders_empty() {
        let csv = export_results_csv(&[result("r1", "out")], &PromptMap::new());
        assert!(csv.lines().nth(1).unwrap().starts_with("r1,t1,,out,"));
    }
}
