use crate::core::aggregator::{ResultAggregator, Summary};
use crate::core::analysis::{category_emoji, AnalysisResult, Issue, Severity, CATEGORY_PRIORITY};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Markdown,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default = "default_true")]
    pub include_metrics: bool,
    #[serde(default = "default_true")]
    pub include_suggestions: bool,
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_suggestions: true,
            include_recommendations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    model: &'a str,
    results: &'a [AnalysisResult],
    summary: Option<Summary>,
}

pub struct ReportRenderer {
    options: ReportOptions,
    model: String,
}

impl ReportRenderer {
    pub fn new(options: ReportOptions, model: impl Into<String>) -> Self {
        Self {
            options,
            model: model.into(),
        }
    }

    pub fn render(&self, results: &[AnalysisResult], format: ReportFormat) -> Result<String> {
        self.render_at(results, format, Utc::now())
    }

    pub fn render_at(
        &self,
        results: &[AnalysisResult],
        format: ReportFormat,
        generated_at: DateTime<Utc>,
    ) -> Result<String> {
        match format {
            ReportFormat::Json => {
                let report = JsonReport {
                    generated_at,
                    model: &self.model,
                    results,
                    summary: ResultAggregator::summarize(results),
                };
                serde_json::to_string_pretty(&report).context("Failed to serialize report")
            }
            ReportFormat::Markdown => Ok(self.render_markdown(results, generated_at)),
            ReportFormat::Html => Ok(self.render_html(results, generated_at)),
        }
    }

    fn render_markdown(&self, results: &[AnalysisResult], generated_at: DateTime<Utc>) -> String {
        let mut output = String::new();
        output.push_str("# AI Code Review Report\n\n");
        output.push_str(&format!(
            "**Report Generated:** {}\n",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!("**AI Model:** {}\n\n", self.model));

        let Some(summary) = ResultAggregator::summarize(results) else {
            output.push_str("No files were analyzed.\n");
            return output;
        };

        output.push_str("## Executive Summary\n\n");
        output.push_str(&format!(
            "**Files Analyzed:** {}\n**Overall Assessment:** {}/100\n**Total Issues Identified:** {}\n",
            summary.count, summary.avg_score, summary.total_issues
        ));
        for severity in Severity::ALL {
            output.push_str(&format!(
                "**{} Issues:** {}\n",
                capitalize(severity.as_str()),
                summary.severity_count(severity)
            ));
        }
        output.push('\n');
        output.push_str(assessment(&summary));
        output.push_str("\n\n## Detailed Analysis\n\n");

        for (index, result) in results.iter().enumerate() {
            output.push_str(&format!("### File {}: {}\n\n", index + 1, result.subject));
            output.push_str(&format!(
                "**Quality Score:** {}/100\n**Issues Count:** {}\n**Analysis Timestamp:** {}\n\n",
                result.score,
                result.issues.len(),
                result.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));

            if result.issues.is_empty() {
                output.push_str("**Status:** No issues identified during analysis.\n\n");
                continue;
            }

            for (category, issues) in group_by_category(&result.issues) {
                output.push_str(&format!(
                    "#### {} {} Issues ({} found)\n\n",
                    category_emoji(category),
                    capitalize(category),
                    issues.len()
                ));
                for (number, issue) in issues.iter().enumerate() {
                    output.push_str(&format!(
                        "**Issue {}.{}:** {}\n\n",
                        index + 1,
                        number + 1,
                        issue.message
                    ));
                    output.push_str("| Property | Value |\n|----------|-------|\n");
                    output.push_str(&format!(
                        "| **Severity** | {} |\n",
                        issue.severity.to_uppercase()
                    ));
                    if issue.line > 0 {
                        output.push_str(&format!("| **Line Number** | {} |\n", issue.line));
                    }
                    output.push_str(&format!(
                        "| **Priority** | {} |\n\n",
                        priority(issue.severity_level())
                    ));
                    if self.options.include_suggestions && !issue.suggestion.is_empty() {
                        output.push_str(&format!(
                            "**Recommended Solution:**\n> {}\n\n",
                            issue.suggestion
                        ));
                    }
                    if !issue.reasoning.is_empty() {
                        output.push_str(&format!(
                            "**Technical Analysis:**\n> {}\n\n",
                            issue.reasoning
                        ));
                    }
                }
            }

            if self.options.include_recommendations {
                output.push_str("**File-Level Recommendations:**\n");
                for line in file_recommendations(result.score) {
                    output.push_str(&format!("- {}\n", line));
                }
                output.push('\n');
            }
        }

        if self.options.include_metrics {
            let debt = summary.technical_debt();
            output.push_str("## Technical Debt Assessment\n\n");
            output.push_str(&format!(
                "**Estimated Technical Debt:** {} points\n**Debt Classification:** {}\n\n",
                debt,
                debt_classification(debt)
            ));
            output.push_str("| Metric | Value | Target | Status |\n|--------|-------|--------|--------|\n");
            output.push_str(&format!(
                "| Code Quality Score | {}/100 | ≥80 | {} |\n",
                summary.avg_score,
                status(summary.avg_score >= 80)
            ));
            let critical = summary.severity_count(Severity::Critical);
            let high = summary.severity_count(Severity::High);
            output.push_str(&format!(
                "| Critical Issues | {} | 0 | {} |\n",
                critical,
                status(critical == 0)
            ));
            output.push_str(&format!(
                "| High Priority Issues | {} | ≤2 | {} |\n\n",
                high,
                status(high <= 2)
            ));
        }

        output.push_str("---\n\n*This report was generated automatically using AI-powered code analysis.*\n");
        output
    }

    fn render_html(&self, results: &[AnalysisResult], generated_at: DateTime<Utc>) -> String {
        let mut output = String::from(HTML_HEAD);
        output.push_str(&format!(
            "<h1>AI Code Review Report</h1>\n<p class=\"meta\">Generated {} · Model {}</p>\n",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            escape_html(&self.model)
        ));

        match ResultAggregator::summarize(results) {
            Some(summary) => {
                output.push_str("<section class=\"summary\">\n");
                output.push_str(&format!(
                    "<div class=\"card\"><span>{}</span>Files</div>\n<div class=\"card\"><span>{}/100</span>Average score</div>\n<div class=\"card\"><span>{}</span>Issues</div>\n",
                    summary.count, summary.avg_score, summary.total_issues
                ));
                if self.options.include_metrics {
                    output.push_str(&format!(
                        "<div class=\"card\"><span>{}</span>Debt points</div>\n",
                        summary.technical_debt()
                    ));
                }
                output.push_str("</section>\n");
                output.push_str(&format!("<p class=\"assessment\">{}</p>\n", escape_html(assessment(&summary))));
            }
            None => output.push_str("<p>No files were analyzed.</p>\n"),
        }

        for result in results {
            output.push_str(&format!(
                "<section class=\"file\">\n<h2>{}</h2>\n<p>Score: <strong>{}/100</strong> · Issues: {}</p>\n",
                escape_html(&result.subject),
                result.score,
                result.issues.len()
            ));
            for (category, issues) in group_by_category(&result.issues) {
                output.push_str(&format!(
                    "<h3>{} {} ({})</h3>\n<ul>\n",
                    category_emoji(category),
                    escape_html(&capitalize(category)),
                    issues.len()
                ));
                for issue in issues {
                    output.push_str(&format!(
                        "<li class=\"sev-{}\"><strong>[{}]</strong> {}",
                        escape_html(&issue.severity),
                        escape_html(&issue.severity.to_uppercase()),
                        escape_html(&issue.message)
                    ));
                    if issue.line > 0 {
                        output.push_str(&format!(" <em>(line {})</em>", issue.line));
                    }
                    if self.options.include_suggestions && !issue.suggestion.is_empty() {
                        output.push_str(&format!(
                            "<div class=\"suggestion\">💡 {}</div>",
                            escape_html(&issue.suggestion)
                        ));
                    }
                    if !issue.reasoning.is_empty() {
                        output.push_str(&format!(
                            "<div class=\"reasoning\">🧠 {}</div>",
                            escape_html(&issue.reasoning)
                        ));
                    }
                    output.push_str("</li>\n");
                }
                output.push_str("</ul>\n");
            }
            output.push_str("</section>\n");
        }

        output.push_str("</body>\n</html>\n");
        output
    }
}

/// Writes the report next to its destination first and renames it into place.
pub async fn save_report(content: &str, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid output path: {}", path.display()))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to move report into {}", path.display()))?;
    Ok(())
}

pub async fn save_results(results: &[AnalysisResult], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
    save_report(&json, path).await
}

/// Issues grouped by category: known categories in priority order, others alphabetically.
pub fn group_by_category(issues: &[Issue]) -> Vec<(&str, Vec<&Issue>)> {
    let mut groups: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        groups.entry(issue.category.as_str()).or_default().push(issue);
    }

    let mut ordered = Vec::with_capacity(groups.len());
    for category in CATEGORY_PRIORITY {
        if let Some(issues) = groups.remove(category) {
            ordered.push((*category, issues));
        }
    }
    ordered.extend(groups);
    ordered
}

fn assessment(summary: &Summary) -> &'static str {
    if summary.severity_count(Severity::Critical) > 0 || summary.severity_count(Severity::High) > 0 {
        "⚠️ RISK ASSESSMENT: high-priority issues require immediate attention."
    } else if summary.severity_count(Severity::Medium) > 0 {
        "⚡ ATTENTION REQUIRED: medium-priority issues should be addressed in the next development cycle."
    } else {
        "✅ CODE QUALITY: the analyzed code shows minimal issues."
    }
}

fn priority(severity: Option<Severity>) -> &'static str {
    match severity {
        Some(Severity::Critical) => "P0 - Immediate",
        Some(Severity::High) => "P1 - High",
        Some(Severity::Medium) => "P2 - Medium",
        Some(Severity::Low) => "P3 - Low",
        Some(Severity::Info) | None => "P4 - Informational",
    }
}

fn file_recommendations(score: u32) -> [&'static str; 3] {
    if score < 50 {
        [
            "Immediate refactoring required",
            "Consider code review with senior developers",
            "Implement automated testing",
        ]
    } else if score < 75 {
        [
            "Address high-priority issues first",
            "Plan refactoring for next iteration",
            "Enhance code documentation",
        ]
    } else {
        [
            "Maintain current code quality",
            "Consider minor optimizations",
            "Continue following established patterns",
        ]
    }
}

fn debt_classification(points: usize) -> &'static str {
    match points {
        0..=10 => "Low",
        11..=30 => "Moderate",
        31..=60 => "High",
        _ => "Critical",
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AI Code Review Report</title>
<style>
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; max-width: 1100px; margin: 2rem auto; color: #1f2933; }
.meta { color: #616e7c; }
.summary { display: flex; gap: 1rem; }
.card { flex: 1; padding: 1rem; border-radius: 8px; background: #f5f7fa; text-align: center; }
.card span { display: block; font-size: 1.6rem; font-weight: 600; }
.file { margin-top: 2rem; border-top: 1px solid #e4e7eb; }
li { margin-bottom: .75rem; }
.sev-critical strong, .sev-high strong { color: #c81e1e; }
.sev-medium strong { color: #b7791f; }
.sev-low strong, .sev-info strong { color: #2b6cb0; }
.suggestion, .reasoning { margin-left: 1.5rem; color: #3e4c59; }
</style>
</head>
<body>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<AnalysisResult> {
        vec![AnalysisResult {
            subject: "src/app.js".to_string(),
            score: 60,
            issues: vec![
                Issue {
                    category: "style".to_string(),
                    severity: "low".to_string(),
                    message: "console.log left in code".to_string(),
                    suggestion: "Remove it".to_string(),
                    line: 3,
                    ..Issue::default()
                },
                Issue {
                    category: "security".to_string(),
                    severity: "high".to_string(),
                    message: "innerHTML with <user> input".to_string(),
                    suggestion: "Use textContent".to_string(),
                    reasoning: "XSS".to_string(),
                    line: 9,
                    ..Issue::default()
                },
            ],
            timestamp: Utc::now(),
        }]
    }

    fn renderer() -> ReportRenderer {
        ReportRenderer::new(ReportOptions::default(), "gemma3n:e4b")
    }

    #[test]
    fn json_report_has_summary() {
        let json = renderer().render(&sample(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["model"], "gemma3n:e4b");
        assert_eq!(value["summary"]["count"], 1);
        assert_eq!(value["summary"]["total_issues"], 2);
        assert_eq!(value["results"][0]["file"], "src/app.js");
        assert_eq!(value["results"][0]["issues"][1]["type"], "security");
    }

    #[test]
    fn markdown_groups_by_category_priority() {
        let markdown = renderer().render(&sample(), ReportFormat::Markdown).unwrap();
        let security = markdown.find("Security Issues").unwrap();
        let style = markdown.find("Style Issues").unwrap();
        assert!(security < style);
        assert!(markdown.contains("**Overall Assessment:** 60/100"));
        assert!(markdown.contains("| **Line Number** | 9 |"));
        assert!(markdown.contains("RISK ASSESSMENT"));
        assert!(markdown.contains("**Estimated Technical Debt:** 6 points"));
    }

    #[test]
    fn html_escapes_model_text() {
        let html = renderer().render(&sample(), ReportFormat::Html).unwrap();
        assert!(html.contains("innerHTML with &lt;user&gt; input"));
        assert!(!html.contains("<user>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn empty_report_renders_without_summary() {
        let markdown = renderer().render(&[], ReportFormat::Markdown).unwrap();
        assert!(markdown.contains("No files were analyzed."));
        let json = renderer().render(&[], ReportFormat::Json).unwrap();
        assert!(json.contains("\"summary\": null"));
    }

    #[test]
    fn unknown_categories_follow_known_ones() {
        let issues = vec![
            Issue {
                category: "xss".to_string(),
                ..Issue::default()
            },
            Issue {
                category: "bug".to_string(),
                ..Issue::default()
            },
        ];
        let groups = group_by_category(&issues);
        let names: Vec<_> = groups.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["bug", "xss"]);
    }

    #[tokio::test]
    async fn save_replaces_file_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        tokio::fs::write(&path, "old").await.unwrap();

        save_results(&sample(), &path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<AnalysisResult> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, sample_without_time(&parsed));
        assert!(!dir.path().join("report.json.tmp").exists());
    }

    fn sample_without_time(parsed: &[AnalysisResult]) -> Vec<AnalysisResult> {
        sample()
            .into_iter()
            .zip(parsed)
            .map(|(mut expected, actual)| {
                expected.timestamp = actual.timestamp;
                expected
            })
            .collect()
    }
}
