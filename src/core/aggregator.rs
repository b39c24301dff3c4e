use crate::core::analysis::{is_security_category, AnalysisResult, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub avg_score: u32,
    pub total_issues: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl Summary {
    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity
            .get(severity.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Weighted debt estimate: critical 10, high 5, medium 2, low 1.
    pub fn technical_debt(&self) -> usize {
        self.severity_count(Severity::Critical) * 10
            + self.severity_count(Severity::High) * 5
            + self.severity_count(Severity::Medium) * 2
            + self.severity_count(Severity::Low)
    }
}

pub struct ResultAggregator;

impl ResultAggregator {
    /// Combines the per-category results for one unit into a single result.
    ///
    /// Issues are concatenated in input order and the score is the truncated
    /// mean. The first input supplies subject and timestamp. Returns `None`
    /// for an empty input.
    pub fn merge_categories(results: Vec<AnalysisResult>) -> Option<AnalysisResult> {
        let count = results.len();
        let mut iter = results.into_iter();
        let mut merged = iter.next()?;
        if count == 1 {
            return Some(merged);
        }

        let mut total_score = u64::from(merged.score);
        for result in iter {
            total_score += u64::from(result.score);
            merged.issues.extend(result.issues);
        }
        merged.score = (total_score / count as u64) as u32;

        Some(merged)
    }

    pub fn summarize(results: &[AnalysisResult]) -> Option<Summary> {
        if results.is_empty() {
            return None;
        }

        let total_score: u64 = results.iter().map(|r| u64::from(r.score)).sum();
        let mut by_severity = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        let mut total_issues = 0;

        for issue in results.iter().flat_map(|r| &r.issues) {
            total_issues += 1;
            *by_severity.entry(issue.severity.clone()).or_insert(0) += 1;
            *by_category.entry(issue.category.clone()).or_insert(0) += 1;
        }

        Some(Summary {
            count: results.len(),
            avg_score: (total_score / results.len() as u64) as u32,
            total_issues,
            by_severity,
            by_category,
        })
    }

    /// Keeps only security-family findings.
    pub fn security_issues(mut result: AnalysisResult) -> AnalysisResult {
        result
            .issues
            .retain(|issue| is_security_category(&issue.category));
        result
    }

    /// Drops issues below `min`; issues with an unrecognised severity are kept.
    pub fn filter_min_severity(mut result: AnalysisResult, min: Severity) -> AnalysisResult {
        result
            .issues
            .retain(|issue| issue.severity_level().map_or(true, |level| level >= min));
        result
    }
}
