use crate::core::analysis::{AnalysisResult, AnalyzerKind, Issue};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_SCORE: u32 = 75;
pub const DEFAULT_SEVERITY: &str = "medium";
pub const DEFAULT_SUGGESTION: &str = "Manual review and fix required";

const FALLBACK_SUGGESTION: &str = "Requires manual review";
const FALLBACK_REASONING: &str = "Model response could not be structured as JSON";
const UNSTRUCTURED_MESSAGE: &str = "AI analysis completed but response was unstructured";
const UNSTRUCTURED_SUGGESTION: &str = "Check the raw model response manually";
const UNSTRUCTURED_REASONING: &str = "Model returned an unstructured response";

static OUTERMOST_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Turns whatever text the model produced into a well-formed [`AnalysisResult`].
///
/// Normalization never fails. A JSON object found anywhere in the reply is
/// validated and repaired; without one, lines of the reply that look like
/// findings are mined into issues.
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn normalize(raw: &str, kind: AnalyzerKind) -> AnalysisResult {
        Self::normalize_at(raw, kind, Utc::now())
    }

    pub fn normalize_at(raw: &str, kind: AnalyzerKind, now: DateTime<Utc>) -> AnalysisResult {
        let trimmed = raw.trim();

        if let Some(value) = extract_json(trimmed) {
            match serde_json::from_value::<WireResult>(value) {
                Ok(wire) => {
                    debug!("Model reply parsed as JSON ({} analysis)", kind);
                    return Self::repair(wire.into_result(now), kind);
                }
                Err(err) => {
                    debug!("JSON in model reply does not match the result shape: {}", err);
                }
            }
        }

        debug!("Falling back to text mining for {} analysis", kind);
        Self::fallback(trimmed, kind, now)
    }

    /// Fills missing or out-of-range fields with their defaults.
    ///
    /// Applying it to an already repaired result changes nothing.
    pub fn repair(mut result: AnalysisResult, kind: AnalyzerKind) -> AnalysisResult {
        if result.score == 0 || result.score > 100 {
            result.score = DEFAULT_SCORE;
        }

        for issue in &mut result.issues {
            if issue.category.trim().is_empty() {
                issue.category = kind.default_category().to_string();
            }
            if issue.severity.trim().is_empty() {
                issue.severity = DEFAULT_SEVERITY.to_string();
            }
            if issue.message.trim().is_empty() {
                issue.message = kind.default_message().to_string();
            }
            if issue.suggestion.trim().is_empty() {
                issue.suggestion = DEFAULT_SUGGESTION.to_string();
            }
        }

        result
    }

    fn fallback(text: &str, kind: AnalyzerKind, now: DateTime<Utc>) -> AnalysisResult {
        let keywords = kind.fallback_keywords();
        let mut issues: Vec<Issue> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| {
                let lower = line.to_lowercase();
                keywords.iter().any(|keyword| lower.contains(keyword))
            })
            .map(|line| Issue {
                category: kind.default_category().to_string(),
                severity: DEFAULT_SEVERITY.to_string(),
                message: line.to_string(),
                suggestion: FALLBACK_SUGGESTION.to_string(),
                reasoning: FALLBACK_REASONING.to_string(),
                ..Issue::default()
            })
            .collect();

        if issues.is_empty() {
            issues.push(Issue {
                category: kind.default_category().to_string(),
                severity: "info".to_string(),
                message: UNSTRUCTURED_MESSAGE.to_string(),
                suggestion: UNSTRUCTURED_SUGGESTION.to_string(),
                reasoning: UNSTRUCTURED_REASONING.to_string(),
                ..Issue::default()
            });
        }

        AnalysisResult {
            subject: String::new(),
            score: DEFAULT_SCORE,
            issues,
            timestamp: now,
        }
    }
}

/// Finds the JSON object in a model reply: the span from the first `{` to
/// the last `}`, kept only when it parses as a whole.
pub fn extract_json(text: &str) -> Option<Value> {
    let candidate = OUTERMOST_OBJECT.find(text)?;
    serde_json::from_str::<Value>(candidate.as_str()).ok()
}

#[derive(Deserialize)]
struct WireResult {
    #[serde(default)]
    score: Value,
    #[serde(default)]
    issues: Option<Vec<WireIssue>>,
}

#[derive(Deserialize)]
struct WireIssue {
    #[serde(default, rename = "type", alias = "category")]
    category: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    line: Value,
    #[serde(default)]
    reasoning: Option<String>,
}

impl WireResult {
    fn into_result(self, now: DateTime<Utc>) -> AnalysisResult {
        let score = coerce_integer(&self.score)
            .filter(|score| (1..=100).contains(score))
            .map(|score| score as u32)
            .unwrap_or(0);

        let issues = self
            .issues
            .unwrap_or_default()
            .into_iter()
            .map(|issue| Issue {
                category: issue.category.unwrap_or_default().trim().to_string(),
                severity: issue.severity.unwrap_or_default().trim().to_lowercase(),
                message: issue.message.unwrap_or_default(),
                suggestion: issue.suggestion.unwrap_or_default(),
                line: coerce_integer(&issue.line)
                    .map(|line| line.clamp(0, u32::MAX as i64) as u32)
                    .unwrap_or(0),
                reasoning: issue.reasoning.unwrap_or_default(),
                file: String::new(),
            })
            .collect();

        AnalysisResult {
            subject: String::new(),
            score,
            issues,
            timestamp: now,
        }
    }
}

// Models occasionally emit numbers as floats or quoted strings.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.trunc() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(raw: &str) -> AnalysisResult {
        ResponseNormalizer::normalize(raw, AnalyzerKind::Quality)
    }

    #[test]
    fn total_over_degenerate_inputs() {
        for raw in ["", "   \n\t ", "just some prose", "{", "}{", "{\"score\": }"] {
            let result = quality(raw);
            assert!(result.score <= 100, "score out of range for {:?}", raw);
            assert!(!result.issues.is_empty(), "no issues for {:?}", raw);
        }
    }

    #[test]
    fn well_formed_json_is_kept() {
        let result = quality(r#"{"score": 90, "issues": []}"#);
        assert_eq!(result.score, 90);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn out_of_range_scores_fall_back_to_default() {
        for raw in [
            r#"{"score": 150, "issues": []}"#,
            r#"{"score": -5, "issues": []}"#,
            r#"{"score": 0, "issues": []}"#,
            r#"{"issues": []}"#,
        ] {
            assert_eq!(quality(raw).score, DEFAULT_SCORE, "input {}", raw);
        }
    }

    #[test]
    fn missing_issue_fields_are_repaired() {
        let result = quality(r#"{"score": 80, "issues": [{"message": "x"}]}"#);
        assert_eq!(result.score, 80);
        assert_eq!(result.issues.len(), 1);
        let issue = &result.issues[0];
        assert_eq!(issue.message, "x");
        assert_eq!(issue.severity, "medium");
        assert_eq!(issue.category, "quality");
        assert_eq!(issue.suggestion, DEFAULT_SUGGESTION);
        assert_eq!(issue.line, 0);
    }

    #[test]
    fn empty_message_gets_category_default() {
        let result = ResponseNormalizer::normalize(
            r#"{"score": 60, "issues": [{"severity": "high"}]}"#,
            AnalyzerKind::Architecture,
        );
        assert_eq!(result.issues[0].message, "Architecture problem in code");
        assert_eq!(result.issues[0].category, "architecture");
        assert_eq!(result.issues[0].severity, "high");
    }

    #[test]
    fn negative_line_is_clamped() {
        let result = quality(r#"{"score": 70, "issues": [{"message": "m", "line": -3}]}"#);
        assert_eq!(result.issues[0].line, 0);
    }

    #[test]
    fn null_issues_become_empty() {
        let result = quality(r#"{"score": 70, "issues": null}"#);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn lenient_numbers_are_accepted() {
        let result = quality(r#"{"score": 82.7, "issues": [{"message": "m", "line": "14"}]}"#);
        assert_eq!(result.score, 82);
        assert_eq!(result.issues[0].line, 14);
    }

    #[test]
    fn category_alias_is_accepted() {
        let result = ResponseNormalizer::normalize(
            r#"{"score": 55, "issues": [{"category": "xss", "message": "m"}]}"#,
            AnalyzerKind::Security,
        );
        assert_eq!(result.issues[0].category, "xss");
    }

    #[test]
    fn model_issue_order_is_preserved() {
        let result = quality(
            r#"{"score": 70, "issues": [{"message": "first"}, {"message": "second"}, {"message": "third"}]}"#,
        );
        let messages: Vec<_> = result.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn fallback_mines_keyword_lines() {
        let raw = "Line1: all good\nLine2: there is a problem with null checks\nLine3: done";
        let result = quality(raw);
        assert_eq!(result.score, DEFAULT_SCORE);
        assert_eq!(result.issues.len(), 1);
        let issue = &result.issues[0];
        assert_eq!(issue.message, "Line2: there is a problem with null checks");
        assert_eq!(issue.severity, "medium");
        assert_eq!(issue.category, "quality");
        assert_eq!(issue.suggestion, FALLBACK_SUGGESTION);
        assert_eq!(issue.reasoning, FALLBACK_REASONING);
    }

    #[test]
    fn fallback_matches_russian_keywords_case_insensitively() {
        let raw = "  Найдена ОШИБКА в обработке ввода  \nвсё остальное хорошо";
        let result = quality(raw);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].message, "Найдена ОШИБКА в обработке ввода");
    }

    #[test]
    fn fallback_keyword_sets_depend_on_kind() {
        let raw = "Possible vulnerability in token handling";
        assert_eq!(quality(raw).issues[0].severity, "info");

        let security = ResponseNormalizer::normalize(raw, AnalyzerKind::Security);
        assert_eq!(security.issues.len(), 1);
        assert_eq!(security.issues[0].category, "security");
        assert_eq!(security.issues[0].severity, "medium");
    }

    #[test]
    fn fallback_without_matches_yields_single_info_issue() {
        let result = quality("Looks fine to me.\nNothing else to add.");
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, "info");
        assert_eq!(result.issues[0].message, UNSTRUCTURED_MESSAGE);
    }

    #[test]
    fn json_embedded_in_prose_is_extracted() {
        let raw = "Here is my analysis:\n{\"score\":60,\"issues\":[]}\nHope that helps!";
        let result = quality(raw);
        assert_eq!(result.score, 60);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn fenced_json_is_extracted() {
        let raw = "```json\n{\"score\": 45, \"issues\": [{\"type\": \"bug\", \"message\": \"m\", \"line\": 3}]}\n```";
        let result = quality(raw);
        assert_eq!(result.score, 45);
        assert_eq!(result.issues[0].category, "bug");
        assert_eq!(result.issues[0].line, 3);
    }

    #[test]
    fn invalid_outer_span_is_not_salvaged() {
        let raw = "Result: {\"score\": 65, \"issues\": []} and stray brace }";
        assert!(extract_json(raw).is_none());
        let result = quality(raw);
        assert_eq!(result.score, DEFAULT_SCORE);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, "info");
    }

    #[test]
    fn truncated_reply_takes_the_text_path() {
        let raw = "{\"score\": 40, \"issues\": [{\"type\": \"bug\", \"message\": \"Null dereference in parser\"}, {\"type\": \"sec";
        let result = quality(raw);
        assert_eq!(result.score, DEFAULT_SCORE);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].message, raw);
        assert_eq!(result.issues[0].severity, "medium");
        assert_eq!(result.issues[0].category, "quality");
    }

    #[test]
    fn mismatched_shape_falls_back() {
        let result = quality(r#"{"score": 70, "issues": "none found, no problem"}"#);
        assert_eq!(result.score, DEFAULT_SCORE);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, "medium");
    }

    #[test]
    fn repair_is_a_fixed_point() {
        let raw = r#"{"score": 0, "issues": [{"message": ""}, {"type": "bug", "severity": "low", "message": "m", "suggestion": "s", "line": 4}]}"#;
        let once = quality(raw);
        let twice = ResponseNormalizer::repair(once.clone(), AnalyzerKind::Quality);
        assert_eq!(once, twice);
    }

    #[test]
    fn timestamp_is_normalization_time() {
        let now = Utc::now();
        let result = ResponseNormalizer::normalize_at("{}", AnalyzerKind::Generic, now);
        assert_eq!(result.timestamp, now);
        assert_eq!(result.score, DEFAULT_SCORE);
        assert!(result.issues.is_empty());
    }
}
