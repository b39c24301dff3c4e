use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of analyzing one unit of code: a file, a diff, or a merged set of categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "file", default)]
    pub subject: String,
    pub score: u32,
    pub issues: Vec<Issue>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Stamps every issue with the file it came from.
    pub fn attach_file(&mut self, file: &str) {
        for issue in &mut self.issues {
            if issue.file.is_empty() {
                issue.file = file.to_string();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub category: String,
    pub severity: String,
    pub message: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub line: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
}

fn is_zero(line: &u32) -> bool {
    *line == 0
}

impl Issue {
    pub fn severity_level(&self) -> Option<Severity> {
        Severity::parse(&self.severity)
    }
}

/// The analysis flavours the tool knows how to prompt for and how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    Quality,
    Security,
    Architecture,
    Generic,
}

impl AnalyzerKind {
    /// Category assigned to issues that arrive without one.
    pub fn default_category(self) -> &'static str {
        match self {
            Self::Quality | Self::Generic => "quality",
            Self::Security => "security",
            Self::Architecture => "architecture",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::Quality => "Quality problem in code",
            Self::Security => "Security problem in code",
            Self::Architecture => "Architecture problem in code",
            Self::Generic => "Problem in code",
        }
    }

    /// Lowercase keywords that mark a line of free text as describing an issue.
    pub fn fallback_keywords(self) -> &'static [&'static str] {
        const QUALITY: &[&str] = &["problem", "issue", "error", "quality", "проблема", "ошибка"];
        const SECURITY: &[&str] = &[
            "problem",
            "issue",
            "error",
            "quality",
            "проблема",
            "ошибка",
            "vulnerability",
            "security",
            "уязвимость",
            "безопасность",
        ];
        const ARCHITECTURE: &[&str] = &[
            "problem",
            "issue",
            "error",
            "quality",
            "проблема",
            "ошибка",
            "architecture",
            "архитектура",
        ];
        const GENERIC: &[&str] = &[
            "problem",
            "issue",
            "error",
            "quality",
            "проблема",
            "ошибка",
            "vulnerability",
            "security",
            "уязвимость",
            "безопасность",
            "architecture",
            "архитектура",
        ];

        match self {
            Self::Quality => QUALITY,
            Self::Security => SECURITY,
            Self::Architecture => ARCHITECTURE,
            Self::Generic => GENERIC,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Security => "security",
            Self::Architecture => "architecture",
            Self::Generic => "general",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::High => "⚠️",
            Self::Medium => "⚡",
            Self::Low => "💡",
            Self::Info => "ℹ️",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue categories that count as security findings.
pub const SECURITY_CATEGORIES: &[&str] = &[
    "security",
    "vulnerability",
    "injection",
    "xss",
    "sqli",
    "authentication",
    "authorization",
];

/// Display order for general-purpose categories.
pub const CATEGORY_PRIORITY: &[&str] = &[
    "security",
    "quality",
    "performance",
    "style",
    "bug",
    "architecture",
];

pub fn is_security_category(category: &str) -> bool {
    SECURITY_CATEGORIES.contains(&category.to_lowercase().as_str())
}

pub fn category_emoji(category: &str) -> &'static str {
    match category {
        "security" => "🔒",
        "quality" => "⚡",
        "performance" => "🚀",
        "style" => "🎨",
        "bug" => "🐛",
        "architecture" => "🏗️",
        "vulnerability" => "💥",
        "injection" => "💉",
        "xss" => "🌐",
        "sqli" => "🗄️",
        "authentication" => "🔐",
        "authorization" => "🚪",
        _ => "💡",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serializes_category_as_type() {
        let issue = Issue {
            category: "bug".to_string(),
            severity: "high".to_string(),
            message: "Off by one".to_string(),
            suggestion: "Use an inclusive range".to_string(),
            line: 12,
            ..Issue::default()
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "bug");
        assert_eq!(json["line"], 12);
        assert!(json.get("reasoning").is_none());
        assert!(json.get("file").is_none());
    }

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse(" info "), Some(Severity::Info));
        assert_eq!(Severity::parse("blocker"), None);
        assert!(Severity::Critical > Severity::Medium);
    }

    #[test]
    fn security_family_membership() {
        assert!(is_security_category("xss"));
        assert!(is_security_category("SQLi"));
        assert!(!is_security_category("style"));
    }

    #[test]
    fn attach_file_keeps_existing_origin() {
        let mut result = AnalysisResult {
            subject: String::new(),
            score: 80,
            issues: vec![
                Issue::default(),
                Issue {
                    file: "other.rs".to_string(),
                    ..Issue::default()
                },
            ],
            timestamp: Utc::now(),
        };
        result.attach_file("main.rs");
        assert_eq!(result.issues[0].file, "main.rs");
        assert_eq!(result.issues[1].file, "other.rs");
    }
}
