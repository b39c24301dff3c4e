use crate::core::analysis::AnalyzerKind;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;

const RESPONSE_SCHEMA: &str = r#"{
  "score": 85,
  "issues": [
    {
      "type": "{category}",
      "severity": "medium",
      "message": "Short description of the problem",
      "suggestion": "How to fix it",
      "line": 42,
      "reasoning": "Why this matters"
    }
  ]
}"#;

// Placeholders are filled in one pass so inserted text is never rescanned.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(focus|language|context|code|criteria|schema)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub max_code_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: r#"You are a meticulous senior code reviewer. You report concrete, actionable findings with exact line numbers and you answer strictly in the JSON format you are given, without any text before or after it."#.to_string(),
            user_prompt_template: r#"<task>
You are an expert in {focus} for {language} code. Analyze the code below.
</task>

<context>
{context}
</context>

<code>
{code}
</code>

<criteria>
{criteria}
</criteria>

<instructions>
- Give the EXACT line number ("line") for every issue
- Rate severity as one of: low, medium, high, critical
- Give a concrete suggestion for the fix
- Explain why it is a problem in "reasoning"
- Score the code from 1 to 100, higher is better
</instructions>

<response_format>
Answer ONLY with JSON, no additional text:
{schema}
</response_format>"#.to_string(),
            max_code_chars: 60000,
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Returns `(system_prompt, user_prompt)` for one unit of code.
    pub fn build_prompt(&self, kind: AnalyzerKind, code: &str, context: &str) -> (String, String) {
        let language = Language::detect(context);
        let schema = RESPONSE_SCHEMA.replace("{category}", issue_types(kind));

        let code = self.truncate_code(code);
        let user_prompt = PLACEHOLDER
            .replace_all(&self.config.user_prompt_template, |caps: &Captures| {
                match &caps[1] {
                    "focus" => focus(kind),
                    "language" => language.name(),
                    "criteria" => criteria(kind, language),
                    "schema" => schema.as_str(),
                    "context" => context,
                    _ => code.as_str(),
                }
                .to_string()
            })
            .into_owned();

        (self.config.system_prompt.clone(), user_prompt)
    }

    fn truncate_code(&self, code: &str) -> String {
        let max = self.config.max_code_chars;
        if max == 0 || code.len() <= max {
            return code.to_string();
        }

        let mut cut = max;
        while !code.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n[Code truncated]", &code[..cut])
    }
}

fn focus(kind: AnalyzerKind) -> &'static str {
    match kind {
        AnalyzerKind::Quality => "code quality",
        AnalyzerKind::Security => "code security",
        AnalyzerKind::Architecture => "software architecture",
        AnalyzerKind::Generic => "code review",
    }
}

fn issue_types(kind: AnalyzerKind) -> &'static str {
    match kind {
        AnalyzerKind::Quality => "quality",
        AnalyzerKind::Security => "security|vulnerability|injection|xss|sqli|authentication|authorization",
        AnalyzerKind::Architecture => "architecture",
        AnalyzerKind::Generic => "quality|security|performance|style|bug",
    }
}

fn criteria(kind: AnalyzerKind, language: Language) -> &'static str {
    match kind {
        AnalyzerKind::Quality => match language {
            Language::Unknown => QUALITY_CRITERIA,
            _ => QUALITY_CRITERIA_IDIOMATIC,
        },
        AnalyzerKind::Security => SECURITY_CRITERIA,
        AnalyzerKind::Architecture => ARCHITECTURE_CRITERIA,
        AnalyzerKind::Generic => GENERIC_CRITERIA,
    }
}

const QUALITY_CRITERIA: &str = r#"1. Readability and structure: overly long functions, too many parameters, duplication, separation of concerns, naming
2. Error handling: missing checks, incomplete exception handling, error logging
3. Testability: hard-to-test code, coupling between modules
4. Style and standards: naming conventions, formatting, unused variables and imports"#;

const QUALITY_CRITERIA_IDIOMATIC: &str = r#"1. Readability and structure: overly long functions, too many parameters, duplication, separation of concerns, naming
2. Error handling: missing checks, incomplete exception handling, error logging
3. Testability: hard-to-test code, coupling between modules
4. Style and standards: best practices and idioms of the language, naming conventions, formatting, unused variables and imports"#;

const SECURITY_CRITERIA: &str = r#"1. Code execution: eval(), os/exec, shell_exec, system(), dynamic code execution, command injection
2. Injections: SQL, NoSQL, command, LDAP
3. XSS and CSRF: unescaped user input, innerHTML without sanitization, missing CSRF tokens
4. Authentication and authorization: weak passwords, missing permission checks, session leaks
5. Data: insecure transport, missing encryption, leaks of sensitive information"#;

const ARCHITECTURE_CRITERIA: &str = r#"1. SOLID principles: single responsibility, open/closed, Liskov substitution, interface segregation, dependency inversion
2. Project structure: layering, modularity, coupling and cohesion, separation of concerns
3. Design patterns: appropriate patterns, anti-patterns, architectural decisions
4. Scalability: extensibility, technical debt, architectural performance
5. Testability: ease of testing, mocks and stubs, dependencies"#;

const GENERIC_CRITERIA: &str = r#"1. Code quality: readability, structure, duplication
2. Potential bugs and logic errors
3. Style and best practices
4. Performance and optimization
5. Security and vulnerabilities"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    Go,
    Python,
    Java,
    Cpp,
    Rust,
    Php,
    Ruby,
    Kotlin,
    Unknown,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        Self::from_extension(&extension)
    }

    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.') {
            "js" | "jsx" | "ts" | "tsx" => Self::JavaScript,
            "go" => Self::Go,
            "py" => Self::Python,
            "java" => Self::Java,
            "cpp" | "cc" | "cxx" | "hpp" | "h" => Self::Cpp,
            "rs" => Self::Rust,
            "php" => Self::Php,
            "rb" => Self::Ruby,
            "kt" => Self::Kotlin,
            _ => Self::Unknown,
        }
    }

    /// Picks the language out of a context line such as
    /// "Quality analysis of src/main.go"; the first path-like token decides.
    pub fn detect(context: &str) -> Self {
        context
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| c == ',' || c == ')' || c == '('))
            .map(|token| Self::from_path(Path::new(token)))
            .find(|language| *language != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript/TypeScript",
            Self::Go => "Go",
            Self::Python => "Python",
            Self::Java => "Java",
            Self::Cpp => "C++",
            Self::Rust => "Rust",
            Self::Php => "PHP",
            Self::Ruby => "Ruby",
            Self::Kotlin => "Kotlin",
            Self::Unknown => "source",
        }
    }
}
