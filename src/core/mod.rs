pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod git;
pub mod normalizer;
pub mod prompt;
pub mod report;
pub mod scanner;

pub use aggregator::ResultAggregator;
pub use analysis::{AnalysisResult, AnalyzerKind, Severity};
pub use analyzer::Analyzer;
pub use git::GitIntegration;
pub use prompt::PromptBuilder;
pub use report::ReportFormat;
pub use scanner::FileScanner;
