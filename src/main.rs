mod adapters;
mod config;
mod core;

use crate::adapters::llm::{LLMAdapter, LLMRequest};
use crate::core::analysis::category_emoji;
use crate::core::report::{
    capitalize, group_by_category, save_report, save_results, ReportRenderer,
};
use crate::core::{
    AnalysisResult, Analyzer, AnalyzerKind, FileScanner, GitIntegration, PromptBuilder,
    ReportFormat, ResultAggregator, Severity,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "minireviewer")]
#[command(about = "AI code review powered by a local Ollama model", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Path to a YAML config file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, help = "Ollama model to use")]
    model: Option<String>,

    #[arg(long, global = true, help = "Ollama server URL")]
    host: Option<String>,

    #[arg(long, global = true)]
    temperature: Option<f32>,

    #[arg(long, global = true, help = "Model request timeout in seconds")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Review git changes: uncommitted work, a commit or a range")]
    Analyze {
        #[arg(long, help = "Base revision of the range")]
        from: Option<String>,

        #[arg(long, help = "End revision of the range (defaults to HEAD)")]
        to: Option<String>,

        #[arg(long, conflicts_with_all = ["from", "to"])]
        commit: Option<String>,

        #[arg(short, long, help = "Save the result as JSON")]
        output: Option<PathBuf>,

        #[arg(long, help = "Extra ignore pattern (repeatable)")]
        ignore: Vec<String>,
    },
    #[command(about = "Per-file code quality review")]
    Quality {
        #[arg(long, default_value = ".")]
        path: PathBuf,

        #[arg(
            long,
            default_value = "medium",
            value_parser = parse_severity,
            help = "Minimum severity to display"
        )]
        severity: Severity,

        #[arg(short, long, help = "Save the results as JSON")]
        output: Option<PathBuf>,

        #[arg(long, help = "Extra ignore pattern (repeatable)")]
        ignore: Vec<String>,
    },
    #[command(about = "Per-file security review")]
    Security {
        #[arg(long, default_value = ".")]
        path: PathBuf,

        #[arg(short, long, help = "Save the results as JSON")]
        output: Option<PathBuf>,
    },
    #[command(about = "Architecture review of a file or a project layout")]
    Architecture {
        #[arg(long, default_value = ".")]
        path: PathBuf,

        #[arg(short, long, help = "Save the result as JSON")]
        output: Option<PathBuf>,
    },
    #[command(about = "Full review report: quality, security and architecture per file")]
    Report {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, help = "Report format (defaults to reports.format from config)")]
        format: Option<ReportFormat>,

        #[arg(short, long, help = "Output file path (prints to stdout if not provided)")]
        output: Option<PathBuf>,
    },
    #[command(about = "Check the connection to the Ollama server")]
    TestOllama,
    Version,
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    Severity::parse(value)
        .ok_or_else(|| format!("unknown severity '{}' (use info, low, medium, high, critical)", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::Config::load(cli.config.as_deref())?;
    config.merge_with_cli(config::CliOverrides {
        model: cli.model,
        host: cli.host,
        temperature: cli.temperature,
        timeout_secs: cli.timeout,
    });

    match cli.command {
        Commands::Analyze {
            from,
            to,
            commit,
            output,
            ignore,
        } => {
            analyze_command(config, from, to, commit, output, ignore).await?;
        }
        Commands::Quality {
            path,
            severity,
            output,
            ignore,
        } => {
            quality_command(config, path, severity, output, ignore).await?;
        }
        Commands::Security { path, output } => {
            security_command(config, path, output).await?;
        }
        Commands::Architecture { path, output } => {
            architecture_command(config, path, output).await?;
        }
        Commands::Report {
            path,
            format,
            output,
        } => {
            report_command(config, path, format, output).await?;
        }
        Commands::TestOllama => {
            test_ollama_command(config).await?;
        }
        Commands::Version => {
            println!("minireviewer {}", env!("CARGO_PKG_VERSION"));
            println!("Default model: {}", config.ollama.model);
            println!("Ollama host: {}", config.ollama.host);
        }
    }

    Ok(())
}

fn build_analyzer(config: &config::Config) -> Result<Analyzer> {
    let adapter = adapters::llm::create_adapter(&config.model_config())?;
    Ok(Analyzer::new(adapter, PromptBuilder::new(config.prompt_config())))
}

fn build_scanner(config: &config::Config, extra_ignores: &[String]) -> FileScanner {
    FileScanner::new(
        &config.ignore_patterns(extra_ignores),
        config.analysis.max_file_size,
    )
}

async fn analyze_command(
    config: config::Config,
    from: Option<String>,
    to: Option<String>,
    commit: Option<String>,
    output_path: Option<PathBuf>,
    ignore: Vec<String>,
) -> Result<()> {
    if !GitIntegration::is_repository(".") {
        println!("Not inside a git repository");
        return Ok(());
    }
    let git = GitIntegration::new(".")?;
    let (diff, subject) = match (commit, from, to) {
        (Some(commit), _, _) => (git.get_commit_diff(&commit)?, format!("commit {}", commit)),
        (None, Some(from), to) => {
            let to = to.unwrap_or_else(|| "HEAD".to_string());
            (git.get_diff_between(&from, &to)?, format!("{}..{}", from, to))
        }
        (None, None, Some(_)) => bail!("--to requires --from"),
        (None, None, None) => {
            debug!("Working tree status:\n{}", git.get_status()?);
            let branch = git
                .get_current_branch()
                .unwrap_or_else(|_| "HEAD".to_string());
            (
                git.get_uncommitted_diff()?,
                format!("uncommitted changes on {}", branch),
            )
        }
    };

    let scanner = build_scanner(&config, &ignore);
    let diff = core::git::filter_diff_files(&diff, |path| !scanner.should_ignore(Path::new(path)));
    if diff.trim().is_empty() {
        println!("No changes found");
        return Ok(());
    }

    let analyzer = build_analyzer(&config)?;
    info!("Analyzing {} with model {}", subject, analyzer.model_name());
    let result = analyzer
        .analyze(AnalyzerKind::Generic, &diff, "Git changes analysis")
        .await?
        .with_subject(subject);

    print_result(&result);
    print_summary(std::slice::from_ref(&result));

    if let Some(path) = output_path {
        let json = serde_json::to_string_pretty(&result)?;
        save_report(&json, &path).await?;
        info!("Result saved to {}", path.display());
    }

    Ok(())
}

async fn quality_command(
    config: config::Config,
    path: PathBuf,
    min_severity: Severity,
    output_path: Option<PathBuf>,
    ignore: Vec<String>,
) -> Result<()> {
    let files = build_scanner(&config, &ignore).find_supported_files(&path)?;
    let analyzer = build_analyzer(&config)?;
    let results = analyze_files(&analyzer, &files, AnalyzerKind::Quality, |result| result).await;

    for result in &results {
        print_result(&ResultAggregator::filter_min_severity(result.clone(), min_severity));
    }
    print_summary(&results);
    save_results_if_requested(&results, output_path).await
}

async fn security_command(config: config::Config, path: PathBuf, output_path: Option<PathBuf>) -> Result<()> {
    let files = build_scanner(&config, &[]).find_supported_files(&path)?;
    let analyzer = build_analyzer(&config)?;
    let results = analyze_files(
        &analyzer,
        &files,
        AnalyzerKind::Security,
        ResultAggregator::security_issues,
    )
    .await;

    for result in &results {
        print_result(result);
    }
    print_summary(&results);
    save_results_if_requested(&results, output_path).await
}

async fn architecture_command(
    config: config::Config,
    path: PathBuf,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let metadata = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("Cannot access {}", path.display()))?;
    let analyzer = build_analyzer(&config)?;
    let subject = path.display().to_string();

    let result = if metadata.is_file() {
        FileScanner::validate_single_file(&path)?;
        let content = read_source(&path).await?;
        analyzer
            .analyze(
                AnalyzerKind::Architecture,
                &content,
                &format!("Architecture analysis of {}", subject),
            )
            .await?
    } else {
        let structure = build_scanner(&config, &[]).project_structure(&path)?;
        println!("{}", structure);
        analyzer
            .analyze(AnalyzerKind::Architecture, &structure, "Project architecture analysis")
            .await?
    };
    let result = result.with_subject(subject);

    print_result(&result);
    print_summary(std::slice::from_ref(&result));

    if let Some(path) = output_path {
        let json = serde_json::to_string_pretty(&result)?;
        save_report(&json, &path).await?;
        info!("Result saved to {}", path.display());
    }

    Ok(())
}

async fn report_command(
    config: config::Config,
    path: PathBuf,
    format: Option<ReportFormat>,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let files = build_scanner(&config, &[]).find_supported_files(&path)?;
    let analyzer = build_analyzer(&config)?;

    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        let subject = file.display().to_string();
        info!("Analyzing {}", subject);
        let content = match read_source(file).await {
            Ok(content) => content,
            Err(err) => {
                warn!("{:#}", err);
                continue;
            }
        };

        match analyzer
            .analyze_all(&content, &format!("Full review of {}", subject))
            .await
        {
            Ok(result) => {
                let mut result = result.with_subject(subject.as_str());
                result.attach_file(&subject);
                results.push(result);
            }
            Err(err) => warn!("Skipping {}: {:#}", subject, err),
        }
    }

    let format = format.unwrap_or(config.reports.format);
    let renderer = ReportRenderer::new(config.reports.options.clone(), analyzer.model_name());
    let rendered = renderer.render(&results, format)?;

    match output_path {
        Some(path) => {
            save_report(&rendered, &path).await?;
            println!("📊 Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

async fn test_ollama_command(config: config::Config) -> Result<()> {
    let adapter = adapters::OllamaAdapter::new(config.model_config())?;
    println!("🔌 Connecting to {}", adapter.base_url());

    adapter
        .health_check()
        .await
        .context("Ollama server is not reachable")?;
    println!("✅ Server is reachable");

    let models = adapter.list_models().await?;
    println!("📦 Available models ({}):", models.len());
    for model in &models {
        println!("  - {}", model);
    }
    if !models.iter().any(|m| m == adapter.model_name()) {
        warn!(
            "Model {} is not installed, run `ollama pull {}`",
            adapter.model_name(),
            adapter.model_name()
        );
    }

    let response = adapter
        .complete(LLMRequest {
            max_tokens: Some(32),
            ..LLMRequest::new("You are a helpful assistant.", "Reply with a short greeting.")
        })
        .await
        .context("Test generation failed")?;
    println!("🧠 {} replied: {}", response.model, response.content.trim());
    if let Some(usage) = response.usage {
        println!(
            "   tokens: {} prompt + {} completion",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    Ok(())
}

/// Analyzes each file in turn. A file whose read or model call fails is logged and skipped.
async fn analyze_files<F>(
    analyzer: &Analyzer,
    files: &[PathBuf],
    kind: AnalyzerKind,
    mut post_process: F,
) -> Vec<AnalysisResult>
where
    F: FnMut(AnalysisResult) -> AnalysisResult,
{
    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let subject = file.display().to_string();
        info!("Running {} analysis on {}", kind, subject);

        let content = match read_source(file).await {
            Ok(content) => content,
            Err(err) => {
                warn!("{:#}", err);
                continue;
            }
        };

        let context = format!("{} analysis of {}", capitalize(kind.label()), subject);
        match analyzer.analyze(kind, &content, &context).await {
            Ok(result) => {
                let mut result = post_process(result.with_subject(subject.as_str()));
                result.attach_file(&subject);
                results.push(result);
            }
            Err(err) => warn!("Skipping {}: {:#}", subject, err),
        }
    }
    results
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn save_results_if_requested(results: &[AnalysisResult], output_path: Option<PathBuf>) -> Result<()> {
    if let Some(path) = output_path {
        save_results(results, &path).await?;
        info!("Results saved to {}", path.display());
    }
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("\n📄 {}", result.subject);
    println!("{} Score: {}/100", score_emoji(result.score), result.score);

    if result.issues.is_empty() {
        println!("✅ No issues found");
        return;
    }

    for (category, issues) in group_by_category(&result.issues) {
        println!("\n{} {} ({})", category_emoji(category), category, issues.len());
        for issue in issues {
            let emoji = issue.severity_level().map(Severity::emoji).unwrap_or("⚪");
            let location = if issue.line > 0 {
                format!(" (line {})", issue.line)
            } else {
                String::new()
            };
            println!(
                "  {} [{}] {}{}",
                emoji,
                issue.severity.to_uppercase(),
                issue.message,
                location
            );
            if !issue.suggestion.is_empty() {
                println!("     💡 {}", issue.suggestion);
            }
            if !issue.reasoning.is_empty() {
                println!("     🧠 {}", issue.reasoning);
            }
        }
    }
}

fn print_summary(results: &[AnalysisResult]) {
    let Some(summary) = ResultAggregator::summarize(results) else {
        println!("Nothing to analyze");
        return;
    };

    println!("\n📊 Summary");
    println!("  Files analyzed: {}", summary.count);
    println!("  Average score: {}/100", summary.avg_score);
    println!("  Total issues: {}", summary.total_issues);
    for severity in Severity::ALL {
        let count = summary.severity_count(severity);
        if count > 0 {
            println!("  {} {}: {}", severity.emoji(), severity, count);
        }
    }
    println!("  Technical debt: {} points", summary.technical_debt());
}

fn score_emoji(score: u32) -> &'static str {
    match score {
        80.. => "🟢",
        60..=79 => "🟡",
        _ => "🔴",
    }
}
