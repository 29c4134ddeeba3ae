//! CLI command definitions for commit-eval.
//!
//! `run` compares two commit message agents over a fixture directory (or the
//! staged changes of a repository); `fixtures` lists what is available.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{EvalConfig, FailurePolicy};
use crate::eval::{EvalComparison, EvalRunner, ShutdownSignal};
use crate::fixtures::{DirectoryFixtures, FixtureSource, GitFixtureSource};
use crate::generator::{Agent, CliGenerator, Generator, LlmGenerator};
use crate::judge::{Judge, LlmJudge, UnavailableJudge};
use crate::llm::{LiteLlmClient, LlmProvider, OpenRouterProvider};
use crate::metrics::{export_metrics, init_metrics};
use crate::report::FileReporter;

/// Fixture name used for a live repository's staged changes.
const WORKING_TREE_FIXTURE: &str = "working-tree";

/// Benchmark two commit message agents against each other.
#[derive(Parser)]
#[command(name = "commit-eval")]
#[command(about = "Benchmark AI commit message agents head to head")]
#[command(version)]
#[command(
    long_about = "commit-eval runs two commit message agents three times per fixture, scores every attempt, and declares a winner per fixture.\n\nExample usage:\n  commit-eval run --agent-a claude --agent-b codex --fixtures-dir ./fixtures"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Compare two agents over a set of fixtures.
    #[command(alias = "eval")]
    Run(RunArgs),

    /// List the fixtures found in a fixture directory.
    Fixtures(FixturesArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// First agent: claude, codex, llm:<model> or cmd:<command line>.
    #[arg(long, default_value = "claude")]
    pub agent_a: String,

    /// Second agent, same syntax as --agent-a.
    #[arg(long, default_value = "codex")]
    pub agent_b: String,

    /// Directory holding one subdirectory per fixture.
    #[arg(short = 'f', long, env = "EVAL_FIXTURES_DIR")]
    pub fixtures_dir: Option<PathBuf>,

    /// Only evaluate these fixtures (repeatable); default is all.
    #[arg(long = "fixture")]
    pub fixtures: Vec<String>,

    /// Evaluate the staged changes of this repository; takes precedence over --fixtures-dir.
    #[arg(long)]
    pub git_repo: Option<PathBuf>,

    /// Expected commit type for --git-repo.
    #[arg(long, requires = "git_repo")]
    pub expected_type: Option<String>,

    /// Output directory for results, reports and baselines.
    #[arg(short = 'o', long, env = "EVAL_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Judge model.
    #[arg(short = 'm', long, env = "EVAL_JUDGE_MODEL")]
    pub judge_model: Option<String>,

    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY")]
    pub api_key: Option<String>,

    /// Run without a judge: inline scoring and fallback results only.
    #[arg(long)]
    pub offline: bool,

    /// What to do when an agent cannot be evaluated: continue, skip-fixture or abort.
    #[arg(long)]
    pub failure_policy: Option<FailurePolicy>,

    /// Per-attempt generator timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip the comparison against stored baselines.
    #[arg(long)]
    pub no_baseline: bool,

    /// Store complete comparisons from this run as the new baselines.
    #[arg(long)]
    pub update_baseline: bool,

    /// Write Prometheus metrics to this file when the run ends.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Print comparisons as JSON instead of a summary table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct FixturesArgs {
    /// Directory holding one subdirectory per fixture.
    #[arg(short = 'f', long, env = "EVAL_FIXTURES_DIR", default_value = "./fixtures")]
    pub fixtures_dir: PathBuf,

    /// Print fixtures as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// How an agent argument is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSpec {
    Claude,
    Codex,
    /// Direct chat completion against the configured provider.
    Llm(String),
    /// Any command reading the prompt on stdin.
    Command(String),
}

impl AgentSpec {
    pub fn needs_llm(&self) -> bool {
        matches!(self, AgentSpec::Llm(_))
    }
}

impl FromStr for AgentSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(model) = s.strip_prefix("llm:") {
            if model.trim().is_empty() {
                return Err("llm: agent needs a model, e.g. llm:openai/gpt-4o".to_string());
            }
            return Ok(AgentSpec::Llm(model.trim().to_string()));
        }
        if let Some(command) = s.strip_prefix("cmd:") {
            if command.trim().is_empty() {
                return Err("cmd: agent needs a command line".to_string());
            }
            return Ok(AgentSpec::Command(command.trim().to_string()));
        }
        match s {
            "claude" => Ok(AgentSpec::Claude),
            "codex" => Ok(AgentSpec::Codex),
            other => Err(format!(
                "unknown agent '{}' (expected claude, codex, llm:<model> or cmd:<command>)",
                other
            )),
        }
    }
}

/// Build the agent an `--agent-*` argument describes.
///
/// CLI agents run inside `working_dir` when one is given.
async fn build_agent(
    spec: &AgentSpec,
    llm: Option<&Arc<dyn LlmProvider>>,
    timeout: Duration,
    working_dir: Option<&Path>,
) -> anyhow::Result<Agent> {
    let mut generator = match spec {
        AgentSpec::Llm(model) => {
            let llm = llm
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("agent llm:{} needs an LLM provider", model))?;
            return Ok(Agent::from_generator(Arc::new(LlmGenerator::new(
                llm,
                model.clone(),
            ))));
        }
        AgentSpec::Claude => CliGenerator::claude(),
        AgentSpec::Codex => CliGenerator::codex(),
        AgentSpec::Command(line) => CliGenerator::from_command_line(line)
            .ok_or_else(|| anyhow::anyhow!("empty agent command"))?
            .with_name(format!("cmd:{}", line)),
    };

    generator = generator.with_timeout(timeout).with_env("NO_COLOR", "1");
    if let Some(dir) = working_dir {
        generator = generator.with_working_dir(dir);
    }
    if !generator.is_available().await {
        warn!(
            agent = generator.name(),
            command = generator.command(),
            "Agent command did not answer --version, attempts may fail as unavailable"
        );
    }
    Ok(Agent::from_generator(Arc::new(generator)))
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and execute the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Execute the parsed command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_eval_command(args).await,
        Commands::Fixtures(args) => run_fixtures_command(args).await,
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

async fn build_llm_client(
    api_key: Option<String>,
    model: String,
) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let resolved_api_key = api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
        .or_else(|| std::env::var("LITELLM_API_KEY").ok());

    if let Some(key) = resolved_api_key {
        info!(model = %model, "Using OpenRouter with specified API key");
        Ok(Arc::new(OpenRouterProvider::with_model(key, model)?))
    } else {
        info!("Using LiteLLM client from environment");
        Ok(Arc::new(LiteLlmClient::from_env().map_err(|e| {
            anyhow::anyhow!(
                "Failed to initialize LLM client: {}. \
                 Please provide --api-key, set OPENROUTER_API_KEY/LITELLM_API_KEY, or pass --offline.",
                e
            )
        })?))
    }
}

fn resolve_config(args: &RunArgs) -> anyhow::Result<EvalConfig> {
    let mut config = EvalConfig::from_env().context("Invalid EVAL_* environment configuration")?;

    if let Some(dir) = &args.fixtures_dir {
        config.fixtures_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    if let Some(model) = &args.judge_model {
        config.judge_model = model.clone();
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    if let Some(secs) = args.timeout_secs {
        config.generator_timeout = Duration::from_secs(secs);
    }
    if args.no_baseline {
        config.compare_baseline = false;
    }

    config.validate()?;
    Ok(config)
}

async fn run_eval_command(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let spec_a: AgentSpec = args.agent_a.parse().map_err(anyhow::Error::msg)?;
    let spec_b: AgentSpec = args.agent_b.parse().map_err(anyhow::Error::msg)?;

    if args.metrics_file.is_some() {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let llm = if !args.offline || spec_a.needs_llm() || spec_b.needs_llm() {
        Some(build_llm_client(args.api_key.clone(), config.judge_model.clone()).await?)
    } else {
        None
    };

    let judge: Arc<dyn Judge> = match (&llm, args.offline) {
        (Some(llm), false) => Arc::new(
            LlmJudge::new(llm.clone(), config.judge_model.clone())
                .with_temperature(config.judge_temperature)
                .with_max_tokens(config.judge_max_tokens),
        ),
        _ => {
            warn!("Running offline: every attempt uses inline scoring and results use fallback scoring");
            Arc::new(UnavailableJudge::new("offline mode"))
        }
    };

    let working_dir = args.git_repo.as_deref();
    let agent_a = build_agent(&spec_a, llm.as_ref(), config.generator_timeout, working_dir).await?;
    let agent_b = build_agent(&spec_b, llm.as_ref(), config.generator_timeout, working_dir).await?;

    let reporter = Arc::new(FileReporter::new(&config.output_dir));
    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();

    let runner = EvalRunner::new(agent_a, agent_b, judge, reporter.clone(), &config)?
        .with_shutdown(shutdown);

    let comparisons = if let Some(repo) = &args.git_repo {
        let mut source = GitFixtureSource::new(repo, WORKING_TREE_FIXTURE);
        if let Some(expected) = &args.expected_type {
            source = source.with_expected_type(expected.clone());
        }
        runner.run_from_source(&source, &[]).await?
    } else {
        let source = DirectoryFixtures::new(&config.fixtures_dir);
        runner.run_from_source(&source, &args.fixtures).await?
    };

    if args.update_baseline {
        for comparison in comparisons.iter().filter(|c| c.is_complete()) {
            if let Err(e) = reporter.save_baseline(comparison).await {
                warn!(fixture = %comparison.fixture, error = %e, "Failed to save baseline");
            }
        }
    }

    if let Some(path) = &args.metrics_file {
        std::fs::write(path, export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "Metrics written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&comparisons)?);
    } else {
        print_summary(&comparisons, &config);
    }
    Ok(())
}

fn print_summary(comparisons: &[EvalComparison], config: &EvalConfig) {
    println!();
    println!("{:<28} {:>12} {:>12}  Winner", "Fixture", "Agent A", "Agent B");
    println!("{}", "-".repeat(68));
    for c in comparisons {
        let cell = |r: Option<&crate::eval::EvalResult>| {
            r.map(|r| format!("{:.2} {}", r.final_score(), r.success_rate()))
                .unwrap_or_else(|| "n/a".to_string())
        };
        println!(
            "{:<28} {:>12} {:>12}  {}",
            c.fixture,
            cell(c.agent_a_result.as_ref()),
            cell(c.agent_b_result.as_ref()),
            c.winner_name().unwrap_or("none")
        );
    }
    println!();
    println!(
        "Report: {}",
        config.output_dir.join("reports").join("latest.md").display()
    );
}

// ============================================================================
// Fixtures Command Implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct FixtureEntry {
    name: String,
    description: String,
    expected_type: String,
    fingerprint: Option<String>,
    error: Option<String>,
}

async fn run_fixtures_command(args: FixturesArgs) -> anyhow::Result<()> {
    let source = DirectoryFixtures::new(&args.fixtures_dir);
    let names = source
        .list()
        .await
        .with_context(|| format!("Failed to list fixtures in {}", args.fixtures_dir.display()))?;

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let entry = match source.load(&name).await {
            Ok(fixture) => FixtureEntry {
                fingerprint: Some(fixture.fingerprint()),
                name: fixture.name,
                description: fixture.description,
                expected_type: fixture.expected_type,
                error: None,
            },
            Err(e) => FixtureEntry {
                name,
                description: String::new(),
                expected_type: String::new(),
                fingerprint: None,
                error: Some(e.to_string()),
            },
        };
        entries.push(entry);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No fixtures found in {}", args.fixtures_dir.display());
        return Ok(());
    }
    for entry in &entries {
        match &entry.error {
            Some(error) => println!("{:<28} INVALID: {}", entry.name, error),
            None => println!(
                "{:<28} {:<10} {}",
                entry.name,
                if entry.expected_type.is_empty() { "-" } else { &entry.expected_type },
                entry.description
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_spec_parse() {
        assert_eq!("claude".parse::<AgentSpec>(), Ok(AgentSpec::Claude));
        assert_eq!(" codex ".parse::<AgentSpec>(), Ok(AgentSpec::Codex));
        assert_eq!(
            "llm:openai/gpt-4o".parse::<AgentSpec>(),
            Ok(AgentSpec::Llm("openai/gpt-4o".to_string()))
        );
        assert_eq!(
            "cmd:./my-agent --fast".parse::<AgentSpec>(),
            Ok(AgentSpec::Command("./my-agent --fast".to_string()))
        );
        assert!("llm:".parse::<AgentSpec>().is_err());
        assert!("gemini".parse::<AgentSpec>().is_err());
    }

    #[tokio::test]
    async fn test_build_agent_names() {
        let timeout = Duration::from_secs(5);
        let claude = build_agent(&AgentSpec::Claude, None, timeout, None)
            .await
            .expect("claude");
        assert_eq!(claude.name(), "claude");

        let custom = build_agent(&AgentSpec::Command("true -q".into()), None, timeout, None)
            .await
            .expect("cmd");
        assert_eq!(custom.name(), "cmd:true -q");

        assert!(build_agent(&AgentSpec::Llm("m".into()), None, timeout, None)
            .await
            .is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "commit-eval",
            "run",
            "--agent-b",
            "llm:openai/gpt-4o",
            "--fixture",
            "simple",
            "--fixture",
            "rename",
            "--failure-policy",
            "abort",
            "--offline",
        ])
        .expect("valid arguments");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.agent_a, "claude");
                assert_eq!(args.fixtures, vec!["simple", "rename"]);
                assert_eq!(args.failure_policy, Some(FailurePolicy::AbortRun));
                assert!(args.offline);
            }
            Commands::Fixtures(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn test_expected_type_requires_git_repo() {
        let result = Cli::try_parse_from(["commit-eval", "run", "--expected-type", "feat"]);
        assert!(result.is_err());
    }
}
