//! # relearnweb CLI
//!
//! Command-line front end for the research pipeline.
//!
//! ## Quick Start
//! ```bash
//! relearnweb settings set LLM_ENDPOINT=https://api.openai.com/v1 LLM_API_KEY=sk-... \
//!     LLM_MODEL_ID=gpt-4o-mini FIRECRAWL_API_KEY=fc-...
//! relearnweb research --depth 1 "Quantum Computing breakthroughs"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relearnweb::config::SETTING_KEYS;
use relearnweb::feedback::{follow_up_questions, DEFAULT_QUESTIONS};
use relearnweb::pipeline::Node;
use relearnweb::session::progress_percent;
use relearnweb::settings::mask_secret;
use relearnweb::{
    Config, OpenAiCompatClient, ResearchError, ResearchParams, ResearchPipeline, ResearchSession,
    SessionObserver, SessionOutcome, SettingsFile, StateField, StopFlag,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "relearnweb",
    version,
    about = "Research and learn the web: iterative LLM research with a markdown report",
    long_about = r#"
relearnweb runs an iterative research loop:
  1. Outline the query with an LLM
  2. Turn the outline into a search query
  3. Crawl the search results with Firecrawl and summarize them
  4. List the next directions and repeat DEPTH more times
  5. Write a markdown report

PREREQUISITES:
  An OpenAI-compatible chat completions endpoint and a Firecrawl API key,
  configured with `relearnweb settings set` or in a .env file.

EXAMPLES:
  relearnweb research "Quantum Computing breakthroughs"
  relearnweb research --depth 2 --output quantum.md "Quantum error correction"
  relearnweb clarify "Rust web frameworks"
  relearnweb settings show
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Dotenv file holding the service settings
    #[arg(long = "env-file", value_name = "PATH", default_value = ".env", global = true)]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the research pipeline and export the report
    Research {
        /// The topic to research
        #[arg(value_name = "QUERY")]
        query: String,

        /// Number of refinement iterations after the first pass
        #[arg(
            short = 'd',
            long = "depth",
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(0..=10)
        )]
        depth: u32,

        /// Advisory search breadth shown to the model
        #[arg(
            short = 'b',
            long = "breadth",
            default_value_t = 3,
            value_parser = clap::value_parser!(u32).range(1..=10)
        )]
        breadth: u32,

        /// Where to write the final markdown report
        #[arg(short = 'o', long = "output", default_value = "research_report.md")]
        output: PathBuf,

        /// Only print progress and the final report
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,
    },

    /// Suggest follow-up questions that sharpen a research query
    Clarify {
        /// The query to clarify
        #[arg(value_name = "QUERY")]
        query: String,

        /// Maximum number of questions
        #[arg(short = 'n', long = "questions", default_value_t = DEFAULT_QUESTIONS)]
        questions: usize,
    },

    /// Show or change the persisted service settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings with API keys masked
    Show,

    /// Set one or more settings
    Set {
        #[arg(value_name = "KEY=VALUE", required = true, value_parser = parse_key_value)]
        pairs: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if !SETTING_KEYS.contains(&key) {
        return Err(format!(
            "unknown setting '{}'; expected one of {}",
            key,
            SETTING_KEYS.join(", ")
        ));
    }
    Ok((key.to_string(), value.to_string()))
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    match args.command {
        Command::Research {
            query,
            depth,
            breadth,
            output,
            quiet,
        } => {
            let params = ResearchParams {
                query,
                depth,
                breadth,
            };
            run_research(&args.env_file, params, &output, quiet).await
        }
        Command::Clarify { query, questions } => {
            run_clarify(&args.env_file, &query, questions).await
        }
        Command::Settings { action } => run_settings(&args.env_file, action),
    }
}

async fn run_research(
    env_file: &Path,
    params: ResearchParams,
    output: &Path,
    quiet: bool,
) -> Result<()> {
    let config = Config::from_env(Some(env_file))?;
    let pipeline = ResearchPipeline::from_config(&config).map_err(report_failure)?;

    info!(
        query = %params.query,
        depth = params.depth,
        breadth = params.breadth,
        "Research starting"
    );

    let mut session = ResearchSession::new(params);
    let stop = session.stop_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&stop) {
                Interrupt::Stop => {
                    eprintln!("\nStopping after the current step... (Ctrl-C again to abort)");
                }
                Interrupt::Abort => {
                    eprintln!("\nAborting.");
                    std::process::exit(130);
                }
            }
        }
    });

    let mut observer = ConsoleObserver { quiet };
    let outcome = session
        .drive(&pipeline, &mut observer)
        .await
        .map_err(report_failure)?;

    match outcome {
        SessionOutcome::Completed { report, steps } => {
            std::fs::write(output, &report)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
            println!("\n{}", "=".repeat(60));
            println!("Research completed in {} steps.", steps);
            println!("Report exported to {}", output.display());
            println!("{}", "=".repeat(60));
            info!(path = %output.display(), "Report exported");
        }
        SessionOutcome::Stopped { steps, .. } => {
            println!("\nResearch stopped by user after {} steps.", steps);
        }
    }

    Ok(())
}

async fn run_clarify(env_file: &Path, query: &str, questions: usize) -> Result<()> {
    let config = Config::from_env(Some(env_file))?;
    let client = OpenAiCompatClient::from_config(&config).map_err(report_failure)?;

    let questions = follow_up_questions(&client, query, questions)
        .await
        .map_err(report_failure)?;

    if questions.is_empty() {
        println!("The query is clear; no follow-up questions.");
    }
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {}", i + 1, question);
    }
    Ok(())
}

fn run_settings(env_file: &Path, action: SettingsAction) -> Result<()> {
    let file = SettingsFile::new(env_file);

    match action {
        SettingsAction::Show => {
            let settings = file.load()?;
            println!("Settings from {}:", file.path().display());
            for key in SETTING_KEYS {
                let value = settings.get(key).map(String::as_str).unwrap_or("");
                let shown = if value.is_empty() {
                    "(not set)".to_string()
                } else if key.contains("API_KEY") {
                    mask_secret(value)
                } else {
                    value.to_string()
                };
                println!("  {:<18} {}", key, shown);
            }
        }
        SettingsAction::Set { pairs } => {
            file.save(pairs)?;
            println!("Settings saved to {}", file.path().display());
        }
    }
    Ok(())
}

/// Log a research error, print a hint for it, and hand it back to `?`.
fn report_failure(e: ResearchError) -> anyhow::Error {
    error!(error = %e, "Research failed");
    eprintln!("\nResearch failed: {}", e);
    if let Some(hint) = e.hint() {
        eprintln!("Tip: {}", hint);
    }
    e.into()
}

// =============================================================================
// CONSOLE OUTPUT
// =============================================================================
struct ConsoleObserver {
    quiet: bool,
}

impl SessionObserver for ConsoleObserver {
    fn on_progress(&mut self, step: usize, total: usize, node: Node) {
        println!(
            "[{:>3}%] Task {} of {} completed ({})",
            progress_percent(step, total),
            step,
            total,
            node
        );
    }

    fn on_field_changed(&mut self, field: StateField, text: &str) {
        if self.quiet && field != StateField::Report {
            return;
        }
        if text.is_empty() {
            return;
        }
        println!("\n**{}:**\n\n{}\n", field.label(), text);
    }
}

// =============================================================================
// INTERRUPTS
// =============================================================================
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// First Ctrl-C: finish the running step, then stop.
    Stop,
    /// Ctrl-C while already stopping: exit now.
    Abort,
}

fn on_interrupt(stop: &StopFlag) -> Interrupt {
    if stop.is_raised() {
        Interrupt::Abort
    } else {
        stop.raise();
        Interrupt::Stop
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Logs go to stderr so stdout carries only research output.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
