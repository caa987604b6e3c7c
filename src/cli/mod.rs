//! Command-line interface for chainpm.
//!
//! Provides commands for running a job file against a chain and for
//! inspecting the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::{HttpCompiler, HttpKeyClient, HttpNodeClient};
use crate::config::{self, parse_assignment, ResolvedConfig};
use crate::core::{
    write_results, DuplicatePolicy, JobDocument, JobRunner, OutputFormat, RunContext, RunDefaults,
    RunPaths,
};
use crate::domain::{RunState, RunSummary};

/// chainpm - Deployment job runner for blockchain projects
#[derive(Parser, Debug)]
#[command(name = "chainpm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job file against the chain
    Run(RunArgs),

    /// Show resolved configuration (debug)
    Config,
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Job file to run
    #[arg(default_value = "epm.yaml")]
    pub file: PathBuf,

    /// Account to sign with before the first job
    #[arg(short, long)]
    pub address: Option<String>,

    /// Record key=value before the first job (repeatable)
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub sets: Vec<String>,

    /// Default amount for jobs that leave it empty
    #[arg(long)]
    pub amount: Option<String>,

    /// Default fee for jobs that leave it empty
    #[arg(long)]
    pub fee: Option<String>,

    /// Default gas for jobs that leave it empty
    #[arg(long)]
    pub gas: Option<String>,

    /// Overwrite results of duplicate job names without asking
    #[arg(long, conflicts_with = "skip_duplicates")]
    pub overwrite: bool,

    /// Skip jobs whose name was already run without asking
    #[arg(long)]
    pub skip_duplicates: bool,

    /// Write results to a file in this format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputArg>,

    /// Where to write results (defaults to jobs_output.json / jobs_output.csv)
    #[arg(long, requires = "output")]
    pub output_file: Option<PathBuf>,

    /// Directory holding contract sources
    #[arg(long)]
    pub contracts_path: Option<PathBuf>,

    /// Directory for ABI files
    #[arg(long)]
    pub abi_path: Option<PathBuf>,

    /// Directory for compiled bytecode
    #[arg(long)]
    pub bin_path: Option<PathBuf>,

    /// Chain node URL
    #[arg(long)]
    pub node_url: Option<String>,

    /// Key-signing daemon URL
    #[arg(long)]
    pub keys_url: Option<String>,

    /// Compiler service URL
    #[arg(long)]
    pub compiler_url: Option<String>,
}

/// Result file format (for CLI)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Json,
    Csv,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Json => OutputFormat::Json,
            OutputArg::Csv => OutputFormat::Csv,
        }
    }
}

/// Everything a run needs, after flags are layered over configuration
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub node_url: String,
    pub keys_url: String,
    pub compiler_url: String,
    pub paths: RunPaths,
    pub defaults: RunDefaults,
    pub default_address: Option<String>,
    pub default_sets: Vec<(String, String)>,
    pub policy: DuplicatePolicy,
    pub output: Option<(OutputFormat, PathBuf)>,
}

impl RunArgs {
    /// Layer these flags over the resolved configuration
    pub fn settings(&self, cfg: &ResolvedConfig) -> Result<RunSettings> {
        let mut default_sets = cfg.default_sets.clone();
        for assignment in &self.sets {
            default_sets.push(
                parse_assignment(assignment)
                    .with_context(|| format!("Invalid --set value '{}'", assignment))?,
            );
        }

        let policy = if self.overwrite {
            DuplicatePolicy::Overwrite
        } else if self.skip_duplicates {
            DuplicatePolicy::Skip
        } else {
            DuplicatePolicy::Prompt
        };

        let output = self.output.map(|arg| {
            let format = OutputFormat::from(arg);
            let path = self
                .output_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(format.default_file_name()));
            (format, path)
        });

        Ok(RunSettings {
            node_url: pick(&self.node_url, &cfg.endpoints.node),
            keys_url: pick(&self.keys_url, &cfg.endpoints.keys),
            compiler_url: pick(&self.compiler_url, &cfg.endpoints.compiler),
            paths: RunPaths {
                contracts: self
                    .contracts_path
                    .clone()
                    .unwrap_or_else(|| cfg.paths.contracts.clone()),
                abi: self.abi_path.clone().unwrap_or_else(|| cfg.paths.abi.clone()),
                bin: self.bin_path.clone().unwrap_or_else(|| cfg.paths.bin.clone()),
            },
            defaults: RunDefaults {
                amount: pick(&self.amount, &cfg.defaults.amount),
                fee: pick(&self.fee, &cfg.defaults.fee),
                gas: pick(&self.gas, &cfg.defaults.gas),
            },
            default_address: self
                .address
                .clone()
                .or_else(|| cfg.default_address.clone()),
            default_sets,
            policy,
            output,
        })
    }
}

fn pick(flag: &Option<String>, configured: &str) -> String {
    flag.clone().unwrap_or_else(|| configured.to_string())
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => run_jobs(args).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Run a job file
async fn run_jobs(args: RunArgs) -> Result<()> {
    let cfg = config::config()?;
    let settings = args.settings(cfg)?;

    let document = JobDocument::from_file(&args.file)?;
    document.validate()?;

    let mut ctx = RunContext::new(
        Arc::new(HttpNodeClient::new(settings.node_url.clone())),
        Arc::new(HttpKeyClient::new(settings.keys_url.clone())),
        Arc::new(HttpCompiler::new(settings.compiler_url.clone())),
    )
    .with_defaults(settings.defaults.clone())
    .with_paths(settings.paths.clone());

    ctx.fetch_chain_id()
        .await
        .with_context(|| format!("Failed to connect to chain node at {}", settings.node_url))?;

    let mut runner = JobRunner::new(settings.policy)
        .with_default_address(settings.default_address.clone())
        .with_default_sets(settings.default_sets.clone());

    let outcome = runner.run(&mut ctx, document.jobs).await;
    let summary: &RunSummary = match &outcome {
        Ok(summary) => summary,
        Err(failure) => &failure.summary,
    };

    if let Some((format, path)) = &settings.output {
        write_results(path, *format, summary, &ctx.results)?;
    }

    match &summary.state {
        RunState::Completed => {
            for (name, results) in ctx.results.iter() {
                println!("{}: {}", name, results.full_result.string_result);
            }
            eprintln!(
                "\n[Run {} completed successfully: {} jobs recorded]",
                summary.id,
                summary.recorded_count()
            );
        }
        RunState::Failed { job, error } => {
            eprintln!("\n[Run {} failed at job {}: {}]", summary.id, job, error);
            std::process::exit(1);
        }
        RunState::Running => {
            eprintln!("\n[Run {} in state: {:?}]", summary.id, summary.state);
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("chainpm configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Contracts: {}", cfg.paths.contracts.display());
    println!("  ABI:       {}", cfg.paths.abi.display());
    println!("  Bin:       {}", cfg.paths.bin.display());
    println!();
    println!("Endpoints:");
    println!("  Node:     {}", cfg.endpoints.node);
    println!("  Keys:     {}", cfg.endpoints.keys);
    println!("  Compiler: {}", cfg.endpoints.compiler);
    println!();
    println!("Defaults:");
    println!(
        "  Address: {}",
        cfg.default_address.as_deref().unwrap_or("(none)")
    );
    println!("  Amount:  {}", cfg.defaults.amount);
    println!("  Fee:     {}", cfg.defaults.fee);
    println!("  Gas:     {}", cfg.defaults.gas);
    if cfg.default_sets.is_empty() {
        println!("  Sets:    (none)");
    } else {
        for (key, value) in &cfg.default_sets {
            println!("  Set:     {}={}", key, value);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            home: PathBuf::from("/tmp/.chainpm"),
            paths: RunPaths::default(),
            endpoints: config::Endpoints::default(),
            defaults: RunDefaults::default(),
            default_address: Some("AAAA".to_string()),
            default_sets: vec![("a".to_string(), "1".to_string())],
            config_file: None,
        }
    }

    #[test]
    fn test_run_args_parsing() {
        let cli = Cli::try_parse_from([
            "chainpm",
            "run",
            "deploy.yaml",
            "--set",
            "b=2",
            "--overwrite",
            "--output",
            "csv",
            "--gas",
            "42",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };
        let settings = args.settings(&resolved()).unwrap();

        assert_eq!(args.file, PathBuf::from("deploy.yaml"));
        assert_eq!(settings.policy, DuplicatePolicy::Overwrite);
        assert_eq!(settings.defaults.gas, "42");
        assert_eq!(settings.defaults.fee, "1234");
        assert_eq!(
            settings.default_sets,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        assert_eq!(
            settings.output,
            Some((OutputFormat::Csv, PathBuf::from("jobs_output.csv")))
        );
    }

    #[test]
    fn test_flags_override_config() {
        let args = RunArgs {
            address: Some("BBBB".to_string()),
            node_url: Some("http://node:1".to_string()),
            skip_duplicates: true,
            ..Default::default()
        };
        let settings = args.settings(&resolved()).unwrap();
        assert_eq!(settings.default_address, Some("BBBB".to_string()));
        assert_eq!(settings.node_url, "http://node:1");
        assert_eq!(settings.keys_url, config::DEFAULT_KEYS_URL);
        assert_eq!(settings.policy, DuplicatePolicy::Skip);
        assert!(settings.output.is_none());
    }

    #[test]
    fn test_invalid_set_is_rejected() {
        let args = RunArgs {
            sets: vec!["missing-equals".to_string()],
            ..Default::default()
        };
        assert!(args.settings(&resolved()).is_err());
    }

    #[test]
    fn test_default_job_file() {
        let cli = Cli::try_parse_from(["chainpm", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };
        assert_eq!(args.file, PathBuf::from("epm.yaml"));
    }
}
