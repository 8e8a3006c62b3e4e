//! commit-metrics command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commit_metrics::history::StoreShape;
use commit_metrics::metrics::{CommandTestRunner, DEFAULT_BUILD_MANIFEST};
use commit_metrics::pipeline::{IngestConfig, IngestError, Pipeline};
use commit_metrics::sequence::SequenceLog;
use commit_metrics::vcs::{CommitRef, DEFAULT_REMOTE, HEAD_MARKER};

#[derive(Debug, Parser)]
#[command(author, version, about = "Record per-commit test and coverage metrics in a Git-backed store")]
struct Cli {
    #[arg(short, long, global = true, help = "Log at debug level unless RUST_LOG says otherwise")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assemble metrics for a commit and store them
    Ingest {
        #[command(flatten)]
        target: Target,

        #[arg(default_value = HEAD_MARKER, help = "Commit hash, or HEAD for the checked-out commit")]
        reference: CommitRef,

        #[arg(long, default_value = DEFAULT_REMOTE, help = "Remote whose URL identifies the repository")]
        remote: String,

        #[arg(long, default_value = DEFAULT_BUILD_MANIFEST, help = "File whose presence enables the test run")]
        manifest: String,

        #[arg(
            long,
            help = "Test command; {report} is replaced by the report path (default: npx jest with coverage)"
        )]
        test_command: Option<String>,

        #[arg(long, help = "Append a commit marker to this sequence log")]
        sequence_log: Option<PathBuf>,

        #[arg(long, help = "Print the ingestion report as JSON")]
        json: bool,
    },

    /// Print the test-run id the next run should report under
    TestId {
        #[arg(help = "Sequence log (created as [] when absent)")]
        log: PathBuf,

        #[arg(long, help = "Also append a test-run marker with the id")]
        record: bool,
    },

    /// Show what the store holds for a branch
    Branch {
        #[command(flatten)]
        target: Target,

        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
    },
}

#[derive(Debug, Args)]
struct Target {
    #[arg(long, default_value = ".", help = "Working tree to read")]
    workdir: PathBuf,

    #[arg(long, env = "COMMIT_METRICS_STORE", default_value = ".commit-metrics")]
    store: PathBuf,

    #[arg(long, env = "COMMIT_METRICS_SHAPE", value_enum, default_value_t = StoreShape::Normalized)]
    shape: StoreShape,

    #[arg(long, help = "Branch to record under (default: the checked-out branch, else main)")]
    branch: Option<String>,

    #[arg(long = "user", env = "COMMIT_METRICS_USER", default_value = "anonymous")]
    user_id: String,

    #[arg(long, help = "Repository name (default: derived from the remote URL)")]
    repo_name: Option<String>,
}

impl Target {
    fn config(&self) -> IngestConfig {
        let mut config = IngestConfig::new(&self.workdir)
            .store_path(&self.store)
            .shape(self.shape)
            .user_id(self.user_id.clone());
        if let Some(branch) = &self.branch {
            config = config.branch(branch.clone());
        }
        if let Some(name) = &self.repo_name {
            config = config.repo_name(name.clone());
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<IngestError>().is_some_and(IngestError::is_conflict) {
                eprintln!("another writer updated the store; rerunning the command is safe");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Ingest {
            target,
            reference,
            remote,
            manifest,
            test_command,
            sequence_log,
            json,
        } => {
            let mut config = target.config().remote(remote).build_manifest(manifest);
            if let Some(line) = test_command {
                let runner = CommandTestRunner::from_command_line(&line).context("--test-command is empty")?;
                config = config.test_command(runner);
            }
            if let Some(path) = sequence_log {
                config = config.sequence_log(path);
            }

            // dropped at the end of this arm, releasing the store on every path
            let pipeline = Pipeline::open(config)?;
            let report = pipeline
                .ingest(&reference)
                .with_context(|| format!("ingesting {}", reference))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let metrics = &report.metrics;
                println!(
                    "{} on {}: {} ({} tests, {} failed, {:.2}% coverage, +{} -{})",
                    metrics.commit_id().short(),
                    report.branch,
                    metrics.conclusion().as_str(),
                    metrics.test_count(),
                    metrics.failed_tests(),
                    metrics.coverage(),
                    metrics.diff_stats().additions,
                    metrics.diff_stats().deletions,
                );
                for degradation in &report.degradations {
                    println!("  degraded: {}", degradation);
                }
            }
            Ok(())
        }

        Command::TestId { log, record } => {
            let log = SequenceLog::open(&log)?;
            let id = log.next_test_run_id()?;
            if record {
                log.record_test_run(id.clone())?;
            }
            println!("{}", id);
            Ok(())
        }

        Command::Branch { target, remote } => {
            let config = target.config().remote(remote).create_if_missing(false);
            let pipeline = Pipeline::open(config)?;
            match pipeline.branch_state()? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("no commits recorded for this branch"),
            }
            Ok(())
        }
    }
}
