use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ores_scoring::{worker, Config, ConfiguredScoringSystem, PrecachedScorer, ScoringSystem};

mod job;
use job::{Job, JobOutput};

#[derive(Debug, Parser)]
#[command(name = "ores-scoring", version, about)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score one job file with a configured scoring system and print the
    /// results as JSON.
    Score {
        #[clap(short, long)]
        config: PathBuf,

        /// Name of the scoring system section to use.
        #[clap(short, long)]
        system: String,

        #[clap(short, long)]
        job: PathBuf,
    },
    /// Serve the worker protocol on stdin/stdout.
    Worker,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ores_scoring=debug,ores_scoring_cli=info".into()
            }),
        )
        // stdout carries results and the worker protocol
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Score {
            config,
            system,
            job,
        } => score(&config, &system, &job).await,
        Command::Worker => {
            tokio::task::spawn_blocking(|| worker::serve_stdio(&PrecachedScorer)).await??;
            Ok(())
        }
    }
}

async fn score(config_path: &Path, system_name: &str, job_path: &Path) -> Result<()> {
    let config = Config::from_path(config_path)?.scoring_system(system_name)?;
    let job = Job::from_path(job_path)?;

    tracing::info!("Scoring {} with '{}'", job.request, system_name);
    let system = ConfiguredScoringSystem::from_config(&config, PrecachedScorer)?;
    let (scores, errors) = system
        .process_missing_scores(
            &job.request,
            &job.missing_model_set_revs(),
            job.root_caches(),
            None,
        )
        .await?;
    tracing::info!(
        "Scored {} revision(s), {} with errors",
        scores.len(),
        errors.len()
    );

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &JobOutput::new(scores, errors))?;
    writeln!(stdout)?;

    Ok(())
}
