//! `cogito` — drive an in-process thinking-session store from the command line.

mod config;
mod script;
mod stress;

use clap::{Parser, Subcommand, ValueEnum};
use cogito_session::{InMemorySessionStore, ThinkingService};
use config::CogitoConfig;
use script::ScriptRunner;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cogito", about = "Cogito — versioned sequential thinking sessions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "cogito.toml")]
    config: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a JSON-lines script of session commands
    Run {
        /// Script file; reads stdin when omitted or "-"
        script: Option<PathBuf>,
    },
    /// Fire concurrent appends at one session and check nothing was lost
    Stress {
        /// Number of concurrent append tasks
        #[arg(short, long, default_value_t = 100)]
        tasks: usize,
        /// Problem statement for the stress session
        #[arg(long, default_value = "stress test")]
        problem: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = CogitoConfig::load(&cli.config).await?;
    info!(
        max_sessions = ?config.store.max_sessions,
        max_retries = config.retry.max_retries,
        "Initializing session store"
    );

    let store = Arc::new(InMemorySessionStore::with_config(
        config.store.clone(),
        config.retry.clone(),
    ));
    let service = ThinkingService::new(store, config.thinking.clone());

    match cli.command {
        Commands::Run { script } => {
            let mut runner = ScriptRunner::new(service);
            let mut stdout = std::io::stdout().lock();
            let report = match script.filter(|p| p.as_os_str() != "-") {
                Some(path) => {
                    let file = tokio::fs::File::open(&path).await.map_err(|e| {
                        anyhow::anyhow!("Failed to open script '{}': {}", path.display(), e)
                    })?;
                    runner.run(BufReader::new(file), &mut stdout).await?
                }
                None => {
                    runner
                        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
                        .await?
                }
            };
            info!(
                executed = report.executed,
                failed = report.failed,
                "Script finished"
            );
        }
        Commands::Stress { tasks, problem } => {
            let report = stress::run_stress(&service, tasks, problem).await?;
            println!("{report}");
            if !report.consistent {
                anyhow::bail!("stress run left session {} inconsistent", report.session_id);
            }
        }
    }

    Ok(())
}
