mod session;

pub use session::{parse_line, run_session, SessionLine};

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{Backend, Config};
use crate::db::LedgerStore;
use crate::error::{FeedbackError, Result};
use crate::handlers::{handle_request, Request, Response};
use crate::tasks::writer::spawn_writer;
use crate::voting::{ReportEngine, VoteLedger};

#[derive(Debug, Parser)]
#[command(name = "feedback-tally", about = "Collect satisfaction votes and report on them")]
pub struct Cli {
    /// Storage backend: csv (snapshot file) or sqlite (event log)
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Path of the snapshot ledger file
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// SQLite url for the event log
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cast one vote (Insatisfeito, Neutro or Satisfeito)
    Vote { category: String },
    /// Show totals and percentages
    Report {
        /// Month to filter on, 1-12; 0 for every month
        #[arg(long, default_value_t = 0)]
        month: u32,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read vote/report requests from stdin until EOF or `quit`
    Session,
}

impl Cli {
    // Flags win over the environment
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(path) = &self.ledger {
            config.ledger_path = path.clone();
        }
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        config
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let config = cli.apply(config);
    config.validate()?;
    let store = config.open_store().await?;
    let reports = ReportEngine::new(store.clone());

    match cli.command {
        // Reports read the store directly, so a bad ledger still degrades
        // to an empty report instead of failing here
        Command::Report { month, json } => {
            let response = handle_request(None, &reports, Request::Report { month }).await?;
            match response {
                Response::Report(report) if json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                other => print!("{}", other.message()),
            }
        }
        Command::Vote { category } => {
            let (handle, writer) = spawn_writer(open_ledger(&config, store).await?);
            let response = handle_request(Some(&handle), &reports, Request::Cast { category }).await;
            drop(handle);
            join_writer(writer).await;
            println!("{}", response?.message());
        }
        Command::Session => {
            // An unreadable ledger turns the session into report-only
            // rather than overwriting the file with a fresh tally
            let writer = match open_ledger(&config, store).await {
                Ok(ledger) => Some(spawn_writer(ledger)),
                Err(e @ FeedbackError::StorageRead { .. }) => {
                    warn!("Session starts without voting: {}", e);
                    eprintln!("Warning: {} (votes are disabled, reports still work)", e);
                    None
                }
                Err(e) => return Err(e),
            };

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            let result = run_session(writer.as_ref().map(|(h, _)| h), &reports, stdin, stdout).await;

            if let Some((handle, task)) = writer {
                drop(handle);
                join_writer(task).await;
            }
            result?;
        }
    }

    info!("Done");
    Ok(())
}

// Honours FEEDBACK_RESUME for the snapshot file
pub async fn open_ledger(config: &Config, store: Arc<dyn LedgerStore>) -> Result<VoteLedger> {
    if config.resume {
        VoteLedger::open(store).await
    } else {
        Ok(VoteLedger::new(store))
    }
}

// Let the writer drain before exiting
async fn join_writer(writer: JoinHandle<()>) {
    if writer.await.is_err() {
        warn!("Ledger writer ended abnormally");
    }
}
