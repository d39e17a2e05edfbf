use log::info;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::{CsvSnapshotStore, LedgerStore, SqliteEventLog};
use crate::error::{FeedbackError, Result};

pub const DEFAULT_LEDGER_PATH: &str = "votos.csv";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:feedback.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    // Three-row snapshot file
    Csv,
    // Append-only vote events
    Sqlite,
}

impl std::str::FromStr for Backend {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Backend::Csv),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(FeedbackError::Config(format!(
                "unknown backend {:?} (expected csv or sqlite)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub ledger_path: PathBuf,
    pub database_url: String,
    // Start from the stored totals instead of a zero tally
    pub resume: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Csv,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            resume: true,
        }
    }
}

impl Config {
    // Process environment, after main has loaded `.env`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(backend) = lookup("FEEDBACK_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup("FEEDBACK_LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(resume) = lookup("FEEDBACK_RESUME") {
            config.resume = match resume.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(FeedbackError::Config(format!(
                        "FEEDBACK_RESUME must be true or false, got {:?}",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    // The event log keeps every vote, so a zero start would disagree with it
    // from the first cast on
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Sqlite && !self.resume {
            return Err(FeedbackError::Config(
                "FEEDBACK_RESUME=false only applies to the csv backend; the sqlite event log always resumes"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub async fn open_store(&self) -> Result<Arc<dyn LedgerStore>> {
        match self.backend {
            Backend::Csv => {
                info!("Using snapshot ledger file {}", self.ledger_path.display());
                Ok(Arc::new(CsvSnapshotStore::new(&self.ledger_path)))
            }
            Backend::Sqlite => {
                let log = SqliteEventLog::connect(&self.database_url).await?;
                Ok(Arc::new(log))
            }
        }
    }
}
