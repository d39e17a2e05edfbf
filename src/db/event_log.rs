use async_trait::async_trait;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use super::LedgerStore;
use crate::error::{FeedbackError, Result};
use crate::models::{format_timestamp, parse_timestamp, Category, LedgerRecord, VoteEvent, VoteTally};

/// Append-only ledger: one immutable row per vote.
///
/// Totals and month buckets are both derived by folding the rows, so a month
/// filter sees every vote cast in that month rather than just the last write.
pub struct SqliteEventLog {
    pool: SqlitePool,
    url: String,
}

impl SqliteEventLog {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| FeedbackError::Config(format!("invalid database url {}: {}", url, e)))?
            .create_if_missing(true);

        // In-memory databases live and die with their connection
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| FeedbackError::storage_read(url, e))?;

        Self::init_schema(&pool)
            .await
            .map_err(|e| FeedbackError::storage_read(url, e))?;

        info!("Connected to vote event log at {}", url);
        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    async fn init_schema(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vote_events (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                cast_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vote_events_cast_at ON vote_events(cast_at)")
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteEventLog {
    async fn persist(&self, _tally: &VoteTally, events: &[VoteEvent]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FeedbackError::persistence(&self.url, e))?;

        // Event ids are unique, so replaying an event that did land is a no-op
        for event in events {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO vote_events (id, category, cast_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(event.id.to_string())
            .bind(event.category.label())
            .bind(format_timestamp(&event.cast_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| FeedbackError::persistence(&self.url, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| FeedbackError::persistence(&self.url, e))?;

        debug!("Appended {} vote(s) to {}", events.len(), self.url);
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<LedgerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category, cast_at
            FROM vote_events
            ORDER BY cast_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FeedbackError::storage_read(&self.url, e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get::<String, _>("id");
            let category_str = row.get::<String, _>("category");
            let cast_at_str = row.get::<String, _>("cast_at");

            let category = category_str.parse::<Category>().map_err(|_| {
                FeedbackError::storage_read(&self.url, format!("event {}: unknown category {:?}", id, category_str))
            })?;
            let timestamp = parse_timestamp(&cast_at_str).map_err(|e| {
                FeedbackError::storage_read(&self.url, format!("event {}: bad cast_at {:?}: {}", id, cast_at_str, e))
            })?;

            records.push(LedgerRecord {
                category,
                count: 1,
                timestamp,
            });
        }

        Ok(records)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
