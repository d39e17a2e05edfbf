use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::LedgerStore;
use crate::error::{FeedbackError, Result};
use crate::models::{format_timestamp, parse_timestamp, Category, LedgerRecord, VoteEvent, VoteTally};

const HEADERS: [&str; 3] = ["Opção", "Votos", "Data"];

// One line of the ledger file
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "Opção")]
    option: String,
    #[serde(rename = "Votos")]
    votes: u64,
    #[serde(rename = "Data")]
    date: String,
}

/// Flat comma-separated ledger holding one row per category.
///
/// Every cast replaces the whole file with the current tally, so the file
/// only ever shows the most recent write time for each category. Writes go
/// to a sibling temp file first and are renamed into place.
pub struct CsvSnapshotStore {
    path: PathBuf,
}

impl CsvSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn encode(tally: &VoteTally, latest: &VoteEvent) -> Result<Vec<u8>> {
        let location = "in-memory buffer";
        let stamp = format_timestamp(&latest.cast_at);
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for category in Category::ALL {
            writer
                .serialize(SnapshotRow {
                    option: category.label().to_string(),
                    votes: tally.count(category),
                    date: stamp.clone(),
                })
                .map_err(|e| FeedbackError::persistence(location, e))?;
        }

        writer.into_inner().map_err(|e| FeedbackError::persistence(location, e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<LedgerRecord>> {
        let location = self.describe();
        let mut reader = ReaderBuilder::new().from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| FeedbackError::storage_read(&location, e))?
            .clone();
        // Zero-byte file: nothing written yet
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        if headers != StringRecord::from(HEADERS.to_vec()) {
            return Err(FeedbackError::storage_read(
                &location,
                format!("unexpected header row {:?}", headers.iter().collect::<Vec<_>>()),
            ));
        }

        let mut records = Vec::new();
        let mut total: u64 = 0;
        for (line, row) in reader.deserialize::<SnapshotRow>().enumerate() {
            let row = row.map_err(|e| FeedbackError::storage_read(&location, e))?;
            let category = row.option.parse::<Category>().map_err(|_| {
                FeedbackError::storage_read(&location, format!("row {}: unknown option {:?}", line + 1, row.option))
            })?;
            let timestamp = parse_timestamp(&row.date).map_err(|e| {
                FeedbackError::storage_read(&location, format!("row {}: bad date {:?}: {}", line + 1, row.date, e))
            })?;
            // Reports add every count together, so the sum has to fit
            total = total.checked_add(row.votes).ok_or_else(|| {
                FeedbackError::storage_read(&location, format!("row {}: vote counts overflow", line + 1))
            })?;
            records.push(LedgerRecord {
                category,
                count: row.votes,
                timestamp,
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl LedgerStore for CsvSnapshotStore {
    async fn persist(&self, tally: &VoteTally, events: &[VoteEvent]) -> Result<()> {
        // The snapshot only needs the newest stamp; the tally covers the rest
        let Some(latest) = events.last() else {
            return Ok(());
        };
        let location = self.describe();
        let bytes = Self::encode(tally, latest)?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| FeedbackError::persistence(&location, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| FeedbackError::persistence(&location, e))?;

        debug!("Wrote ledger snapshot ({} votes) to {}", tally.total(), location);
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<LedgerRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No ledger at {}, starting empty", self.describe());
                return Ok(Vec::new());
            }
            Err(e) => return Err(FeedbackError::storage_read(self.describe(), e)),
        };

        self.decode(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::tempdir;

    fn at(month: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, 3)
            .unwrap()
            .and_hms_opt(hour, 15, 42)
            .unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_ledger() {
        let dir = tempdir().expect("temp dir");
        let store = CsvSnapshotStore::new(dir.path().join("votos.csv"));
        assert!(store.load_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_three_rows_in_the_documented_format() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("votos.csv");
        let store = CsvSnapshotStore::new(&path);

        let mut tally = VoteTally::new();
        tally.increment(Category::Satisfied);
        tally.increment(Category::Satisfied);
        tally.increment(Category::Neutral);
        let event = VoteEvent::new(Category::Satisfied, at(4, 10));
        store.persist(&tally, &[event]).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Opção,Votos,Data\n\
             Insatisfeito,0,2024-04-03 10:15:42\n\
             Neutro,1,2024-04-03 10:15:42\n\
             Satisfeito,2,2024-04-03 10:15:42\n"
        );
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn each_write_replaces_the_previous_snapshot() {
        let dir = tempdir().expect("temp dir");
        let store = CsvSnapshotStore::new(dir.path().join("votos.csv"));

        let mut tally = VoteTally::new();
        tally.increment(Category::Neutral);
        store.persist(&tally, &[VoteEvent::new(Category::Neutral, at(1, 8))]).await.unwrap();
        tally.increment(Category::Dissatisfied);
        store.persist(&tally, &[VoteEvent::new(Category::Dissatisfied, at(2, 9))]).await.unwrap();

        let records = store.load_records().await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.timestamp == at(2, 9)));
        assert_eq!(VoteTally::from_records(&records), tally);
    }

    #[tokio::test]
    async fn malformed_rows_are_read_errors() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("votos.csv");
        std::fs::write(&path, "Opção,Votos,Data\nSatisfeito,many,2024-01-01 00:00:00\n").unwrap();

        let store = CsvSnapshotStore::new(&path);
        assert!(matches!(
            store.load_records().await,
            Err(FeedbackError::StorageRead { .. })
        ));
    }

    #[tokio::test]
    async fn counts_summing_past_u64_are_read_errors() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("votos.csv");
        std::fs::write(
            &path,
            "Opção,Votos,Data\n\
             Neutro,18446744073709551615,2024-01-01 00:00:00\n\
             Satisfeito,1,2024-01-01 00:00:00\n",
        )
        .unwrap();

        let store = CsvSnapshotStore::new(&path);
        match store.load_records().await {
            Err(FeedbackError::StorageRead { reason, .. }) => assert!(reason.contains("overflow")),
            other => panic!("expected StorageRead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_header_is_a_read_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("votos.csv");
        std::fs::write(&path, "option,votes,date\n").unwrap();

        let store = CsvSnapshotStore::new(&path);
        assert!(matches!(
            store.load_records().await,
            Err(FeedbackError::StorageRead { .. })
        ));
    }

    #[tokio::test]
    async fn empty_and_header_only_files_hold_no_records() {
        let dir = tempdir().expect("temp dir");
        let empty = dir.path().join("empty.csv");
        let header_only = dir.path().join("header.csv");
        std::fs::write(&empty, "").unwrap();
        std::fs::write(&header_only, "Opção,Votos,Data\n").unwrap();

        assert!(CsvSnapshotStore::new(&empty).load_records().await.unwrap().is_empty());
        assert!(CsvSnapshotStore::new(&header_only).load_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_into_missing_directory_is_a_persistence_error() {
        let dir = tempdir().expect("temp dir");
        let store = CsvSnapshotStore::new(dir.path().join("nope").join("votos.csv"));
        let tally = VoteTally::new();
        let result = store.persist(&tally, &[VoteEvent::new(Category::Neutral, at(1, 1))]).await;
        assert!(matches!(result, Err(FeedbackError::Persistence { .. })));
    }
}
