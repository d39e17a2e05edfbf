use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tempfile::tempdir;

use feedback_tally::db::{CsvSnapshotStore, LedgerStore, SqliteEventLog};
use feedback_tally::models::{Category, MonthFilter};
use feedback_tally::voting::{ReportEngine, VoteLedger};
use feedback_tally::FeedbackError;

fn at(month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(11, 0, 0)
        .unwrap()
}

fn snapshot_store(dir: &tempfile::TempDir) -> Arc<CsvSnapshotStore> {
    Arc::new(CsvSnapshotStore::new(dir.path().join("votos.csv")))
}

#[tokio::test]
async fn single_satisfied_vote_is_one_hundred_percent() {
    let dir = tempdir().expect("temp dir");
    let store = snapshot_store(&dir);
    let mut ledger = VoteLedger::new(store.clone());

    ledger.cast(Category::Satisfied).await.unwrap();

    let report = ReportEngine::new(store).generate(MonthFilter::All).await.unwrap();
    assert_eq!(report.total_votes, 1);
    assert_eq!(report.count(Category::Satisfied), 1);
    assert_eq!(report.count(Category::Neutral), 0);
    assert_eq!(report.count(Category::Dissatisfied), 0);
    assert_eq!(report.percent(Category::Satisfied), 100.0);
}

#[tokio::test]
async fn two_satisfied_one_neutral() {
    let dir = tempdir().expect("temp dir");
    let store = snapshot_store(&dir);
    let mut ledger = VoteLedger::new(store.clone());

    ledger.cast(Category::Satisfied).await.unwrap();
    ledger.cast(Category::Neutral).await.unwrap();
    ledger.cast(Category::Satisfied).await.unwrap();

    let report = ReportEngine::new(store).generate(MonthFilter::All).await.unwrap();
    assert_eq!(report.total_votes, 3);
    assert_eq!(report.count(Category::Satisfied), 2);
    assert_eq!(report.count(Category::Neutral), 1);
    assert_eq!(report.count(Category::Dissatisfied), 0);
    assert!((report.percent(Category::Satisfied) - 66.67).abs() < 0.01);

    let sum: f64 = report.per_category_percent.values().sum();
    assert!((sum - 100.0).abs() < 1e-6);
}

#[tokio::test]
async fn absent_ledger_reports_zeros() {
    let dir = tempdir().expect("temp dir");
    let engine = ReportEngine::new(snapshot_store(&dir));

    for month in 0..=12 {
        let filter = MonthFilter::from_selection(month).unwrap();
        let report = engine.generate(filter).await.unwrap();
        assert_eq!(report.total_votes, 0);
        assert!(report.per_category_percent.values().all(|p| *p == 0.0));
    }
}

#[tokio::test]
async fn invalid_category_changes_nothing() {
    let dir = tempdir().expect("temp dir");
    let store = snapshot_store(&dir);
    let mut ledger = VoteLedger::new(store.clone());
    ledger.cast(Category::Neutral).await.unwrap();
    let before = store.load_records().await.unwrap();

    let result = ledger.cast_label("Encantado").await;

    assert!(matches!(result, Err(FeedbackError::InvalidCategory(_))));
    assert_eq!(ledger.tally().total(), 1);
    assert_eq!(store.load_records().await.unwrap(), before);
}

#[tokio::test]
async fn snapshot_filter_matches_only_the_latest_write_month() {
    let dir = tempdir().expect("temp dir");
    let store = snapshot_store(&dir);
    let mut ledger = VoteLedger::new(store.clone());

    ledger.cast_at(Category::Satisfied, at(3, 1)).await.unwrap();
    ledger.cast_at(Category::Dissatisfied, at(4, 2)).await.unwrap();

    let engine = ReportEngine::new(store);
    let all = engine.generate(MonthFilter::All).await.unwrap();
    let april = engine.generate(MonthFilter::Month(4)).await.unwrap();
    let march = engine.generate(MonthFilter::Month(3)).await.unwrap();

    // The whole snapshot carries April's stamp
    assert_eq!(all.per_category_count, april.per_category_count);
    assert_eq!(all.total_votes, 2);
    assert_eq!(march.total_votes, 0);
}

#[tokio::test]
async fn event_log_keeps_month_history() {
    let log = Arc::new(SqliteEventLog::connect("sqlite::memory:").await.unwrap());
    let mut ledger = VoteLedger::new(log.clone());

    ledger.cast_at(Category::Satisfied, at(3, 1)).await.unwrap();
    ledger.cast_at(Category::Satisfied, at(3, 9)).await.unwrap();
    ledger.cast_at(Category::Dissatisfied, at(4, 2)).await.unwrap();

    let engine = ReportEngine::new(log.clone());
    let all = engine.generate(MonthFilter::All).await.unwrap();
    let march = engine.generate(MonthFilter::Month(3)).await.unwrap();
    let april = engine.generate(MonthFilter::Month(4)).await.unwrap();

    assert_eq!(march.count(Category::Satisfied), 2);
    assert_eq!(march.total_votes, 2);
    assert_eq!(april.count(Category::Dissatisfied), 1);
    assert_eq!(april.percent(Category::Dissatisfied), 100.0);

    // Unfiltered equals the union of every month present
    for category in Category::ALL {
        assert_eq!(all.count(category), march.count(category) + april.count(category));
    }

    // Restarting from the log restores the same totals
    let reopened = VoteLedger::open(log).await.unwrap();
    assert_eq!(reopened.tally(), ledger.tally());
}
