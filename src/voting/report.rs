use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::LedgerStore;
use crate::error::{FeedbackError, Result};
use crate::models::{format_timestamp, Category, LedgerRecord, MonthFilter};

// Order of slices on the share chart
const SHARE_ORDER: [Category; 3] = [Category::Satisfied, Category::Neutral, Category::Dissatisfied];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub category: Category,
    pub label: &'static str,
    pub value: f64,
    pub color: &'static str,
}

// Data handed to whatever draws the charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub kind: ChartKind,
    pub points: Vec<SeriesPoint>,
    pub annotate_values: bool,
}

/// Totals and percentages for one month filter. Built on request, never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total_votes: u64,
    pub per_category_count: BTreeMap<Category, u64>,
    pub per_category_percent: BTreeMap<Category, f64>,
    pub filter_month: Option<u32>,
    pub filter_label: String,
    pub records: Vec<LedgerRecord>,
    pub charts: Vec<ChartSeries>,
    pub warning: Option<String>,
}

impl Report {
    pub fn count(&self, category: Category) -> u64 {
        self.per_category_count.get(&category).copied().unwrap_or(0)
    }

    pub fn percent(&self, category: Category) -> f64 {
        self.per_category_percent.get(&category).copied().unwrap_or(0.0)
    }

    fn build(filter: MonthFilter, records: Vec<LedgerRecord>) -> Self {
        let mut per_category_count: BTreeMap<Category, u64> =
            Category::ALL.iter().map(|c| (*c, 0)).collect();
        for record in &records {
            let count = per_category_count.entry(record.category).or_insert(0);
            *count = count.saturating_add(record.count);
        }

        let total_votes = per_category_count
            .values()
            .fold(0u64, |acc, n| acc.saturating_add(*n));

        // Zero votes means zero percent everywhere, not a division error
        let per_category_percent = per_category_count
            .iter()
            .map(|(category, count)| {
                let percent = if total_votes > 0 {
                    *count as f64 / total_votes as f64 * 100.0
                } else {
                    0.0
                };
                (*category, percent)
            })
            .collect();

        let mut report = Self {
            total_votes,
            per_category_count,
            per_category_percent,
            filter_month: filter.month(),
            filter_label: filter.label(),
            records,
            charts: Vec::new(),
            warning: None,
        };
        report.charts = vec![report.count_series(filter), report.share_series()];
        report
    }

    fn count_series(&self, filter: MonthFilter) -> ChartSeries {
        ChartSeries {
            title: "Votes per option".to_string(),
            kind: ChartKind::Bar,
            points: Category::ALL
                .iter()
                .map(|c| SeriesPoint {
                    category: *c,
                    label: c.label(),
                    value: self.count(*c) as f64,
                    color: c.color(),
                })
                .collect(),
            // Bar labels only on the unfiltered view
            annotate_values: filter == MonthFilter::All,
        }
    }

    fn share_series(&self) -> ChartSeries {
        ChartSeries {
            title: "Vote share per category".to_string(),
            kind: ChartKind::Pie,
            points: SHARE_ORDER
                .iter()
                .map(|c| SeriesPoint {
                    category: *c,
                    label: c.label(),
                    value: self.percent(*c),
                    color: c.color(),
                })
                .collect(),
            annotate_values: true,
        }
    }
}

/// Computes reports from whatever the ledger store holds.
pub struct ReportEngine {
    store: Arc<dyn LedgerStore>,
}

impl ReportEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn generate(&self, filter: MonthFilter) -> Result<Report> {
        let records: Vec<LedgerRecord> = self
            .store
            .load_records()
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();

        Ok(Report::build(filter, records))
    }

    // A malformed ledger gives an empty report carrying the read error
    pub async fn generate_or_empty(&self, filter: MonthFilter) -> Result<Report> {
        match self.generate(filter).await {
            Ok(report) => Ok(report),
            Err(e @ FeedbackError::StorageRead { .. }) => {
                warn!("Reporting on an empty ledger: {}", e);
                let mut report = Report::build(filter, Vec::new());
                report.warning = Some(e.to_string());
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }
}

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(&format!("Results ({})\n", report.filter_label));
    if let Some(warning) = &report.warning {
        out.push_str(&format!("Warning: {}\n", warning));
    }

    out.push_str("\nIndicators\n");
    out.push_str(&format!(
        "Satisfaction: {:.2}%\n",
        report.percent(Category::Satisfied)
    ));
    out.push_str(&format!("Neutral: {:.2}%\n", report.percent(Category::Neutral)));
    out.push_str(&format!(
        "Dissatisfaction: {:.2}%\n",
        report.percent(Category::Dissatisfied)
    ));
    out.push_str(&format!("Total votes: {}\n", report.total_votes));

    out.push_str("\nVotes per option\n");
    for category in Category::ALL {
        out.push_str(&format!("{}: {}\n", category.label(), report.count(category)));
    }

    out.push_str("\nRecords\n");
    if report.records.is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str(&format!("{:<14}{:>8}  {}\n", "Opção", "Votos", "Data"));
        for record in &report.records {
            out.push_str(&format!(
                "{:<14}{:>8}  {}\n",
                record.category.label(),
                record.count,
                format_timestamp(&record.timestamp)
            ));
        }
    }

    out
}
