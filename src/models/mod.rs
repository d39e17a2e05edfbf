use chrono::{Datelike, Local, Month, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::FeedbackError;

// Format used for every persisted timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Dissatisfied,
    Neutral,
    Satisfied,
}

impl Category {
    // Display order
    pub const ALL: [Category; 3] = [Category::Dissatisfied, Category::Neutral, Category::Satisfied];

    /// Label shown on the voting buttons and written to the ledger file.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Dissatisfied => "Insatisfeito",
            Category::Neutral => "Neutro",
            Category::Satisfied => "Satisfeito",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Dissatisfied => "lightcoral",
            Category::Neutral => "gold",
            Category::Satisfied => "lightgreen",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insatisfeito" | "dissatisfied" => Ok(Category::Dissatisfied),
            "neutro" | "neutral" => Ok(Category::Neutral),
            "satisfeito" | "satisfied" => Ok(Category::Satisfied),
            _ => Err(FeedbackError::InvalidCategory(s.to_string())),
        }
    }
}

// Current per-category counts. Never decremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    counts: BTreeMap<Category, u64>,
}

impl Default for VoteTally {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteTally {
    pub fn new() -> Self {
        let counts = Category::ALL.iter().map(|c| (*c, 0)).collect();
        Self { counts }
    }

    /// Rebuilds a tally by summing record counts per category.
    ///
    /// A snapshot ledger holds one record per category, an event log holds
    /// one record per vote; both fold to the same totals.
    pub fn from_records(records: &[LedgerRecord]) -> Self {
        let mut tally = Self::new();
        for record in records {
            let count = tally.counts.entry(record.category).or_insert(0);
            *count = count.saturating_add(record.count);
        }
        tally
    }

    pub fn increment(&mut self, category: Category) -> u64 {
        let count = self.counts.entry(category).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, category: Category) -> u64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub category: Category,
    pub count: u64,
    pub timestamp: NaiveDateTime,
}

impl LedgerRecord {
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }
}

// One cast, as it enters the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub id: Uuid,
    pub category: Category,
    pub cast_at: NaiveDateTime,
}

impl VoteEvent {
    pub fn new(category: Category, cast_at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            cast_at: cast_at.trunc_subsecs(0),
        }
    }

    pub fn now(category: Category) -> Self {
        Self::new(category, Local::now().naive_local())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonthFilter {
    #[default]
    All,
    Month(u32),
}

impl MonthFilter {
    /// Interprets a month selector value: 0 means all months, 1-12 a
    /// calendar month.
    pub fn from_selection(selection: u32) -> Result<Self, FeedbackError> {
        match selection {
            0 => Ok(MonthFilter::All),
            1..=12 => Ok(MonthFilter::Month(selection)),
            other => Err(FeedbackError::InvalidMonth(other)),
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            MonthFilter::All => None,
            MonthFilter::Month(m) => Some(*m),
        }
    }

    pub fn matches(&self, record: &LedgerRecord) -> bool {
        match self {
            MonthFilter::All => true,
            MonthFilter::Month(m) => record.month() == *m,
        }
    }

    pub fn label(&self) -> String {
        match self {
            MonthFilter::All => "All".to_string(),
            MonthFilter::Month(m) => u8::try_from(*m)
                .ok()
                .and_then(|m| Month::try_from(m).ok())
                .map(|month| month.name().to_string())
                .unwrap_or_else(|| format!("Month {}", m)),
        }
    }
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
}
