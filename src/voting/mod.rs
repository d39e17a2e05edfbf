pub mod ledger;
pub mod report;

pub use ledger::VoteLedger;
pub use report::{render_text, ChartKind, ChartSeries, Report, ReportEngine, SeriesPoint};
