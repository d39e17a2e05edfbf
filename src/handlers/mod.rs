use log::{info, warn};

use crate::error::{FeedbackError, Result};
use crate::models::{Category, MonthFilter, VoteTally};
use crate::tasks::writer::LedgerHandle;
use crate::voting::{Report, ReportEngine};

// The two things a caller can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Cast { category: String },
    // 0 selects every month
    Report { month: u32 },
}

#[derive(Debug, Clone)]
pub enum Response {
    Voted { category: Category, tally: VoteTally },
    Report(Report),
}

impl Response {
    pub fn message(&self) -> String {
        match self {
            Response::Voted { category, .. } => {
                format!("Voto registrado com sucesso: {}", category.label())
            }
            Response::Report(report) => crate::voting::render_text(report),
        }
    }
}

// `ledger` is None when votes cannot be taken, e.g. the stored ledger
// could not be read at startup
pub async fn handle_request(
    ledger: Option<&LedgerHandle>,
    reports: &ReportEngine,
    request: Request,
) -> Result<Response> {
    info!("Handling request: {:?}", request);
    match request {
        Request::Cast { category } => {
            let category = match category.parse::<Category>() {
                Ok(c) => c,
                Err(e) => {
                    warn!("Rejected vote: {}", e);
                    return Err(e);
                }
            };
            let Some(ledger) = ledger else {
                warn!("Rejected vote for {}: no ledger this session", category);
                return Err(FeedbackError::LedgerUnavailable(
                    "the stored ledger could not be loaded".to_string(),
                ));
            };
            let tally = ledger.cast(category).await?;
            Ok(Response::Voted { category, tally })
        }
        Request::Report { month } => {
            let filter = MonthFilter::from_selection(month)?;
            let report = reports.generate_or_empty(filter).await?;
            Ok(Response::Report(report))
        }
    }
}
