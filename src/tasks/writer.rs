use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{FeedbackError, Result};
use crate::models::{Category, VoteTally};
use crate::voting::VoteLedger;

const QUEUE_DEPTH: usize = 64;

enum LedgerCommand {
    Cast {
        category: Category,
        reply: oneshot::Sender<Result<VoteTally>>,
    },
    Tally {
        reply: oneshot::Sender<VoteTally>,
    },
}

/// Caller side of the writer task. Clones share the same queue, so every
/// cast from every clone is applied one at a time, in arrival order.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    pub async fn cast(&self, category: Category) -> Result<VoteTally> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Cast { category, reply })
            .await
            .map_err(|_| FeedbackError::WriterClosed)?;
        rx.await.map_err(|_| FeedbackError::WriterClosed)?
    }

    pub async fn cast_label(&self, label: &str) -> Result<VoteTally> {
        let category = label.parse::<Category>()?;
        self.cast(category).await
    }

    pub async fn tally(&self) -> Result<VoteTally> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Tally { reply })
            .await
            .map_err(|_| FeedbackError::WriterClosed)?;
        rx.await.map_err(|_| FeedbackError::WriterClosed)
    }
}

// Moves the ledger into its own task. The task ends once every handle
// has been dropped.
pub fn spawn_writer(ledger: VoteLedger) -> (LedgerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    let task = tokio::spawn(run_writer(ledger, rx));
    (LedgerHandle { tx }, task)
}

async fn run_writer(mut ledger: VoteLedger, mut rx: mpsc::Receiver<LedgerCommand>) {
    info!("Ledger writer started for {}", ledger.store().describe());

    while let Some(command) = rx.recv().await {
        match command {
            LedgerCommand::Cast { category, reply } => {
                let result = ledger.cast(category).await;
                if reply.send(result).is_err() {
                    warn!("Caller went away before the {} vote was acknowledged", category);
                }
            }
            LedgerCommand::Tally { reply } => {
                if reply.send(ledger.tally().clone()).is_err() {
                    warn!("Caller went away before the tally was returned");
                }
            }
        }
    }

    debug!("Ledger writer stopping, {} votes in tally", ledger.tally().total());
}
