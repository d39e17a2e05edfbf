mod event_log;
mod snapshot;

pub use event_log::SqliteEventLog;
pub use snapshot::CsvSnapshotStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LedgerRecord, VoteEvent, VoteTally};

// Durable side of the ledger. The tally is the source of truth while the
// process runs; a store only has to keep up with it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Records casts not yet stored, oldest first. `tally` already
    /// includes every one of them. Either all of `events` are stored or
    /// none are.
    async fn persist(&self, tally: &VoteTally, events: &[VoteEvent]) -> Result<()>;

    /// Every record currently held. Absent storage is an empty ledger.
    async fn load_records(&self) -> Result<Vec<LedgerRecord>>;

    // Where the records live, for logs and error messages
    fn describe(&self) -> String;
}
