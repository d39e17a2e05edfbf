use chrono::NaiveDateTime;
use log::{error, info};
use std::sync::Arc;

use crate::db::LedgerStore;
use crate::error::Result;
use crate::models::{Category, VoteEvent, VoteTally};

/// Authoritative tally for one session, kept in step with its store.
pub struct VoteLedger {
    tally: VoteTally,
    store: Arc<dyn LedgerStore>,
    // Counted in the tally but not yet stored
    pending: Vec<VoteEvent>,
}

impl VoteLedger {
    // Fresh session: every category starts at zero
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            tally: VoteTally::new(),
            store,
            pending: Vec::new(),
        }
    }

    // Rehydrates the tally from whatever the store already holds
    pub async fn open(store: Arc<dyn LedgerStore>) -> Result<Self> {
        let tally = Self::load(store.as_ref()).await?;
        info!(
            "Loaded ledger from {} ({} votes so far)",
            store.describe(),
            tally.total()
        );
        Ok(Self {
            tally,
            store,
            pending: Vec::new(),
        })
    }

    /// Reads the persisted records and folds them into a tally. Absent
    /// storage yields an all-zero tally.
    pub async fn load(store: &dyn LedgerStore) -> Result<VoteTally> {
        let records = store.load_records().await?;
        Ok(VoteTally::from_records(&records))
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        Arc::clone(&self.store)
    }

    pub async fn cast(&mut self, category: Category) -> Result<VoteTally> {
        self.record(VoteEvent::now(category)).await
    }

    pub async fn cast_at(&mut self, category: Category, at: NaiveDateTime) -> Result<VoteTally> {
        self.record(VoteEvent::new(category, at)).await
    }

    // Parses before touching the tally, so a bad label changes nothing
    pub async fn cast_label(&mut self, label: &str) -> Result<VoteTally> {
        let category = label.parse::<Category>()?;
        self.cast(category).await
    }

    async fn record(&mut self, event: VoteEvent) -> Result<VoteTally> {
        let count = self.tally.increment(event.category);
        info!("Vote {} for {} (now {})", event.id, event.category, count);
        self.pending.push(event);

        // Failed events stay queued and go out with the next cast, so the
        // increment is never rolled back and never lost
        if let Err(e) = self.store.persist(&self.tally, &self.pending).await {
            error!(
                "Failed to persist {} vote(s) to {}: {}",
                self.pending.len(),
                self.store.describe(),
                e
            );
            return Err(e);
        }

        self.pending.clear();
        Ok(self.tally.clone())
    }
}
