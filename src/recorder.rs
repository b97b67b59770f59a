//! ResultRecorder - persists probe outcomes

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::ProbeOutcome;
use crate::storage::{RecordedOutcome, StorageBackend, StorageResult};

/// Writes each outcome to history and refreshes the target's cached status
///
/// Both writes go through `StorageBackend::record_outcome`, so a reader
/// sees either the new history row together with the new cache, or neither.
#[derive(Clone)]
pub struct ResultRecorder {
    store: Arc<dyn StorageBackend>,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    /// Record one outcome against its target
    ///
    /// Returns `Ok(None)` when the target was removed while its probe was in
    /// flight. The outcome is then discarded.
    #[instrument(skip_all, fields(target_id = outcome.target_id))]
    pub async fn record(&self, outcome: &ProbeOutcome) -> StorageResult<Option<RecordedOutcome>> {
        let recorded = self.store.record_outcome(outcome).await?;

        if recorded.is_none() {
            debug!("target {} no longer exists, outcome discarded", outcome.target_id);
        }

        Ok(recorded)
    }
}
