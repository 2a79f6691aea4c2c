//! Best-effort persistence for the analysis pipeline.
//!
//! Wraps a [`Storage`] backend so that write failures are logged and reported
//! as `false` instead of aborting an analysis. Without a backend every write
//! is skipped and every read is empty.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::StorageResult;
use crate::storage::{AnalysisRecord, AnalysisRun, Storage};

/// Default number of runs returned by [`AnalysisPersistence::history`].
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Run and result writer that never fails the caller.
#[derive(Clone)]
pub struct AnalysisPersistence {
    storage: Option<Arc<dyn Storage>>,
}

impl AnalysisPersistence {
    /// Persist through `storage`
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// Persistence that records nothing
    pub fn disabled() -> Self {
        Self { storage: None }
    }

    /// Whether a backend is attached
    pub fn is_enabled(&self) -> bool {
        self.storage.is_some()
    }

    /// Insert or advance a run. Returns `true` only when the row was written.
    pub async fn save_run(&self, run: &AnalysisRun) -> bool {
        let Some(storage) = &self.storage else {
            debug!(run_id = %run.id, "Storage not configured, skipping run");
            return false;
        };

        match best_effort("save_run", &run.id, storage.upsert_run(run).await) {
            Some(true) => {
                info!(run_id = %run.id, status = %run.status, "Analysis run saved");
                true
            }
            Some(false) => {
                warn!(
                    run_id = %run.id,
                    status = %run.status,
                    "Run already finalized, update ignored"
                );
                false
            }
            None => false,
        }
    }

    /// Store the payload of a successful analysis.
    pub async fn save_result(&self, record: &AnalysisRecord) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };

        let saved = best_effort("save_result", &record.id, storage.upsert_result(record).await)
            .is_some();
        if saved {
            info!(analysis_id = %record.id, "Analysis result saved");
        }
        saved
    }

    /// Recent runs for a ticket, newest first. Empty on any failure.
    pub async fn history(&self, tenant_id: &str, ticket_id: &str, limit: u32) -> Vec<AnalysisRun> {
        let Some(storage) = &self.storage else {
            return Vec::new();
        };

        best_effort(
            "history",
            ticket_id,
            storage.get_runs_for_ticket(tenant_id, ticket_id, limit).await,
        )
        .unwrap_or_default()
    }

    /// A stored result, only if it belongs to `tenant_id`.
    pub async fn get_analysis(&self, analysis_id: &str, tenant_id: &str) -> Option<AnalysisRecord> {
        let storage = self.storage.as_ref()?;
        best_effort(
            "get_analysis",
            analysis_id,
            storage.get_result(analysis_id, tenant_id).await,
        )
        .flatten()
    }
}

/// Log a storage failure and turn it into `None`.
fn best_effort<T>(operation: &'static str, id: &str, result: StorageResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(operation, id, error = %e, "Persistence operation failed");
            None
        }
    }
}
