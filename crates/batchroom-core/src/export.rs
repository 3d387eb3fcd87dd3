//! Export dispatch.
//!
//! Records are saved one after another in collection order. A failed save is
//! logged and recorded, and the loop moves on to the next record.

use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::{EngineError, SaveSink};
use crate::ImageRecord;

/// Outcome of exporting a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Number of records saved
    pub saved: usize,
    /// Names of records whose save failed, in collection order
    pub failed: Vec<String>,
}

impl ExportReport {
    /// Check whether every record was saved
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.saved + self.failed.len()
    }
}

/// Sends records to a save sink.
#[derive(Clone)]
pub struct ExportDispatcher {
    sink: Arc<dyn SaveSink>,
}

impl std::fmt::Debug for ExportDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportDispatcher").finish_non_exhaustive()
    }
}

impl ExportDispatcher {
    pub fn new(sink: Arc<dyn SaveSink>) -> Self {
        Self { sink }
    }

    /// Save one record under its display name.
    pub async fn export_one(&self, record: &ImageRecord) -> Result<(), EngineError> {
        self.sink
            .save(&record.uri, &record.name, record.mime_type())
            .await
    }

    /// Save every record in order, collecting failures instead of stopping.
    pub async fn export_all(&self, records: &[ImageRecord]) -> ExportReport {
        let mut report = ExportReport::default();

        for record in records {
            match self.export_one(record).await {
                Ok(()) => report.saved += 1,
                Err(err) => {
                    warn!(name = record.name.as_str(), uri = record.uri.as_str(), error = %err, "export failed");
                    report.failed.push(record.name.clone());
                }
            }
        }

        info!(saved = report.saved, failed = report.failed.len(), "export finished");
        report
    }
}
