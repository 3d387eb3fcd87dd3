//! The editing session.
//!
//! [`SessionState`] is everything the editing screen shows: the image
//! collection, the values typed into the resize dialog, which image is being
//! previewed or renamed, and the last failure to surface. [`EditSession`]
//! owns that state together with the orchestrator and export dispatcher and
//! exposes one method per user action.
//!
//! Batch methods only touch the collection after the whole batch succeeded.
//! On failure the collection is left as it was and a [`Notice`] is set.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::batch::{BatchError, BatchOrchestrator, BatchScope, SkipReason};
use crate::config::BatchConfig;
use crate::engine::{
    AssetPicker, EngineError, FileSizeReader, MemoryEngine, PickOutcome, SaveSink, TransformEngine,
};
use crate::export::{ExportDispatcher, ExportReport};
use crate::format::ImageFormat;
use crate::metadata::{derive_records, AssetDescriptor};
use crate::store::ImageCollection;
use crate::transform::{self, ResizeRequest, Transform};
use crate::ImageRecord;

/// Values entered for the next resize.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdits {
    /// Target height; 0 means "not given"
    pub resize_height: f64,
    /// Target width; 0 means "not given"
    pub resize_width: f64,
    /// JPEG quality in [0.0, 1.0]
    pub quality: f32,
}

impl Default for PendingEdits {
    fn default() -> Self {
        Self {
            resize_height: 0.0,
            resize_width: 0.0,
            quality: 1.0,
        }
    }
}

impl PendingEdits {
    pub fn resize_request(&self) -> ResizeRequest {
        ResizeRequest::new(self.resize_height, self.resize_width, self.quality)
    }

    /// Clear the resize targets, keeping the quality.
    pub fn reset_resize(&mut self) {
        self.resize_height = 0.0;
        self.resize_width = 0.0;
    }
}

/// Parse a dimension typed into a text field.
///
/// Blank text is 0 and finite numeric text is its value. Anything else,
/// including `"inf"`, is NaN, which the resize policy rejects.
pub fn parse_dimension(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(f64::NAN)
}

/// Transient overlay state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Record shown in the preview overlay
    pub preview: Option<String>,
    /// Record whose name is being edited
    pub renaming: Option<String>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.preview = None;
        self.renaming = None;
    }

    /// Drop references to a removed record.
    fn forget(&mut self, uri: &str) {
        if self.preview.as_deref() == Some(uri) {
            self.preview = None;
        }
        if self.renaming.as_deref() == Some(uri) {
            self.renaming = None;
        }
    }

    /// Follow records whose `uri` changed, by position.
    fn follow(&mut self, before: &[String], images: &ImageCollection) {
        for slot in [&mut self.preview, &mut self.renaming] {
            let Some(uri) = slot.take() else {
                continue;
            };
            *slot = if images.contains(&uri) {
                Some(uri)
            } else {
                before
                    .iter()
                    .position(|b| *b == uri)
                    .and_then(|idx| images.as_slice().get(idx))
                    .map(|r| r.uri.clone())
            };
        }
    }
}

/// A failure the UI should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A batch transform failed and nothing was changed.
    BatchFailed { message: String },
    /// Some exports failed; the listed names were not saved.
    ExportIncomplete { failed: Vec<String> },
    /// The picker failed.
    ImportFailed { message: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::BatchFailed { message } => write!(f, "Edit failed, no images were changed: {}", message),
            Notice::ExportIncomplete { failed } => {
                write!(f, "Could not save {} image(s): {}", failed.len(), failed.join(", "))
            }
            Notice::ImportFailed { message } => write!(f, "Could not import images: {}", message),
        }
    }
}

/// Everything the editing screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub images: ImageCollection,
    pub pending: PendingEdits,
    pub selection: Selection,
    pub notice: Option<Notice>,
}

/// Result of a transform that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Records replaced
    pub affected: usize,
    /// Why nothing changed, for no-op operations
    pub skipped: Option<SkipReason>,
}

impl BatchSummary {
    fn applied(affected: usize) -> Self {
        Self {
            affected,
            skipped: None,
        }
    }

    fn skipped(reason: SkipReason) -> Self {
        Self {
            affected: 0,
            skipped: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// One editing session.
#[derive(Debug)]
pub struct EditSession {
    state: SessionState,
    orchestrator: BatchOrchestrator,
    exporter: ExportDispatcher,
    rotate_degrees: f64,
}

impl EditSession {
    pub fn new(
        engine: Arc<dyn TransformEngine>,
        size_reader: Arc<dyn FileSizeReader>,
        sink: Arc<dyn SaveSink>,
        config: BatchConfig,
    ) -> Self {
        let config = config.normalized();
        let state = SessionState {
            pending: PendingEdits {
                quality: config.default_quality,
                ..PendingEdits::default()
            },
            ..SessionState::default()
        };

        Self {
            state,
            orchestrator: BatchOrchestrator::new(engine, size_reader, &config),
            exporter: ExportDispatcher::new(sink),
            rotate_degrees: config.rotate_degrees,
        }
    }

    /// Session whose engine, size reader and sink are all `engine`.
    pub fn with_memory_engine(engine: Arc<MemoryEngine>, config: BatchConfig) -> Self {
        Self::new(engine.clone(), engine.clone(), engine, config)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn images(&self) -> &[ImageRecord] {
        self.state.images.as_slice()
    }

    pub fn pending(&self) -> &PendingEdits {
        &self.state.pending
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.state.notice.as_ref()
    }

    /// Take the current notice so it is shown once.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.state.notice.take()
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Add picked assets, skipping any whose `uri` is already present.
    pub fn import_assets(&mut self, assets: &[AssetDescriptor]) -> usize {
        let added = self.state.images.import(derive_records(assets));
        info!(picked = assets.len(), added, "imported images");
        added
    }

    /// Run the picker and import what it returns. Cancelling imports nothing.
    pub async fn pick_and_import(&mut self, picker: &dyn AssetPicker) -> Result<usize, EngineError> {
        match picker.pick().await {
            Ok(PickOutcome::Picked(assets)) => Ok(self.import_assets(&assets)),
            Ok(PickOutcome::Cancelled) => {
                debug!("picker cancelled");
                Ok(0)
            }
            Err(err) => {
                warn!(error = %err, "picker failed");
                self.state.notice = Some(Notice::ImportFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    pub async fn rotate_all(&mut self) -> Result<BatchSummary, BatchError> {
        let transform = Transform::Rotate {
            degrees: self.rotate_degrees,
        };
        self.run(BatchScope::All, transform).await
    }

    pub async fn rotate_one(&mut self, uri: &str) -> Result<BatchSummary, BatchError> {
        let transform = Transform::Rotate {
            degrees: self.rotate_degrees,
        };
        self.run(BatchScope::One(uri.to_string()), transform).await
    }

    pub fn set_pending_resize(&mut self, height: f64, width: f64) {
        self.state.pending.resize_height = height;
        self.state.pending.resize_width = width;
    }

    /// Set resize targets from the dialog's text fields.
    pub fn set_pending_resize_text(&mut self, height: &str, width: &str) {
        self.set_pending_resize(parse_dimension(height), parse_dimension(width));
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.state.pending.quality = quality;
    }

    /// Resize every record to the pending targets.
    ///
    /// Unsupported targets change nothing and reset the pending targets.
    pub async fn resize_all(&mut self) -> Result<BatchSummary, BatchError> {
        let transform = Transform::Resize(self.state.pending.resize_request());
        self.run(BatchScope::All, transform).await
    }

    pub async fn resize_one(&mut self, uri: &str) -> Result<BatchSummary, BatchError> {
        let transform = Transform::Resize(self.state.pending.resize_request());
        self.run(BatchScope::One(uri.to_string()), transform).await
    }

    /// Re-encode every record as `target` (`"jpeg"`, `"jpg"` or `"png"`).
    ///
    /// Any other target changes nothing.
    pub async fn convert_all(&mut self, target: &str) -> Result<BatchSummary, BatchError> {
        match Self::convert_transform(target) {
            Ok(transform) => self.run(BatchScope::All, transform).await,
            Err(reason) => Ok(BatchSummary::skipped(reason)),
        }
    }

    pub async fn convert_one(&mut self, uri: &str, target: &str) -> Result<BatchSummary, BatchError> {
        match Self::convert_transform(target) {
            Ok(transform) => self.run(BatchScope::One(uri.to_string()), transform).await,
            Err(reason) => Ok(BatchSummary::skipped(reason)),
        }
    }

    fn convert_transform(target: &str) -> Result<Transform, SkipReason> {
        match ImageFormat::parse(target) {
            Some(format) => Ok(Transform::Convert { format }),
            None => {
                let reason = SkipReason::UnsupportedFormat(target.to_string());
                warn!(%reason, "skipping convert");
                Err(reason)
            }
        }
    }

    /// Rename every record to `{base}-{n}{ext}`.
    pub fn rename_all(&mut self, base_name: &str) -> BatchSummary {
        let renamed = transform::rename_all(self.state.images.as_slice(), base_name);
        let affected = renamed.len();
        self.state.images.replace_all(renamed);
        BatchSummary::applied(affected)
    }

    /// Rename one record. Returns `false` for an unknown `uri` or blank name.
    pub fn rename_one(&mut self, uri: &str, new_name: &str) -> bool {
        let Some(renamed) = self
            .state
            .images
            .get(uri)
            .and_then(|record| transform::rename_one(record, new_name))
        else {
            return false;
        };

        self.state.images.replace_one(uri, renamed);
        if self.state.selection.renaming.as_deref() == Some(uri) {
            self.state.selection.renaming = None;
        }
        true
    }

    async fn run(&mut self, scope: BatchScope, transform: Transform) -> Result<BatchSummary, BatchError> {
        let outcome = match self
            .orchestrator
            .apply(self.state.images.as_slice(), &scope, &transform)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state.notice = Some(Notice::BatchFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        if let Some(reason) = outcome.skip_reason().cloned() {
            if matches!(reason, SkipReason::UnsupportedResize { .. }) {
                self.state.pending.reset_resize();
            }
            return Ok(BatchSummary::skipped(reason));
        }

        let before: Vec<String> = self.state.images.iter().map(|r| r.uri.clone()).collect();
        let affected = outcome.commit(&mut self.state.images);
        self.state.selection.follow(&before, &self.state.images);

        let superseded: Vec<String> = before
            .into_iter()
            .filter(|uri| !self.state.images.contains(uri))
            .collect();
        self.orchestrator.release(&superseded).await;

        Ok(BatchSummary::applied(affected))
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a record and release its bytes.
    pub async fn remove(&mut self, uri: &str) -> Option<ImageRecord> {
        let removed = self.state.images.remove_one(uri)?;
        self.state.selection.forget(uri);
        self.orchestrator.release(std::slice::from_ref(&removed.uri)).await;
        Some(removed)
    }

    /// Start over with an empty session, releasing every record's bytes.
    pub async fn reset(&mut self) {
        let uris: Vec<String> = self.state.images.iter().map(|r| r.uri.clone()).collect();
        self.orchestrator.release(&uris).await;
        self.state.images.clear();
        self.state.pending.reset_resize();
        self.state.selection.clear();
        self.state.notice = None;
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Save every record; failed names are reported and set as a notice.
    pub async fn export_all(&mut self) -> ExportReport {
        let report = self.exporter.export_all(self.state.images.as_slice()).await;
        if !report.is_complete() {
            self.state.notice = Some(Notice::ExportIncomplete {
                failed: report.failed.clone(),
            });
        }
        report
    }

    /// Save one record. Returns `Ok(false)` when `uri` is not in the session.
    pub async fn export_one(&mut self, uri: &str) -> Result<bool, EngineError> {
        let Some(record) = self.state.images.get(uri) else {
            return Ok(false);
        };

        match self.exporter.export_one(record).await {
            Ok(()) => Ok(true),
            Err(err) => {
                self.state.notice = Some(Notice::ExportIncomplete {
                    failed: vec![record.name.clone()],
                });
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select_preview(&mut self, uri: &str) -> bool {
        if !self.state.images.contains(uri) {
            return false;
        }
        self.state.selection.preview = Some(uri.to_string());
        true
    }

    pub fn begin_rename(&mut self, uri: &str) -> bool {
        if !self.state.images.contains(uri) {
            return false;
        }
        self.state.selection.renaming = Some(uri.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
    }
}
