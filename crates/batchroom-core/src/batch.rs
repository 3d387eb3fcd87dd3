//! All-or-nothing batch orchestration.
//!
//! A batch maps records through the transform engine and hands back the
//! replacement records only once every unit has succeeded. Units run
//! concurrently, at most `concurrency_limit` at a time, and results keep
//! input order. If any unit fails the whole batch fails and the caller
//! keeps its current collection: units not yet started are skipped, and the
//! outputs of units that already succeeded are released.
//!
//! Not-found records and unsupported options are not failures: they come
//! back as [`BatchOutcome::Unchanged`] with a [`SkipReason`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::engine::{EngineError, FileSizeReader, GeometricOp, TransformEngine};
use crate::store::ImageCollection;
use crate::transform::{plan_unit, quarter_turns, rename_all, Transform, UnitPlan};
use crate::ImageRecord;

/// Which records a transform applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScope {
    /// Every record in collection order.
    All,
    /// The record with this `uri`.
    One(String),
}

/// A batch that could not be committed.
#[derive(Debug, Error)]
pub enum BatchError {
    /// One unit's transform failed, so nothing was committed.
    #[error("Transform failed for {uri}: {source}")]
    TransformFailed {
        uri: String,
        #[source]
        source: EngineError,
    },
}

impl BatchError {
    /// URI of the record whose unit failed
    pub fn uri(&self) -> &str {
        match self {
            BatchError::TransformFailed { uri, .. } => uri,
        }
    }
}

/// Why a transform left the collection as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A single-record transform named a `uri` that is not in the collection.
    NotFound(String),
    /// Negative or NaN resize targets.
    UnsupportedResize { height: f64, width: f64 },
    /// A convert target that is neither JPEG nor PNG.
    UnsupportedFormat(String),
    /// A rotation that is not a whole number of quarter turns.
    UnsupportedRotation(f64),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound(uri) => write!(f, "no image with uri {}", uri),
            SkipReason::UnsupportedResize { height, width } => {
                write!(f, "unsupported resize targets {}x{} (w x h)", width, height)
            }
            SkipReason::UnsupportedFormat(target) => {
                write!(f, "unsupported target format {:?}", target)
            }
            SkipReason::UnsupportedRotation(degrees) => {
                write!(f, "unsupported rotation of {} degrees", degrees)
            }
        }
    }
}

/// A batch ready to commit, or the reason nothing changes.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Replacement for the whole collection.
    All(Vec<ImageRecord>),
    /// Replacement for the record that had `uri`.
    One { uri: String, record: ImageRecord },
    /// Nothing to commit.
    Unchanged(SkipReason),
}

impl BatchOutcome {
    /// Apply the outcome to `store`; returns how many records were replaced.
    pub fn commit(self, store: &mut ImageCollection) -> usize {
        match self {
            BatchOutcome::All(records) => {
                let count = records.len();
                store.replace_all(records);
                count
            }
            BatchOutcome::One { uri, record } => usize::from(store.replace_one(&uri, record)),
            BatchOutcome::Unchanged(_) => 0,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            BatchOutcome::Unchanged(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Runs transforms over records through the engine.
#[derive(Clone)]
pub struct BatchOrchestrator {
    engine: Arc<dyn TransformEngine>,
    size_reader: Arc<dyn FileSizeReader>,
    concurrency_limit: usize,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("concurrency_limit", &self.concurrency_limit)
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    pub fn new(
        engine: Arc<dyn TransformEngine>,
        size_reader: Arc<dyn FileSizeReader>,
        config: &BatchConfig,
    ) -> Self {
        Self {
            engine,
            size_reader,
            concurrency_limit: config.concurrency_limit.max(1),
        }
    }

    /// Compute the result of `transform` over `records` without committing it.
    ///
    /// Rename ignores `scope` and always renames the whole collection.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::TransformFailed` for the first unit that fails;
    /// no partial result is returned.
    pub async fn apply(
        &self,
        records: &[ImageRecord],
        scope: &BatchScope,
        transform: &Transform,
    ) -> Result<BatchOutcome, BatchError> {
        let resize_ops = match transform {
            Transform::Rename { base_name } => {
                if let BatchScope::One(uri) = scope {
                    debug!(uri = uri.as_str(), "rename applies to the whole collection");
                }
                return Ok(BatchOutcome::All(rename_all(records, base_name)));
            }
            Transform::Rotate { degrees } if quarter_turns(*degrees).is_none() => {
                let reason = SkipReason::UnsupportedRotation(*degrees);
                warn!(%reason, "skipping rotate");
                return Ok(BatchOutcome::Unchanged(reason));
            }
            Transform::Resize(request) => match request.plan() {
                Some(ops) => ops,
                None => {
                    let reason = SkipReason::UnsupportedResize {
                        height: request.height,
                        width: request.width,
                    };
                    warn!(%reason, "skipping resize");
                    return Ok(BatchOutcome::Unchanged(reason));
                }
            },
            _ => Vec::new(),
        };

        match scope {
            BatchScope::All => {
                info!(kind = transform.kind(), count = records.len(), "starting batch");
                let replaced = self.run_all(records, transform, &resize_ops).await?;
                info!(kind = transform.kind(), count = replaced.len(), "batch complete");
                Ok(BatchOutcome::All(replaced))
            }
            BatchScope::One(uri) => {
                let Some(record) = records.iter().find(|r| &r.uri == uri) else {
                    debug!(uri = uri.as_str(), "single transform target not found");
                    return Ok(BatchOutcome::Unchanged(SkipReason::NotFound(uri.clone())));
                };
                let replaced = self.run_record(record, transform, &resize_ops).await?;
                Ok(BatchOutcome::One {
                    uri: uri.clone(),
                    record: replaced,
                })
            }
        }
    }

    /// Transform every record with bounded concurrency.
    ///
    /// After the first failure no new unit starts. Units already in flight
    /// finish, and every output produced so far is released before the
    /// first failure in input order is returned.
    async fn run_all(
        &self,
        records: &[ImageRecord],
        transform: &Transform,
        resize_ops: &[GeometricOp],
    ) -> Result<Vec<ImageRecord>, BatchError> {
        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let mut results = std::pin::pin!(stream::iter(records)
            .map(move |record| async move {
                if aborted.load(Ordering::SeqCst) {
                    return None;
                }
                let result = self.run_record(record, transform, resize_ops).await;
                if result.is_err() {
                    aborted.store(true, Ordering::SeqCst);
                }
                Some(result)
            })
            .buffered(self.concurrency_limit));

        let mut replaced = Vec::with_capacity(records.len());
        let mut failure = None;
        while let Some(result) = results.next().await {
            match result {
                Some(Ok(record)) => replaced.push(record),
                Some(Err(err)) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                None => {}
            }
        }

        match failure {
            None => Ok(replaced),
            Some(err) => {
                let sources: HashSet<&str> = records.iter().map(|r| r.uri.as_str()).collect();
                let orphans: Vec<String> = replaced
                    .into_iter()
                    .map(|r| r.uri)
                    .filter(|uri| !sources.contains(uri.as_str()))
                    .collect();
                debug!(count = orphans.len(), "releasing outputs of failed batch");
                self.release(&orphans).await;
                Err(err)
            }
        }
    }

    /// Tell the engine the bytes behind `uris` are no longer referenced.
    pub async fn release(&self, uris: &[String]) {
        for uri in uris {
            self.engine.release(uri).await;
        }
    }

    async fn run_record(
        &self,
        record: &ImageRecord,
        transform: &Transform,
        resize_ops: &[GeometricOp],
    ) -> Result<ImageRecord, BatchError> {
        match plan_unit(transform, record, resize_ops) {
            Some(plan) => self.run_unit(record, &plan).await,
            // Rename never reaches the engine
            None => Ok(record.clone()),
        }
    }

    /// One engine call producing one replacement record.
    async fn run_unit(&self, record: &ImageRecord, plan: &UnitPlan) -> Result<ImageRecord, BatchError> {
        let fail = |source: EngineError| {
            warn!(uri = record.uri.as_str(), error = %source, "transform unit failed");
            BatchError::TransformFailed {
                uri: record.uri.clone(),
                source,
            }
        };

        let output = self
            .engine
            .manipulate(&record.uri, &plan.ops, plan.options)
            .await
            .map_err(fail)?;

        if output.uri.is_empty() {
            return Err(fail(EngineError::MissingPayload));
        }

        let size_bytes = match &output.bytes {
            Some(bytes) => bytes.len() as u64,
            None => self.size_reader.read_size(&output.uri).await,
        };

        let name = plan.output_name(record);
        if name == record.name && record.format() != plan.options.format {
            debug!(
                name = name.as_str(),
                format = %plan.options.format,
                "name extension no longer matches encoded format"
            );
        }

        Ok(ImageRecord {
            uri: output.uri,
            name,
            width: output.width,
            height: output.height,
            size_bytes,
        })
    }
}
