//! Batchroom Core - batch photo editing session
//!
//! This crate provides the in-memory model behind a batch photo editing
//! screen: importing picked images, rotating, resizing, converting and
//! renaming them as a batch, and exporting the results.
//!
//! # Module Structure
//!
//! - `store` - Ordered image collection with `uri` deduplication
//! - `metadata` - Initial record metadata for picked assets
//! - `transform` - Transform kinds, the resize policy and renaming
//! - `batch` - All-or-nothing batch orchestration with bounded concurrency
//! - `export` - Per-item save dispatch with failure reporting
//! - `session` - Explicit session state and the operations the UI calls
//! - `engine` - Collaborator traits and an `image`-backed engine
//! - `config` - Batch configuration loaded from TOML
//! - `format` - JPEG/PNG formats, filename extensions and MIME types

pub mod batch;
pub mod config;
pub mod engine;
pub mod export;
pub mod format;
pub mod metadata;
pub mod session;
pub mod store;
pub mod transform;

pub use batch::{BatchError, BatchOrchestrator, BatchOutcome, BatchScope, SkipReason};
pub use config::{BatchConfig, ConfigError};
pub use engine::{
    AssetPicker, EngineError, EngineOutput, FileSizeReader, GeometricOp, MemoryEngine,
    PickOutcome, SaveOptions, SaveSink, TransformEngine,
};
pub use export::{ExportDispatcher, ExportReport};
pub use format::ImageFormat;
pub use metadata::{derive_record, AssetDescriptor};
pub use session::{BatchSummary, EditSession, Notice, PendingEdits, Selection, SessionState};
pub use store::ImageCollection;
pub use transform::{ResizeRequest, Transform};

/// One image in the editing session.
///
/// `width`, `height` and `size_bytes` always describe the bytes currently
/// addressed by `uri`. Transforms produce a replacement record rather than
/// mutating these fields one at a time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageRecord {
    /// Opaque handle of the current encoded bytes
    pub uri: String,
    /// Display filename including extension
    pub name: String,
    /// Width in pixels of the current bytes
    pub width: u32,
    /// Height in pixels of the current bytes
    pub height: u32,
    /// Byte length of the current encoded bytes
    pub size_bytes: u64,
}

impl ImageRecord {
    /// Create a new record
    pub fn new(
        uri: impl Into<String>,
        name: impl Into<String>,
        width: u32,
        height: u32,
        size_bytes: u64,
    ) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            width,
            height,
            size_bytes,
        }
    }

    /// Encoded format of the record.
    ///
    /// The name's extension wins; the `uri` path is consulted only when the
    /// name carries no recognizable extension. Unknown formats read as JPEG.
    pub fn format(&self) -> ImageFormat {
        ImageFormat::from_path(&self.name)
            .or_else(|| ImageFormat::from_path(&self.uri))
            .unwrap_or_default()
    }

    /// Extension of the display name including the leading dot, or `""`
    pub fn extension(&self) -> &str {
        format::split_extension(&self.name).1
    }

    /// MIME type used when exporting this record
    pub fn mime_type(&self) -> &'static str {
        format::mime_for_name(&self.name)
    }

    /// Check whether the record has known pixel dimensions
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
