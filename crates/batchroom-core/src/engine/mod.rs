//! Collaborators behind the editing session.
//!
//! The session never touches pixels, files or dialogs itself. It talks to:
//! - an [`AssetPicker`] that returns descriptors for user-selected images
//! - a [`TransformEngine`] that rotates, resizes and re-encodes images
//! - a [`FileSizeReader`] that measures the bytes behind a URI
//! - a [`SaveSink`] that exports an image to user-visible storage
//!
//! [`MemoryEngine`] implements the last three on top of the `image` crate
//! with an in-memory blob store, which is what tests and headless callers use.

pub mod codec;
mod memory;

pub use memory::MemoryEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::ImageFormat;
use crate::metadata::AssetDescriptor;

/// Errors reported by engine collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No image bytes are stored under the URI.
    #[error("No image found at {0}")]
    SourceNotFound(String),

    /// The source bytes could not be decoded.
    #[error("Invalid or unsupported image data: {0}")]
    Decode(String),

    /// Re-encoding the transformed image failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// A geometric op produced or requested an empty image.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Rotation by an angle that is not a whole number of quarter turns.
    #[error("Unsupported rotation: {degrees} degrees is not a multiple of 90")]
    UnsupportedRotation { degrees: f64 },

    /// The engine finished without a usable image payload.
    #[error("Transform returned no image payload")]
    MissingPayload,

    /// The sink has nowhere to write exports.
    #[error("No export destination configured")]
    NoExportTarget,

    /// The export filename does not name a file.
    #[error("Invalid export file name: {0:?}")]
    InvalidFileName(String),

    /// I/O error while exporting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The background codec task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// The picker could not be shown or failed.
    #[error("Picker failed: {0}")]
    Picker(String),
}

/// A geometric operation applied before re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GeometricOp {
    /// Rotate clockwise by `degrees`, a multiple of 90.
    Rotate { degrees: f64 },
    /// Resize. A missing side is derived from the source aspect ratio;
    /// both present means an exact (possibly non-uniform) resize.
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
}

/// Output encoding for a transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Target encoded format
    pub format: ImageFormat,
    /// JPEG quality in [0.0, 1.0]; ignored for PNG, `None` means best
    pub quality: Option<f32>,
}

impl SaveOptions {
    pub fn jpeg(quality: Option<f32>) -> Self {
        Self {
            format: ImageFormat::Jpeg,
            quality,
        }
    }

    pub fn png() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: None,
        }
    }
}

/// Result of a transform: where the new bytes live and what they measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Location of the re-encoded bytes
    pub uri: String,
    /// Width of the re-encoded image
    pub width: u32,
    /// Height of the re-encoded image
    pub height: u32,
    /// Re-encoded bytes, when the engine hands them back
    pub bytes: Option<Vec<u8>>,
}

/// What the picker returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The user selected these assets, in selection order.
    Picked(Vec<AssetDescriptor>),
    /// The user dismissed the picker.
    Cancelled,
}

/// Platform image picker.
#[async_trait]
pub trait AssetPicker: Send + Sync {
    async fn pick(&self) -> Result<PickOutcome, EngineError>;
}

/// External image transform engine.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Apply `ops` in order to the image at `uri` and re-encode it.
    ///
    /// The source is left untouched; the output lives at a new URI.
    async fn manipulate(
        &self,
        uri: &str,
        ops: &[GeometricOp],
        options: SaveOptions,
    ) -> Result<EngineOutput, EngineError>;

    /// Drop the bytes behind `uri` once no record refers to them.
    ///
    /// Engines that do not own their storage keep the default no-op.
    async fn release(&self, _uri: &str) {}
}

/// Measures the encoded bytes behind a URI.
#[async_trait]
pub trait FileSizeReader: Send + Sync {
    /// Byte length of the content at `uri`, or 0 when it cannot be measured.
    async fn read_size(&self, uri: &str) -> u64;
}

/// Export target for finished images.
#[async_trait]
pub trait SaveSink: Send + Sync {
    async fn save(&self, uri: &str, file_name: &str, mime_type: &str) -> Result<(), EngineError>;
}
