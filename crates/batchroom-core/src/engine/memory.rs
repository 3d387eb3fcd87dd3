//! In-memory engine backed by the `image` crate.
//!
//! Encoded bytes live in a map keyed by `memory://<n>.<ext>` URIs. Every
//! transform stores its output under a fresh URI and leaves the source in
//! place, so records that still point at old bytes never observe a change.
//! Bytes stay until [`TransformEngine::release`] drops them. Exports are
//! written into an optional directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::codec;
use super::{
    EngineError, EngineOutput, FileSizeReader, GeometricOp, SaveOptions, SaveSink,
    TransformEngine,
};
use crate::format::{split_extension, ImageFormat};
use crate::metadata::AssetDescriptor;

/// URI scheme for blobs held by [`MemoryEngine`].
pub const URI_SCHEME: &str = "memory://";

/// Transform engine, size reader and export sink over an in-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    blobs: RwLock<HashMap<String, Arc<Vec<u8>>>>,
    next_id: AtomicU64,
    export_dir: Option<PathBuf>,
}

impl MemoryEngine {
    /// Create an engine without an export destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that exports into `dir` (created on first export)
    pub fn with_export_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }

    /// Store encoded bytes under a fresh URI.
    pub async fn insert(&self, bytes: Vec<u8>, format: ImageFormat) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let uri = format!("{}{}{}", URI_SCHEME, id, format.extension());
        self.blobs.write().await.insert(uri.clone(), Arc::new(bytes));
        uri
    }

    /// Store picked bytes and describe them the way a platform picker does.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Decode` if the bytes are not a JPEG or PNG.
    pub async fn add_asset(
        &self,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<AssetDescriptor, EngineError> {
        let format = codec::sniff_format(&bytes)
            .ok_or_else(|| EngineError::Decode("unrecognized image data".to_string()))?;
        let (width, height) = codec::dimensions(&bytes)?;
        let size = bytes.len() as u64;
        let uri = self.insert(bytes, format).await;

        Ok(AssetDescriptor {
            uri,
            file_name: file_name.map(str::to_string),
            width: Some(width),
            height: Some(height),
            file_size_bytes: Some(size),
        })
    }

    /// Encoded bytes stored under `uri`
    pub async fn bytes(&self, uri: &str) -> Option<Arc<Vec<u8>>> {
        self.blobs.read().await.get(uri).cloned()
    }

    /// Drop the bytes stored under `uri`
    pub async fn remove(&self, uri: &str) -> bool {
        self.blobs.write().await.remove(uri).is_some()
    }

    /// Number of stored blobs
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl TransformEngine for MemoryEngine {
    async fn manipulate(
        &self,
        uri: &str,
        ops: &[GeometricOp],
        options: SaveOptions,
    ) -> Result<EngineOutput, EngineError> {
        let source = self
            .bytes(uri)
            .await
            .ok_or_else(|| EngineError::SourceNotFound(uri.to_string()))?;
        let ops = ops.to_vec();

        let (bytes, width, height) =
            tokio::task::spawn_blocking(move || codec::transform(&source, &ops, options))
                .await
                .map_err(|e| EngineError::Task(e.to_string()))??;

        let output_uri = self.insert(bytes.clone(), options.format).await;
        debug!(source = uri, output = %output_uri, width, height, size = bytes.len(), "stored transformed image");

        Ok(EngineOutput {
            uri: output_uri,
            width,
            height,
            bytes: Some(bytes),
        })
    }

    async fn release(&self, uri: &str) {
        if self.remove(uri).await {
            debug!(uri, "released image bytes");
        }
    }
}

#[async_trait]
impl FileSizeReader for MemoryEngine {
    async fn read_size(&self, uri: &str) -> u64 {
        match self.bytes(uri).await {
            Some(bytes) => bytes.len() as u64,
            None => {
                debug!(uri, "size lookup found no bytes, reporting 0");
                0
            }
        }
    }
}

#[async_trait]
impl SaveSink for MemoryEngine {
    async fn save(&self, uri: &str, file_name: &str, mime_type: &str) -> Result<(), EngineError> {
        let dir = self.export_dir.as_ref().ok_or(EngineError::NoExportTarget)?;
        let bytes = self
            .bytes(uri)
            .await
            .ok_or_else(|| EngineError::SourceNotFound(uri.to_string()))?;

        // Only the final component is used so names cannot escape the directory
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| EngineError::InvalidFileName(file_name.to_string()))?;

        tokio::fs::create_dir_all(dir).await?;
        let path = unique_path(dir, base).await?;
        tokio::fs::write(&path, bytes.as_slice()).await?;

        info!(path = %path.display(), mime_type, "exported image");
        Ok(())
    }
}

/// First free path for `name` in `dir`, appending ` (n)` before the
/// extension the way browsers do for repeated downloads.
async fn unique_path(dir: &Path, name: &str) -> Result<PathBuf, EngineError> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, ext) = split_extension(name);
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::codec::tests::encoded_test_image;

    #[tokio::test]
    async fn test_add_asset_describes_bytes() {
        let engine = MemoryEngine::new();
        let png = encoded_test_image(32, 16, ImageFormat::Png);
        let len = png.len() as u64;

        let asset = engine.add_asset(Some("cat.png"), png).await.unwrap();

        assert!(asset.uri.starts_with(URI_SCHEME));
        assert!(asset.uri.ends_with(".png"));
        assert_eq!(asset.file_name.as_deref(), Some("cat.png"));
        assert_eq!((asset.width, asset.height), (Some(32), Some(16)));
        assert_eq!(asset.file_size_bytes, Some(len));
    }

    #[tokio::test]
    async fn test_add_asset_rejects_garbage() {
        let engine = MemoryEngine::new();
        let result = engine.add_asset(None, b"hello".to_vec()).await;
        assert!(matches!(result, Err(EngineError::Decode(_))));
        assert_eq!(engine.blob_count().await, 0);
    }

    #[tokio::test]
    async fn test_manipulate_stores_new_blob() {
        let engine = MemoryEngine::new();
        let source = engine.add_asset(None, encoded_test_image(40, 20, ImageFormat::Png)).await.unwrap();
        let original = engine.bytes(&source.uri).await.unwrap();

        let output = engine
            .manipulate(
                &source.uri,
                &[GeometricOp::Rotate { degrees: 90.0 }],
                SaveOptions::jpeg(None),
            )
            .await
            .unwrap();

        assert_ne!(output.uri, source.uri);
        assert!(output.uri.ends_with(".jpg"));
        assert_eq!((output.width, output.height), (20, 40));
        assert_eq!(
            output.bytes.as_deref().map(<[u8]>::len),
            engine.bytes(&output.uri).await.map(|b| b.len())
        );
        // Source bytes are untouched
        assert_eq!(engine.bytes(&source.uri).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_manipulate_missing_source() {
        let engine = MemoryEngine::new();
        let result = engine.manipulate("memory://404.jpg", &[], SaveOptions::default()).await;
        assert!(matches!(result, Err(EngineError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_manipulate_corrupt_source() {
        let engine = MemoryEngine::new();
        let uri = engine.insert(b"not really a jpeg".to_vec(), ImageFormat::Jpeg).await;
        let result = engine.manipulate(&uri, &[], SaveOptions::default()).await;
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }

    #[tokio::test]
    async fn test_release_drops_blob() {
        let engine = MemoryEngine::new();
        let uri = engine.insert(vec![1, 2, 3], ImageFormat::Jpeg).await;

        engine.release(&uri).await;
        assert_eq!(engine.blob_count().await, 0);
        // Releasing twice is harmless
        engine.release(&uri).await;
    }

    #[tokio::test]
    async fn test_read_size() {
        let engine = MemoryEngine::new();
        let uri = engine.insert(vec![0u8; 123], ImageFormat::Jpeg).await;
        assert_eq!(engine.read_size(&uri).await, 123);
        assert_eq!(engine.read_size("memory://missing.jpg").await, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let engine = MemoryEngine::new();
        let uri = engine.insert(vec![1, 2, 3], ImageFormat::Png).await;
        assert!(engine.remove(&uri).await);
        assert!(!engine.remove(&uri).await);
        assert!(engine.bytes(&uri).await.is_none());
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let export_dir = dir.path().join("exports");
        let engine = MemoryEngine::with_export_dir(&export_dir);
        let uri = engine.insert(vec![9u8; 10], ImageFormat::Jpeg).await;

        engine.save(&uri, "trip-1.jpg", "image/jpeg").await.unwrap();

        let written = std::fs::read(export_dir.join("trip-1.jpg")).unwrap();
        assert_eq!(written, vec![9u8; 10]);
    }

    #[tokio::test]
    async fn test_save_does_not_overwrite() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let engine = MemoryEngine::with_export_dir(dir.path());
        let first = engine.insert(vec![1u8], ImageFormat::Jpeg).await;
        let second = engine.insert(vec![2u8], ImageFormat::Jpeg).await;

        engine.save(&first, "same.jpg", "image/jpeg").await.unwrap();
        engine.save(&second, "same.jpg", "image/jpeg").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("same.jpg")).unwrap(), vec![1u8]);
        assert_eq!(std::fs::read(dir.path().join("same (1).jpg")).unwrap(), vec![2u8]);
    }

    #[tokio::test]
    async fn test_save_strips_directories() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let engine = MemoryEngine::with_export_dir(dir.path());
        let uri = engine.insert(vec![7u8], ImageFormat::Png).await;

        engine.save(&uri, "../../escape.png", "image/png").await.unwrap();
        assert!(dir.path().join("escape.png").exists());
    }

    #[tokio::test]
    async fn test_save_errors() {
        let engine = MemoryEngine::new();
        let uri = engine.insert(vec![1u8], ImageFormat::Jpeg).await;
        assert!(matches!(
            engine.save(&uri, "a.jpg", "image/jpeg").await,
            Err(EngineError::NoExportTarget)
        ));

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let engine = MemoryEngine::with_export_dir(dir.path());
        assert!(matches!(
            engine.save("memory://nope.jpg", "a.jpg", "image/jpeg").await,
            Err(EngineError::SourceNotFound(_))
        ));

        let uri = engine.insert(vec![1u8], ImageFormat::Jpeg).await;
        assert!(matches!(
            engine.save(&uri, "..", "image/jpeg").await,
            Err(EngineError::InvalidFileName(_))
        ));
    }
}
