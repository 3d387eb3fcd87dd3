//! Initial record metadata for picked assets.
//!
//! Derivation is a pure function of the asset descriptor the picker returns:
//! no bytes are read and no engine is consulted.

use serde::{Deserialize, Serialize};

use crate::format::{last_segment, uri_path};
use crate::ImageRecord;

/// Fallback display name when neither the picker nor the URI supplies one.
pub const DEFAULT_FILE_NAME: &str = "image.jpg";

/// A picker-provided reference to user-selected image content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// Location of the picked bytes
    pub uri: String,
    /// Original filename, when the platform reports one
    pub file_name: Option<String>,
    /// Width hint in pixels
    pub width: Option<u32>,
    /// Height hint in pixels
    pub height: Option<u32>,
    /// Byte size hint
    pub file_size_bytes: Option<u64>,
}

impl AssetDescriptor {
    /// Descriptor with only a URI, as returned by pickers that report nothing else
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

/// Build the initial record for a picked asset.
///
/// The name comes from the reported filename when it is non-blank, then
/// from the last path segment of the URI (query and fragment stripped),
/// then [`DEFAULT_FILE_NAME`]. Missing dimension and size hints become 0.
pub fn derive_record(asset: &AssetDescriptor) -> ImageRecord {
    ImageRecord {
        uri: asset.uri.clone(),
        name: derive_name(asset),
        width: asset.width.unwrap_or(0),
        height: asset.height.unwrap_or(0),
        size_bytes: asset.file_size_bytes.unwrap_or(0),
    }
}

/// Derive records for a whole picker result, in picker order.
pub fn derive_records(assets: &[AssetDescriptor]) -> Vec<ImageRecord> {
    assets.iter().map(derive_record).collect()
}

fn derive_name(asset: &AssetDescriptor) -> String {
    if let Some(name) = asset.file_name.as_deref() {
        if !name.trim().is_empty() {
            return name.to_string();
        }
    }

    name_from_uri(&asset.uri).unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

/// Final path segment of a URI, without query string or fragment.
///
/// Returns `None` when that segment is empty (e.g. a URI ending in `/`).
pub fn name_from_uri(uri: &str) -> Option<String> {
    let segment = last_segment(uri_path(uri)).trim();
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefers_file_name() {
        let asset = AssetDescriptor {
            uri: "file:///cache/ABC123.jpg".to_string(),
            file_name: Some("IMG_0042.HEIC".to_string()),
            ..Default::default()
        };
        assert_eq!(derive_record(&asset).name, "IMG_0042.HEIC");
    }

    #[test]
    fn test_blank_file_name_falls_back_to_uri() {
        let asset = AssetDescriptor {
            uri: "file:///cache/ABC123.jpg".to_string(),
            file_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(derive_record(&asset).name, "ABC123.jpg");
    }

    #[test]
    fn test_name_strips_query_and_fragment() {
        let asset = AssetDescriptor::from_uri("https://example.com/photos/beach.png?size=large#view");
        assert_eq!(derive_record(&asset).name, "beach.png");
    }

    #[test]
    fn test_name_defaults_when_segment_empty() {
        assert_eq!(derive_record(&AssetDescriptor::from_uri("https://example.com/")).name, "image.jpg");
        assert_eq!(derive_record(&AssetDescriptor::from_uri("")).name, "image.jpg");
        assert_eq!(derive_record(&AssetDescriptor::from_uri("/dir/?q=1")).name, "image.jpg");
    }

    #[test]
    fn test_opaque_uri_becomes_name() {
        assert_eq!(
            derive_record(&AssetDescriptor::from_uri("blob:abc-123")).name,
            "blob:abc-123"
        );
    }

    #[test]
    fn test_hints_are_used() {
        let asset = AssetDescriptor {
            uri: "a.jpg".to_string(),
            file_name: None,
            width: Some(4032),
            height: Some(3024),
            file_size_bytes: Some(2_500_000),
        };
        let record = derive_record(&asset);
        assert_eq!((record.width, record.height), (4032, 3024));
        assert_eq!(record.size_bytes, 2_500_000);
    }

    #[test]
    fn test_missing_hints_default_to_zero() {
        let record = derive_record(&AssetDescriptor::from_uri("a.jpg"));
        assert_eq!((record.width, record.height, record.size_bytes), (0, 0, 0));
    }

    #[test]
    fn test_derive_records_keeps_order() {
        let assets = vec![
            AssetDescriptor::from_uri("x/1.jpg"),
            AssetDescriptor::from_uri("x/2.png"),
        ];
        let names: Vec<String> = derive_records(&assets).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["1.jpg", "2.png"]);
    }

    #[test]
    fn test_descriptor_deserializes_picker_keys() {
        let asset: AssetDescriptor = toml::from_str(
            r#"
            uri = "file:///a.png"
            fileName = "a.png"
            width = 3
            height = 2
            fileSizeBytes = 42
            "#,
        )
        .unwrap();
        assert_eq!(asset.file_size_bytes, Some(42));
        assert_eq!(asset.file_name.as_deref(), Some("a.png"));

        let bare: AssetDescriptor = toml::from_str(r#"uri = "blob:1""#).unwrap();
        assert_eq!(bare, AssetDescriptor::from_uri("blob:1"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
