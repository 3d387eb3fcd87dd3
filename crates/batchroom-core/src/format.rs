//! Encoded image formats and filename extension handling.
//!
//! Records only distinguish JPEG and PNG. The helpers here read a format from
//! a filename or URI, rewrite a filename's extension to match a format, and
//! map names to the MIME type used on export.

use serde::{Deserialize, Serialize};

/// Encoded format of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG, lossy with a quality setting.
    #[default]
    Jpeg,
    /// PNG, lossless; quality is ignored.
    Png,
}

impl ImageFormat {
    /// Parse a user-facing format name (`"jpeg"`, `"jpg"`, `"png"`).
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        Self::from_extension(value.trim())
    }

    /// Map a bare extension (no leading dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// Read the format from the extension of a filename or URI.
    ///
    /// Query strings and fragments are ignored, so
    /// `https://host/a.png?w=10#top` reads as PNG.
    pub fn from_path(path: &str) -> Option<Self> {
        let segment = last_segment(uri_path(path));
        let (_, ext) = split_extension(segment);
        ext.strip_prefix('.').and_then(Self::from_extension)
    }

    /// Canonical extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Png => ".png",
        }
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Jpeg => f.write_str("JPEG"),
            ImageFormat::Png => f.write_str("PNG"),
        }
    }
}

/// Strip the query string and fragment from a URI.
pub fn uri_path(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

/// Final `/`-separated segment of a path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split a filename into stem and extension (with its leading dot).
///
/// A leading dot does not start an extension (`".png"` has no extension),
/// and neither does a trailing one (`"photo."`).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            let ext = &name[idx + 1..];
            if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                (&name[..idx], &name[idx..])
            } else {
                (name, "")
            }
        }
        _ => (name, ""),
    }
}

/// Rewrite a filename's extension to match `format`.
///
/// An extension that already names the format (`.jpeg` for JPEG, `.PNG` for
/// PNG) is kept as written. A blank stem becomes `"image"`.
pub fn with_extension(name: &str, format: ImageFormat) -> String {
    let (stem, ext) = split_extension(name);
    let current = ext.strip_prefix('.').and_then(ImageFormat::from_extension);
    if current == Some(format) && !stem.trim().is_empty() {
        return name.to_string();
    }

    let stem = if stem.trim().is_empty() { "image" } else { stem };
    format!("{}{}", stem, format.extension())
}

/// Export MIME type for a display name: `.png` is PNG, everything else JPEG.
pub fn mime_for_name(name: &str) -> &'static str {
    match ImageFormat::from_path(name) {
        Some(ImageFormat::Png) => ImageFormat::Png.mime_type(),
        _ => ImageFormat::Jpeg.mime_type(),
    }
}
