//! Transform kinds and the per-record rules behind them.
//!
//! Rotate, resize and convert go through the transform engine; rename is
//! pure string manipulation. This module decides *what* each record should
//! become (geometric ops, output encoding, output name) and leaves the
//! *when* to [`crate::batch`].

use serde::{Deserialize, Serialize};

use crate::engine::{GeometricOp, SaveOptions};
use crate::format::{self, split_extension, ImageFormat};
use crate::ImageRecord;

/// Base name used when a rename request trims to nothing.
pub const DEFAULT_BASE_NAME: &str = "image";

/// Default clockwise rotation step in degrees.
pub const DEFAULT_ROTATION: f64 = 90.0;

/// One transform applied to one record or to the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Rotate clockwise and re-encode as JPEG. The name is left untouched.
    Rotate { degrees: f64 },
    /// Resize and re-encode in the record's current format.
    Resize(ResizeRequest),
    /// Re-encode in the given format.
    Convert { format: ImageFormat },
    /// Rename every record to `{base}-{n}{ext}`.
    Rename { base_name: String },
}

impl Transform {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Rotate { .. } => "rotate",
            Transform::Resize(_) => "resize",
            Transform::Convert { .. } => "convert",
            Transform::Rename { .. } => "rename",
        }
    }
}

/// Resize targets as typed in the UI.
///
/// A target of 0 means "not given". Targets are rounded to whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub height: f64,
    pub width: f64,
    /// JPEG quality in [0.0, 1.0]; ignored when the record is PNG
    pub quality: f32,
}

impl ResizeRequest {
    pub fn new(height: f64, width: f64, quality: f32) -> Self {
        Self {
            height,
            width,
            quality,
        }
    }

    /// Geometric ops for these targets, or `None` for an unsupported
    /// combination (negative, NaN or infinite targets).
    ///
    /// | height | width | ops |
    /// |--------|-------|-----|
    /// | > 0    | 0     | resize to height, keep aspect |
    /// | 0      | > 0   | resize to width, keep aspect |
    /// | > 0    | > 0   | exact resize |
    /// | 0      | 0     | none (re-encode only) |
    pub fn plan(&self) -> Option<Vec<GeometricOp>> {
        let h = self.height;
        let w = self.width;
        if !h.is_finite() || !w.is_finite() {
            return None;
        }

        if h > 0.0 && w == 0.0 {
            Some(vec![GeometricOp::Resize {
                width: None,
                height: Some(to_pixels(h)),
            }])
        } else if h == 0.0 && w > 0.0 {
            Some(vec![GeometricOp::Resize {
                width: Some(to_pixels(w)),
                height: None,
            }])
        } else if h > 0.0 && w > 0.0 {
            Some(vec![GeometricOp::Resize {
                width: Some(to_pixels(w)),
                height: Some(to_pixels(h)),
            }])
        } else if h == 0.0 && w == 0.0 {
            Some(Vec::new())
        } else {
            None
        }
    }
}

/// Round a positive UI target to at least one pixel.
///
/// Targets beyond `u32` saturate; the engine rejects oversized images.
fn to_pixels(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Number of clockwise quarter turns in `degrees`, if it is a multiple of 90.
pub fn quarter_turns(degrees: f64) -> Option<u8> {
    if !degrees.is_finite() {
        return None;
    }
    let turns = degrees / 90.0;
    if (turns - turns.round()).abs() > QUARTER_TURN_EPSILON {
        return None;
    }
    Some(turns.round().rem_euclid(4.0) as u8)
}

/// Tolerance, in quarter turns, when matching a rotation angle.
const QUARTER_TURN_EPSILON: f64 = 1e-6;

/// How a record's name changes when its bytes are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameRule {
    /// Keep the name as is.
    Keep,
    /// Rewrite the extension to the output format.
    MatchFormat,
}

/// Everything the engine needs to produce one replacement record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnitPlan {
    pub ops: Vec<GeometricOp>,
    pub options: SaveOptions,
    pub name_rule: NameRule,
}

impl UnitPlan {
    /// Name of the replacement record.
    pub fn output_name(&self, record: &ImageRecord) -> String {
        match self.name_rule {
            NameRule::Keep => record.name.clone(),
            NameRule::MatchFormat => format::with_extension(&record.name, self.options.format),
        }
    }
}

/// Plan one engine unit for `record`.
///
/// `resize_ops` is the already-validated plan of a resize request; it is
/// ignored by the other transforms. Returns `None` for rename.
pub(crate) fn plan_unit(
    transform: &Transform,
    record: &ImageRecord,
    resize_ops: &[GeometricOp],
) -> Option<UnitPlan> {
    match transform {
        // Rotate always emits JPEG but keeps the old extension; a `.png`
        // name then describes JPEG bytes until the next resize/convert.
        Transform::Rotate { degrees } => Some(UnitPlan {
            ops: vec![GeometricOp::Rotate { degrees: *degrees }],
            options: SaveOptions::jpeg(None),
            name_rule: NameRule::Keep,
        }),
        Transform::Resize(request) => {
            let options = match record.format() {
                ImageFormat::Png => SaveOptions::png(),
                ImageFormat::Jpeg => SaveOptions::jpeg(Some(request.quality)),
            };
            Some(UnitPlan {
                ops: resize_ops.to_vec(),
                options,
                name_rule: NameRule::MatchFormat,
            })
        }
        Transform::Convert { format } => Some(UnitPlan {
            ops: Vec::new(),
            options: SaveOptions {
                format: *format,
                quality: None,
            },
            name_rule: NameRule::MatchFormat,
        }),
        Transform::Rename { .. } => None,
    }
}

/// Trim a requested base name, falling back to [`DEFAULT_BASE_NAME`].
pub fn normalize_base_name(base_name: &str) -> &str {
    let trimmed = base_name.trim();
    if trimmed.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        trimmed
    }
}

/// Rename every record to `{base}-{1-based position}{extension}`.
///
/// The extension is the one in each record's current name; a record
/// without one gets the canonical extension of its format.
pub fn rename_all(records: &[ImageRecord], base_name: &str) -> Vec<ImageRecord> {
    let base = normalize_base_name(base_name);
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| ImageRecord {
            name: format!("{}-{}{}", base, idx + 1, extension_or_format(record)),
            ..record.clone()
        })
        .collect()
}

/// Rename a single record.
///
/// The new name is trimmed; a blank name is rejected with `None`. A typed
/// JPEG or PNG extension is kept as written. Any other name gets the
/// record's current extension appended, and a bare extension such as
/// `".png"` gets [`DEFAULT_BASE_NAME`] as its stem.
pub fn rename_one(record: &ImageRecord, new_name: &str) -> Option<ImageRecord> {
    let trimmed = new_name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let typed = split_extension(trimmed)
        .1
        .strip_prefix('.')
        .and_then(ImageFormat::from_extension);
    let bare = trimmed
        .strip_prefix('.')
        .and_then(ImageFormat::from_extension)
        .is_some();

    let name = if typed.is_some() {
        trimmed.to_string()
    } else if bare {
        format!("{}{}", DEFAULT_BASE_NAME, trimmed)
    } else {
        format!("{}{}", trimmed, extension_or_format(record))
    };

    Some(ImageRecord {
        name,
        ..record.clone()
    })
}

fn extension_or_format(record: &ImageRecord) -> &str {
    match record.extension() {
        "" => record.format().extension(),
        ext => ext,
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
