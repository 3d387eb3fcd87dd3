//! Image codec helpers used by [`MemoryEngine`](super::MemoryEngine).
//!
//! Thin wrappers over the `image` crate: decode, rotate, resize, and encode
//! to JPEG or PNG. All functions are synchronous and CPU-bound; the engine
//! runs them on the blocking thread pool.
//!
//! Rotation angles are in degrees, positive = clockwise, and must be whole
//! quarter turns. Output sides are capped at [`MAX_DIMENSION`].

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbImage};

use super::{EngineError, GeometricOp, SaveOptions};
use crate::format::ImageFormat;
use crate::transform::quarter_turns;

/// Filter used for every resize (bilinear).
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Largest width or height a resize may produce.
pub const MAX_DIMENSION: u32 = 16_384;

/// Decode encoded bytes (JPEG or PNG) into an image.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, EngineError> {
    image::load_from_memory(bytes).map_err(|e| EngineError::Decode(e.to_string()))
}

/// Read pixel dimensions from the header without decoding pixels.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), EngineError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| EngineError::Decode(e.to_string()))
}

/// Sniff the encoded format from magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        _ => None,
    }
}

/// Apply geometric ops in order.
pub fn apply_ops(image: DynamicImage, ops: &[GeometricOp]) -> Result<DynamicImage, EngineError> {
    ops.iter().try_fold(image, |img, op| match *op {
        GeometricOp::Rotate { degrees } => rotate(&img, degrees),
        GeometricOp::Resize { width, height } => resize(&img, width, height),
    })
}

/// Full transform: decode, apply ops, encode.
///
/// Returns the encoded bytes with the dimensions of the encoded image.
pub fn transform(
    source: &[u8],
    ops: &[GeometricOp],
    options: SaveOptions,
) -> Result<(Vec<u8>, u32, u32), EngineError> {
    let image = apply_ops(decode(source)?, ops)?;
    let bytes = encode(&image, options)?;
    Ok((bytes, image.width(), image.height()))
}

/// Resize to the requested sides.
///
/// With one side given the other follows the source aspect ratio; with both
/// the output is exactly `width x height`; with neither the image is
/// returned unchanged.
pub fn resize(
    image: &DynamicImage,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<DynamicImage, EngineError> {
    let (w, h) = target_dimensions(image.width(), image.height(), width, height)?;

    // Fast path: if dimensions match, just clone
    if image.width() == w && image.height() == h {
        return Ok(image.clone());
    }

    Ok(image.resize_exact(w, h, RESIZE_FILTER))
}

/// Resolve requested sides against the source dimensions.
///
/// Zero sides and sides above [`MAX_DIMENSION`] are rejected, including a
/// side derived from the aspect ratio.
pub fn target_dimensions(
    src_width: u32,
    src_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(u32, u32), EngineError> {
    let invalid = EngineError::InvalidDimensions {
        width: width.unwrap_or(src_width),
        height: height.unwrap_or(src_height),
    };

    let (w, h) = match (width, height) {
        (Some(0), _) | (_, Some(0)) => return Err(invalid),
        (None, None) => return Ok((src_width, src_height)),
        (Some(w), Some(h)) => (w, h),
        _ if src_width == 0 || src_height == 0 => return Err(invalid),
        (Some(w), None) => (w, scale_side(src_height, w, src_width)),
        (None, Some(h)) => (scale_side(src_width, h, src_height), h),
    };

    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(EngineError::InvalidDimensions { width: w, height: h });
    }
    Ok((w, h))
}

/// `side * target / reference`, rounded, at least 1 (saturating at `u32::MAX`).
fn scale_side(side: u32, target: u32, reference: u32) -> u32 {
    let scaled = (side as f64 * target as f64 / reference as f64).round() as u32;
    scaled.max(1)
}

/// Rotate clockwise by `degrees`, which must be a whole number of quarter turns.
pub fn rotate(image: &DynamicImage, degrees: f64) -> Result<DynamicImage, EngineError> {
    match quarter_turns(degrees) {
        Some(0) => Ok(image.clone()),
        Some(1) => Ok(image.rotate90()),
        Some(2) => Ok(image.rotate180()),
        Some(3) => Ok(image.rotate270()),
        _ => Err(EngineError::UnsupportedRotation { degrees }),
    }
}

/// Map a [0.0, 1.0] quality to the JPEG encoder's 1-100 scale.
///
/// `None` and NaN mean best quality; out-of-range values are clamped.
pub fn jpeg_quality(quality: Option<f32>) -> u8 {
    let q = match quality {
        Some(q) if !q.is_nan() => q.clamp(0.0, 1.0),
        _ => 1.0,
    };
    ((q * 100.0).round() as u8).clamp(1, 100)
}

/// Encode according to `options`.
pub fn encode(image: &DynamicImage, options: SaveOptions) -> Result<Vec<u8>, EngineError> {
    match options.format {
        ImageFormat::Jpeg => encode_jpeg(&image.to_rgb8(), jpeg_quality(options.quality)),
        ImageFormat::Png => encode_png(image),
    }
}

/// Encode RGB pixels as JPEG with a 1-100 quality.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidDimensions { width, height });
    }

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EngineError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Encode as PNG, keeping an alpha channel when the image has one.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidDimensions { width, height });
    }

    let mut buffer = Cursor::new(Vec::new());
    let encoder = PngEncoder::new(&mut buffer);
    let result = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
    } else {
        let rgb = image.to_rgb8();
        encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
    };
    result.map_err(|e| EngineError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Create a simple gradient image for testing.
    pub(crate) fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                ((x * 255) / width.max(1)) as u8,
                ((y * 255) / height.max(1)) as u8,
                128,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Encoded test image in the given format.
    pub(crate) fn encoded_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let options = SaveOptions {
            format,
            quality: Some(0.9),
        };
        encode(&create_test_image(width, height), options).unwrap()
    }

    #[test]
    fn test_encode_jpeg_magic_bytes() {
        let jpeg = encoded_test_image(40, 20, ImageFormat::Jpeg);
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        let len = jpeg.len();
        assert_eq!(&jpeg[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_png_magic_bytes() {
        let png = encoded_test_image(40, 20, ImageFormat::Png);
        assert_eq!(&png[0..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(
            sniff_format(&encoded_test_image(4, 4, ImageFormat::Png)),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            sniff_format(&encoded_test_image(4, 4, ImageFormat::Jpeg)),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(sniff_format(b"not an image"), None);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode(b"garbage"), Err(EngineError::Decode(_))));
    }

    #[test]
    fn test_dimensions_from_header() {
        let png = encoded_test_image(64, 48, ImageFormat::Png);
        assert_eq!(dimensions(&png).unwrap(), (64, 48));
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(None), 100);
        assert_eq!(jpeg_quality(Some(1.0)), 100);
        assert_eq!(jpeg_quality(Some(0.5)), 50);
        assert_eq!(jpeg_quality(Some(0.0)), 1);
        assert_eq!(jpeg_quality(Some(7.0)), 100);
        assert_eq!(jpeg_quality(Some(-1.0)), 1);
        assert_eq!(jpeg_quality(Some(f32::NAN)), 100);
    }

    #[test]
    fn test_quality_affects_jpeg_size() {
        let img = create_test_image(64, 64);
        let low = encode(&img, SaveOptions::jpeg(Some(0.1))).unwrap();
        let high = encode(&img, SaveOptions::jpeg(Some(1.0))).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn test_target_dimensions_policy() {
        assert_eq!(target_dimensions(200, 100, None, Some(50)).unwrap(), (100, 50));
        assert_eq!(target_dimensions(200, 100, Some(50), None).unwrap(), (50, 25));
        assert_eq!(target_dimensions(200, 100, Some(30), Some(70)).unwrap(), (30, 70));
        assert_eq!(target_dimensions(200, 100, None, None).unwrap(), (200, 100));
    }

    #[test]
    fn test_target_dimensions_rejects_zero() {
        assert!(target_dimensions(200, 100, Some(0), None).is_err());
        assert!(target_dimensions(200, 100, None, Some(0)).is_err());
        assert!(target_dimensions(0, 0, None, Some(10)).is_err());
    }

    #[test]
    fn test_target_dimensions_never_collapses() {
        // 1000x1 scaled to height 1 keeps width; 1x1000 scaled to width 10 rounds height up to 1
        assert_eq!(target_dimensions(1000, 1, None, Some(1)).unwrap(), (1000, 1));
        assert_eq!(target_dimensions(1000, 1, Some(10), None).unwrap(), (10, 1));
    }

    #[test]
    fn test_resize_exact() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, Some(20), Some(40)).unwrap();
        assert_eq!((resized.width(), resized.height()), (20, 40));
    }

    #[test]
    fn test_resize_noop() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, None, None).unwrap();
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }

    #[test]
    fn test_rotate_quarter_turns() {
        let img = create_test_image(100, 50);
        let r90 = rotate(&img, 90.0).unwrap();
        assert_eq!((r90.width(), r90.height()), (50, 100));

        let r180 = rotate(&img, 180.0).unwrap();
        assert_eq!((r180.width(), r180.height()), (100, 50));

        let r270 = rotate(&img, -90.0).unwrap();
        assert_eq!((r270.width(), r270.height()), (50, 100));

        let r360 = rotate(&img, 360.0).unwrap();
        assert_eq!((r360.width(), r360.height()), (100, 50));
    }

    #[test]
    fn test_rotate_90_moves_top_left_to_top_right() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let rotated = rotate(&DynamicImage::ImageRgb8(img), 90.0).unwrap().to_rgb8();
        // Clockwise: the top-left pixel ends up in the top-right corner
        assert_eq!(rotated.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_rotate_rejects_other_angles() {
        let img = create_test_image(10, 10);
        assert!(matches!(
            rotate(&img, 45.0),
            Err(EngineError::UnsupportedRotation { .. })
        ));
        assert!(rotate(&img, f64::NAN).is_err());
    }

    #[test]
    fn test_target_dimensions_rejects_oversized() {
        assert!(matches!(
            target_dimensions(200, 100, None, Some(u32::MAX)),
            Err(EngineError::InvalidDimensions { .. })
        ));
        assert!(target_dimensions(200, 100, Some(MAX_DIMENSION + 1), Some(10)).is_err());
        // Derived side over the cap
        assert!(target_dimensions(1, 1000, Some(100), None).is_err());
        assert_eq!(
            target_dimensions(200, 100, Some(MAX_DIMENSION), None).unwrap(),
            (MAX_DIMENSION, MAX_DIMENSION / 2)
        );
    }

    #[test]
    fn test_resize_oversized_fails_without_allocating() {
        let img = create_test_image(4, 4);
        assert!(resize(&img, None, Some(u32::MAX)).is_err());
    }

    #[test]
    fn test_transform_pipeline() {
        let png = encoded_test_image(80, 40, ImageFormat::Png);
        let ops = [
            GeometricOp::Rotate { degrees: 90.0 },
            GeometricOp::Resize {
                width: None,
                height: Some(20),
            },
        ];
        let (bytes, width, height) = transform(&png, &ops, SaveOptions::jpeg(Some(0.8))).unwrap();

        assert_eq!((width, height), (10, 20));
        assert_eq!(sniff_format(&bytes), Some(ImageFormat::Jpeg));
        assert_eq!(dimensions(&bytes).unwrap(), (10, 20));
    }

    #[test]
    fn test_png_keeps_alpha() {
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(10, 10, image::Rgba([1, 2, 3, 128])));
        let png = encode(&rgba, SaveOptions::png()).unwrap();
        assert!(decode(&png).unwrap().color().has_alpha());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
