//! Frame comparison functions.
//!
//! Pure functions for comparing video frames using various methods:
//! - Hash-based comparison (pHash, dHash, etc.)
//! - SSIM (Structural Similarity Index)
//! - MSE (Mean Squared Error)
//!
//! The method is chosen once per sync call as a [`FrameComparator`] and
//! every comparison goes through [`FrameComparator::compare`].
//!
//! Uses the `image-compare` crate for SSIM and RMS calculations.

use std::borrow::Cow;

use image::imageops::FilterType;
use image::DynamicImage;
use image_compare::Algorithm;

use super::hash::hash_distance;
use super::types::{ComparisonMethod, FrameCompareResult, HashAlgorithm};

/// Standard size both frames are scaled to when their dimensions differ.
pub const NORMALIZED_WIDTH: u32 = 320;
/// See [`NORMALIZED_WIDTH`].
pub const NORMALIZED_HEIGHT: u32 = 240;

/// Comparison strategy with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameComparator {
    /// Perceptual hash, distance is the Hamming distance.
    Hash {
        algorithm: HashAlgorithm,
        hash_size: u8,
        threshold: u32,
    },
    /// Distance is `(1 - SSIM) * 100`.
    Ssim { threshold: f64 },
    /// Distance is `MSE / 100`, capped at 100.
    Mse { threshold: f64 },
}

impl FrameComparator {
    /// Build a comparator for a method.
    ///
    /// `hash_threshold` applies to hash comparisons, `ssim_mse_threshold`
    /// to the other two.
    pub fn new(
        method: ComparisonMethod,
        algorithm: HashAlgorithm,
        hash_size: u8,
        hash_threshold: u32,
        ssim_mse_threshold: f64,
    ) -> Self {
        match method {
            ComparisonMethod::Hash => Self::Hash {
                algorithm,
                hash_size,
                threshold: hash_threshold,
            },
            ComparisonMethod::Ssim => Self::Ssim {
                threshold: ssim_mse_threshold,
            },
            ComparisonMethod::Mse => Self::Mse {
                threshold: ssim_mse_threshold,
            },
        }
    }

    /// Method implemented by this comparator.
    pub fn method(&self) -> ComparisonMethod {
        match self {
            Self::Hash { .. } => ComparisonMethod::Hash,
            Self::Ssim { .. } => ComparisonMethod::Ssim,
            Self::Mse { .. } => ComparisonMethod::Mse,
        }
    }

    /// Match threshold in distance units.
    pub fn threshold(&self) -> f64 {
        match *self {
            Self::Hash { threshold, .. } => f64::from(threshold),
            Self::Ssim { threshold } | Self::Mse { threshold } => threshold,
        }
    }

    /// Compare two frames. Differently sized frames are normalized first.
    pub fn compare(&self, frame1: &DynamicImage, frame2: &DynamicImage) -> FrameCompareResult {
        let (frame1, frame2) = normalize_frame_pair(frame1, frame2);

        let distance = match *self {
            Self::Hash {
                algorithm,
                hash_size,
                ..
            } => f64::from(hash_distance(&frame1, &frame2, algorithm, hash_size)),
            Self::Ssim { .. } => (1.0 - compute_ssim(&frame1, &frame2)) * 100.0,
            Self::Mse { .. } => (compute_mse(&frame1, &frame2) / 100.0).min(100.0),
        };

        FrameCompareResult {
            distance,
            is_match: distance <= self.threshold(),
            method: self.method(),
        }
    }
}

/// Bring two frames to comparable dimensions.
///
/// Same-size frames are returned unmodified. Otherwise both are resized to
/// 320x240 so neither is distorted towards the other's aspect ratio.
pub fn normalize_frame_pair<'a>(
    frame1: &'a DynamicImage,
    frame2: &'a DynamicImage,
) -> (Cow<'a, DynamicImage>, Cow<'a, DynamicImage>) {
    if frame1.width() == frame2.width() && frame1.height() == frame2.height() {
        return (Cow::Borrowed(frame1), Cow::Borrowed(frame2));
    }

    tracing::trace!(
        "[Compare] Normalizing {}x{} vs {}x{} to {}x{}",
        frame1.width(),
        frame1.height(),
        frame2.width(),
        frame2.height(),
        NORMALIZED_WIDTH,
        NORMALIZED_HEIGHT
    );

    let resize = |f: &DynamicImage| {
        f.resize_exact(NORMALIZED_WIDTH, NORMALIZED_HEIGHT, FilterType::Lanczos3)
    };
    (Cow::Owned(resize(frame1)), Cow::Owned(resize(frame2)))
}

/// Compute SSIM between two same-size frames.
///
/// Returns 0.0 to 1.0 (higher = more similar); 0.0 if SSIM cannot be computed.
pub fn compute_ssim(frame1: &DynamicImage, frame2: &DynamicImage) -> f64 {
    let gray1 = frame1.to_luma8();
    let gray2 = frame2.to_luma8();

    match image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, &gray1, &gray2) {
        Ok(similarity) => similarity.score,
        Err(e) => {
            tracing::debug!("[Compare] SSIM failed: {}", e);
            0.0
        }
    }
}

/// Compute MSE between two same-size frames on the 0-255 grayscale.
///
/// Returns `f64::MAX` if the frames cannot be compared.
pub fn compute_mse(frame1: &DynamicImage, frame2: &DynamicImage) -> f64 {
    let gray1 = frame1.to_luma8();
    let gray2 = frame2.to_luma8();

    // image-compare reports 1 - RMS on a 0..1 scale
    match image_compare::gray_similarity_structure(&Algorithm::RootMeanSquared, &gray1, &gray2) {
        Ok(similarity) => {
            let rms = (1.0 - similarity.score) * 255.0;
            rms * rms
        }
        Err(e) => {
            tracing::debug!("[Compare] MSE failed: {}", e);
            f64::MAX
        }
    }
}

/// Get recommended threshold for a comparison method.
pub fn recommended_threshold(method: ComparisonMethod, hash_size: u8) -> f64 {
    match method {
        // 8x8 (64 bits): ~5, 16x16 (256 bits): ~12
        ComparisonMethod::Hash => {
            if hash_size <= 8 {
                5.0
            } else {
                12.0
            }
        }
        // SSIM >= 0.90
        ComparisonMethod::Ssim => 10.0,
        ComparisonMethod::Mse => 5.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn create_solid_image(r: u8, g: u8, b: u8) -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |_, _| Rgb([r, g, b]));
        DynamicImage::ImageRgb8(img)
    }

    fn create_gradient_image() -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    fn create_checker_image(invert: bool) -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let on = ((x / 8) + (y / 8)) % 2 == 0;
            let v = if on != invert { 255 } else { 0 };
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_ssim_identical() {
        let img = create_gradient_image();
        let ssim = compute_ssim(&img, &img);
        assert!(ssim > 0.99, "Identical images should have SSIM near 1.0, got {}", ssim);
    }

    #[test]
    fn test_mse_identical_and_inverted() {
        let img = create_checker_image(false);
        assert!(compute_mse(&img, &img) < 1.0);

        let inverted = create_checker_image(true);
        assert!(compute_mse(&img, &inverted) > 10_000.0);
    }

    #[test]
    fn test_hash_comparator_matches_identical() {
        let img = create_gradient_image();
        let comparator = FrameComparator::new(
            ComparisonMethod::Hash,
            HashAlgorithm::PHash,
            8,
            5,
            10.0,
        );

        let result = comparator.compare(&img, &img);
        assert!(result.is_match);
        assert_eq!(result.distance, 0.0);
        assert_eq!(result.method, ComparisonMethod::Hash);
    }

    #[test]
    fn test_mse_comparator_rejects_different() {
        let comparator = FrameComparator::Mse { threshold: 10.0 };

        let same = comparator.compare(&create_checker_image(false), &create_checker_image(false));
        assert!(same.is_match);

        let diff = comparator.compare(&create_checker_image(false), &create_checker_image(true));
        assert!(!diff.is_match);
        assert_eq!(diff.distance, 100.0);
    }

    #[test]
    fn test_ssim_comparator_threshold() {
        let comparator = FrameComparator::Ssim { threshold: 10.0 };
        let img = create_gradient_image();
        assert!(comparator.compare(&img, &img).is_match);
        assert_eq!(comparator.threshold(), 10.0);
    }

    #[test]
    fn test_normalize_same_size_borrows() {
        let img1 = create_solid_image(10, 10, 10);
        let img2 = create_solid_image(20, 20, 20);

        let (a, b) = normalize_frame_pair(&img1, &img2);
        assert!(matches!(a, Cow::Borrowed(_)));
        assert!(matches!(b, Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_different_sizes_to_standard() {
        let img1 = DynamicImage::ImageRgb8(RgbImage::from_fn(720, 480, |_, _| Rgb([128, 128, 128])));
        let img2 = DynamicImage::ImageRgb8(RgbImage::from_fn(1920, 1080, |_, _| Rgb([128, 128, 128])));

        let (a, b) = normalize_frame_pair(&img1, &img2);
        assert_eq!((a.width(), a.height()), (NORMALIZED_WIDTH, NORMALIZED_HEIGHT));
        assert_eq!((b.width(), b.height()), (NORMALIZED_WIDTH, NORMALIZED_HEIGHT));
    }

    #[test]
    fn test_different_sized_images_compare() {
        let img1 = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |_, _| Rgb([128, 128, 128])));
        let img2 = DynamicImage::ImageRgb8(RgbImage::from_fn(128, 128, |_, _| Rgb([128, 128, 128])));

        let comparator = FrameComparator::Mse { threshold: 10.0 };
        assert!(comparator.compare(&img1, &img2).is_match);
    }

    #[test]
    fn test_recommended_threshold() {
        assert_eq!(recommended_threshold(ComparisonMethod::Hash, 8), 5.0);
        assert_eq!(recommended_threshold(ComparisonMethod::Hash, 16), 12.0);
        assert_eq!(recommended_threshold(ComparisonMethod::Ssim, 16), 10.0);
    }
}
