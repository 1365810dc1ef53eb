//! Perceptual hashing for frame comparison.
//!
//! Uses the `image_hasher` crate which provides pHash, dHash, aHash, and BlockHash.
//!
//! # Hash Algorithms
//!
//! - **PHash**: DCT-based, best for different encodes/color grading
//! - **DHash**: Gradient-based, fast, good for same encode
//! - **AHash**: Simplest, fastest, less robust
//! - **BlockHash**: Block-based, good for partial matching

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};

use super::types::HashAlgorithm;

fn hash_alg(algorithm: HashAlgorithm) -> HashAlg {
    match algorithm {
        // Mean over DCT coefficients; see `create_hasher`.
        HashAlgorithm::PHash => HashAlg::Mean,
        HashAlgorithm::DHash => HashAlg::Gradient,
        HashAlgorithm::AHash => HashAlg::Mean,
        HashAlgorithm::BlockHash => HashAlg::Blockhash,
    }
}

/// Create a hasher with the given algorithm and size.
///
/// Use this when you need to hash many images with the same settings.
/// `hash_size` is the side length in bits (8 = 64-bit hash, 16 = 256-bit).
pub fn create_hasher(algorithm: HashAlgorithm, hash_size: u8) -> Hasher {
    let side = u32::from(hash_size.max(2));
    let config = HasherConfig::new()
        .hash_alg(hash_alg(algorithm))
        .hash_size(side, side);
    match algorithm {
        HashAlgorithm::PHash => config.preproc_dct().to_hasher(),
        _ => config.to_hasher(),
    }
}

/// Compute a perceptual hash of an image.
pub fn compute_hash(image: &DynamicImage, algorithm: HashAlgorithm, hash_size: u8) -> ImageHash {
    create_hasher(algorithm, hash_size).hash_image(image)
}

/// Compute Hamming distance between two hashes.
///
/// # Typical Thresholds (16x16)
/// - 0: Identical frames
/// - 1-12: Same frame, different encode
/// - 20+: Different frames
pub fn hamming_distance(hash1: &ImageHash, hash2: &ImageHash) -> u32 {
    hash1.dist(hash2)
}

/// Hash both frames with one hasher and return their distance.
pub fn hash_distance(
    frame1: &DynamicImage,
    frame2: &DynamicImage,
    algorithm: HashAlgorithm,
    hash_size: u8,
) -> u32 {
    let hasher = create_hasher(algorithm, hash_size);
    hamming_distance(&hasher.hash_image(frame1), &hasher.hash_image(frame2))
}
