//! Structural similarity between grayscale frames
//!
//! Global SSIM over the full frame (K1 = 0.01, K2 = 0.03, L = 255).
//! Scores 1.0 for identical frames; frames with mismatched dimensions score
//! 0.0 and are treated as distinct.

use image::GrayImage;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const L: f64 = 255.0;

/// Structural-similarity score between two grayscale images in [-1, 1].
#[must_use]
pub fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let n = (a.width() * a.height()) as f64;
    if n == 0.0 {
        return 0.0;
    }

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        sum_a += f64::from(pa.0[0]);
        sum_b += f64::from(pb.0[0]);
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut covariance = 0.0;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let da = f64::from(pa.0[0]) - mean_a;
        let db = f64::from(pb.0[0]) - mean_b;
        var_a += da * da;
        var_b += db * db;
        covariance += da * db;
    }
    var_a /= n;
    var_b /= n;
    covariance /= n;

    let c1 = (K1 * L).powi(2);
    let c2 = (K2 * L).powi(2);

    ((2.0 * mean_a * mean_b + c1) * (2.0 * covariance + c2))
        / ((mean_a.powi(2) + mean_b.powi(2) + c1) * (var_a + var_b + c2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_identical_images_score_one() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 16 + y) % 256) as u8]));
        assert!((ssim(&img, &img) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_flat_images_score_one() {
        let img = GrayImage::from_pixel(8, 8, Luma([128]));
        assert!((ssim(&img, &img) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_image_scores_low() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 0 } else { 255 }]));
        let inverted = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 255 } else { 0 }]));
        assert!(ssim(&img, &inverted) < 0.1);
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let a = GrayImage::from_pixel(8, 8, Luma([100]));
        let b = GrayImage::from_pixel(4, 4, Luma([100]));
        assert_eq!(ssim(&a, &b), 0.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let a = GrayImage::from_fn(16, 16, |x, y| Luma([((x + y) * 7 % 256) as u8]));
        let b = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 3 + y) * 5 % 256) as u8]));
        assert!((ssim(&a, &b) - ssim(&b, &a)).abs() < 1e-12);
    }
}
