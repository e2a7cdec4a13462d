use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level, threshold};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use log::debug;

/// Line detection runs on a copy scaled down to this width; skew angles are
/// scale-invariant and full-resolution Hough is far too slow.
const DETECTION_WIDTH: u32 = 1000;

/// Lines deviating more than this from horizontal are table rules or page
/// borders, not skewed text.
const MAX_SKEW_DEGREES: f32 = 15.0;

/// Below this the rotation would resample the page for no OCR gain.
const MIN_CORRECTION_DEGREES: f32 = 0.5;

/// Normalizes a rendered certificate page for OCR: grayscale, deskew,
/// denoise, contrast stretch, binarize, in that order.
pub struct PageNormalizer {
    deskew_enabled: bool,
}

impl PageNormalizer {
    pub fn new(deskew_enabled: bool) -> Self {
        PageNormalizer { deskew_enabled }
    }

    pub fn normalize(&self, page: &DynamicImage) -> GrayImage {
        let mut gray = page.grayscale().to_luma8();

        if self.deskew_enabled {
            if let Some(skew) = Self::detect_skew_angle(&gray) {
                debug!("correcting page skew of {:.1} degrees", skew);
                gray = rotate_about_center(
                    &gray,
                    -skew.to_radians(),
                    Interpolation::Bilinear,
                    Luma([255u8]),
                );
            }
        }

        let denoised = median_filter(&gray, 1, 1);
        let smoothed = gaussian_blur_f32(&denoised, 1.0);
        let equalized = equalize_histogram(&smoothed);
        let level = otsu_level(&equalized);
        threshold(&equalized, level)
    }

    /// Measures page skew in degrees, positive meaning the content is
    /// rotated clockwise. Returns `None` when no near-horizontal structure
    /// is found or the deviation is too small to bother correcting.
    fn detect_skew_angle(gray: &GrayImage) -> Option<f32> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let detection = if width > DETECTION_WIDTH {
            let scaled_height =
                ((height as f32 * DETECTION_WIDTH as f32 / width as f32).round() as u32).max(1);
            imageops::resize(gray, DETECTION_WIDTH, scaled_height, FilterType::Triangle)
        } else {
            gray.clone()
        };

        let edges = canny(&detection, 50.0, 100.0);
        let options = LineDetectionOptions {
            vote_threshold: detection.width() / 4,
            suppression_radius: 8,
        };
        let lines = detect_lines(&edges, options);

        // Horizontal structure sits at a polar angle of 90 degrees; the
        // median deviation across all near-horizontal lines is the skew.
        let mut deviations: Vec<f32> = lines
            .iter()
            .map(|line| line.angle_in_degrees as f32 - 90.0)
            .filter(|d| d.abs() <= MAX_SKEW_DEGREES)
            .collect();
        if deviations.is_empty() {
            return None;
        }
        deviations.sort_by(|a, b| a.total_cmp(b));
        let median = deviations[deviations.len() / 2];

        (median.abs() >= MIN_CORRECTION_DEGREES).then_some(median)
    }
}
