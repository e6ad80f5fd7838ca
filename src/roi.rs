//! Region-of-interest sampling: three skin patches per face, reduced to hue.
//!
//! The geometry is expressed at a square reference resolution and scaled to
//! the frame. With a full 68-point landmark set the patches follow the eyes
//! and eyebrows; with a bare bounding box they use fixed offsets from the box.

use crate::{
    config::RoiConfig,
    constants::{
        CHEEK_BELOW_EYES_FRACTION, CHEEK_OFFSET_X, CHEEK_OFFSET_Y, EYEBROW_LANDMARKS, FOREHEAD_OFFSET_Y,
        LEFT_EYE_LANDMARKS, NUM_FACIAL_LANDMARKS, RIGHT_EYE_LANDMARKS,
    },
    face::{FaceObservation, Point},
    utils::{color::hue, safe_cast::clamped_pixel_range, safe_cast::count_to_f64},
};
use image::RgbImage;
use serde::Serialize;

/// Which skin patch a region covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionKind {
    /// Above the eyebrows
    Forehead,
    /// Image-left cheek
    LeftCheek,
    /// Image-right cheek
    RightCheek,
}

/// A sampled rectangle: centre plus half extents, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorRegion {
    /// Patch this region covers
    pub kind: RegionKind,
    /// Centre point
    pub center: Point,
    /// Half width
    pub half_width: f64,
    /// Half height
    pub half_height: f64,
}

/// Hue statistics of one face in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiSample {
    /// Mean hue over every pixel of all three regions
    pub combined: f64,
    /// Mean hue per region (forehead, left cheek, right cheek)
    ///
    /// A region with no pixels inside the frame reports the combined mean.
    pub regions: [f64; 3],
    /// Number of pixels that contributed
    pub pixel_count: usize,
}

/// Computes anchor regions and samples their hue
#[derive(Debug, Clone)]
pub struct RoiSampler {
    config: RoiConfig,
}

impl RoiSampler {
    /// Create a sampler for the given geometry
    #[must_use]
    pub const fn new(config: RoiConfig) -> Self {
        Self { config }
    }

    /// Scale from reference geometry to frame pixels
    fn scale(&self, width: u32, height: u32) -> f64 {
        f64::from(width.min(height)) / f64::from(self.config.reference_size.max(1))
    }

    /// Derive forehead, left-cheek and right-cheek regions for one face
    #[must_use]
    pub fn anchor_regions(&self, face: &FaceObservation, width: u32, height: u32) -> [AnchorRegion; 3] {
        let scale = self.scale(width, height);
        let forehead_half = (self.config.forehead_half_width * scale, self.config.forehead_half_height * scale);
        let cheek_half = (self.config.cheek_half_width * scale, self.config.cheek_half_height * scale);

        let (forehead, left, right) = if face.landmarks.len() >= NUM_FACIAL_LANDMARKS {
            Self::landmark_centers(face, forehead_half.1)
        } else {
            let cx = face.bbox.center_x();
            let top = face.bbox.top;
            (
                Point::new(cx, FOREHEAD_OFFSET_Y.mul_add(scale, top)),
                Point::new((-CHEEK_OFFSET_X).mul_add(scale, cx), CHEEK_OFFSET_Y.mul_add(scale, top)),
                Point::new(CHEEK_OFFSET_X.mul_add(scale, cx), CHEEK_OFFSET_Y.mul_add(scale, top)),
            )
        };

        [
            AnchorRegion {
                kind: RegionKind::Forehead,
                center: forehead,
                half_width: forehead_half.0,
                half_height: forehead_half.1,
            },
            AnchorRegion {
                kind: RegionKind::LeftCheek,
                center: left,
                half_width: cheek_half.0,
                half_height: cheek_half.1,
            },
            AnchorRegion {
                kind: RegionKind::RightCheek,
                center: right,
                half_width: cheek_half.0,
                half_height: cheek_half.1,
            },
        ]
    }

    /// Region centres from the 68-point layout
    fn landmark_centers(face: &FaceObservation, forehead_half_height: f64) -> (Point, Point, Point) {
        let mean_of = |range: std::ops::RangeInclusive<usize>| {
            let n = count_to_f64(range.clone().count());
            let (sx, sy) = face.landmarks[range]
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            Point::new(sx / n, sy / n)
        };

        let left_eye = mean_of(LEFT_EYE_LANDMARKS);
        let right_eye = mean_of(RIGHT_EYE_LANDMARKS);
        let eye_mid = Point::new((left_eye.x + right_eye.x) / 2.0, (left_eye.y + right_eye.y) / 2.0);

        let brow_top = face.landmarks[EYEBROW_LANDMARKS]
            .iter()
            .map(|p| p.y)
            .fold(f64::INFINITY, f64::min);

        let quarter_width = face.bbox.width() / 4.0;
        let cheek_y = CHEEK_BELOW_EYES_FRACTION.mul_add(face.bbox.height(), eye_mid.y);

        (
            Point::new(eye_mid.x, brow_top - forehead_half_height),
            Point::new(eye_mid.x - quarter_width, cheek_y),
            Point::new(eye_mid.x + quarter_width, cheek_y),
        )
    }

    /// Mean hue over the three regions of one face
    ///
    /// Each region's pixel ranges are clamped to the image per axis before
    /// iterating. Returns `None` if no region overlaps the image.
    #[must_use]
    pub fn sample(image: &RgbImage, regions: &[AnchorRegion; 3]) -> Option<RoiSample> {
        let mut total = 0.0;
        let mut total_count = 0usize;
        let mut region_means = [None; 3];

        for (region, mean) in regions.iter().zip(region_means.iter_mut()) {
            let Some(xs) = clamped_pixel_range(region.center.x, region.half_width, image.width()) else {
                continue;
            };
            let Some(ys) = clamped_pixel_range(region.center.y, region.half_height, image.height()) else {
                continue;
            };

            let mut sum = 0.0;
            let mut count = 0usize;
            for y in ys {
                for x in xs.clone() {
                    sum += hue(*image.get_pixel(x, y));
                    count += 1;
                }
            }

            total += sum;
            total_count += count;
            *mean = Some(sum / count_to_f64(count));
        }

        if total_count == 0 {
            return None;
        }

        let combined = total / count_to_f64(total_count);
        Some(RoiSample {
            combined,
            regions: region_means.map(|m| m.unwrap_or(combined)),
            pixel_count: total_count,
        })
    }
}
