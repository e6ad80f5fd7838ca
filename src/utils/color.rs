//! RGB to HSV conversion for skin-hue sampling.

use image::Rgb;

/// Hue, saturation and value of one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`
    pub hue: f64,
    /// Saturation, `[0, 1]`
    pub saturation: f64,
    /// Value, `[0, 1]`
    pub value: f64,
}

/// Convert an 8-bit RGB pixel to HSV
///
/// Achromatic pixels (r == g == b) get hue 0.
#[must_use]
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0.map(|c| f64::from(c) / 255.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    let saturation = if max <= 0.0 { 0.0 } else { delta / max };

    Hsv {
        hue,
        saturation,
        value: max,
    }
}

/// Hue component only
#[must_use]
pub fn hue(pixel: Rgb<u8>) -> f64 {
    rgb_to_hsv(pixel).hue
}
