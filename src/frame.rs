//! Decoded video frames handed to the pipeline by the frame source.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::Arc;

/// An immutable color image plus its capture timestamp
///
/// The pixel buffer is shared, so handing a frame to the detector thread
/// does not copy it. The pipeline never keeps a frame past one step.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap an already decoded image
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionFailure` for an empty image
    pub fn new(image: RgbImage, captured_at: DateTime<Utc>) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::AcquisitionFailure(format!(
                "Empty frame: {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            image: Arc::new(image),
            captured_at,
        })
    }

    /// Build a frame from a packed RGB888 buffer
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionFailure` if the buffer does not match the dimensions
    pub fn from_raw_rgb(width: u32, height: u32, bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Result<Self> {
        let len = bytes.len();
        let image = RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
            Error::AcquisitionFailure(format!("Buffer of {len} bytes does not hold a {width}x{height} RGB image"))
        })?;
        Self::new(image, captured_at)
    }

    /// Decode an encoded image (PNG, JPEG)
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionFailure` if the bytes cannot be decoded
    pub fn decode(bytes: &[u8], captured_at: DateTime<Utc>) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| Error::AcquisitionFailure(format!("Failed to decode frame: {e}")))?
            .to_rgb8();
        Self::new(image, captured_at)
    }

    /// Pixel data
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Capture timestamp
    #[must_use]
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Image width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rgb() {
        let frame = Frame::from_raw_rgb(4, 2, vec![0u8; 4 * 2 * 3], Utc::now()).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn test_from_raw_rgb_short_buffer() {
        let result = Frame::from_raw_rgb(4, 2, vec![0u8; 5], Utc::now());
        assert!(matches!(result, Err(Error::AcquisitionFailure(_))));
    }

    #[test]
    fn test_empty_image_rejected() {
        let result = Frame::new(RgbImage::new(0, 0), Utc::now());
        assert!(matches!(result, Err(Error::AcquisitionFailure(_))));
    }

    #[test]
    fn test_decode_garbage() {
        let result = Frame::decode(b"not an image", Utc::now());
        assert!(matches!(result, Err(Error::AcquisitionFailure(_))));
    }

    #[test]
    fn test_decode_png() {
        let image = RgbImage::from_pixel(3, 3, image::Rgb([200, 120, 90]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let frame = Frame::decode(&bytes, Utc::now()).unwrap();
        assert_eq!(frame.image().get_pixel(1, 1), &image::Rgb([200, 120, 90]));
    }
}
