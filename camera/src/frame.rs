//! Frame decoding.
//!
use image::{imageops, ImageFormat, RgbImage};

use crate::Error;

/// Decode a JPEG frame into an RGB image.
///
/// With `mirror` set, the image is flipped horizontally so that a front camera behaves like a
/// mirror for the person in front of it.
pub fn decode_jpeg(data: &[u8], mirror: bool) -> Result<RgbImage, Error> {
    let mut image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8();
    if mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }

    Ok(image)
}

#[cfg(test)]
pub(crate) mod test {

    use std::io::Cursor;

    use image::{DynamicImage, ImageOutputFormat, Rgb};

    use super::*;

    /// Encode an image with a red left half and a blue right half.
    pub(crate) fn red_blue_jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, ImageOutputFormat::Jpeg(95))
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_keeps_orientation() -> Result<(), Error> {
        let image = decode_jpeg(&red_blue_jpeg(32, 16), false)?;
        assert_eq!(image.dimensions(), (32, 16));

        let left = image.get_pixel(4, 8);
        assert!(left[0] > left[2], "left should be red, got {left:?}");

        Ok(())
    }

    #[test]
    fn test_decode_mirrors() -> Result<(), Error> {
        let image = decode_jpeg(&red_blue_jpeg(32, 16), true)?;

        let left = image.get_pixel(4, 8);
        let right = image.get_pixel(28, 8);
        assert!(left[2] > left[0], "left should be blue, got {left:?}");
        assert!(right[0] > right[2], "right should be red, got {right:?}");

        Ok(())
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_jpeg(b"definitely not a jpeg", false).is_err());
    }
}
