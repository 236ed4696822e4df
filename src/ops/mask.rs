// ============================================================================
// MASK COMPOSITOR — foreground mask → alpha channel (background removal)
// ============================================================================
//
// The mask's first channel is pushed through a levels curve and written as
// the alpha of the original image. RGB is never touched, so the operation is
// reversible as long as the caller keeps the original bytes around.

use image::{RgbaImage, imageops};
use rayon::prelude::*;

use crate::error::{ComposeError, ComposeResult};
use crate::io;

/// Mask values at or below this become fully transparent.
pub const LEVELS_BLACK_POINT: u8 = 50;
/// Mask values at or above this become fully opaque.
pub const LEVELS_WHITE_POINT: u8 = 200;

/// Levels curve for a single mask sample.
pub fn levels_alpha(m: u8) -> u8 {
    if m <= LEVELS_BLACK_POINT {
        0
    } else if m >= LEVELS_WHITE_POINT {
        255
    } else {
        let span = (LEVELS_WHITE_POINT - LEVELS_BLACK_POINT) as u32;
        ((m - LEVELS_BLACK_POINT) as u32 * 255 / span) as u8
    }
}

pub fn build_levels_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (m, out) in lut.iter_mut().enumerate() {
        *out = levels_alpha(m as u8);
    }
    lut
}

/// Write the levelled mask into `image`'s alpha channel in place.
/// The mask is stretched to the image size first when they differ.
pub fn apply_mask_to_image(image: &mut RgbaImage, mask: &RgbaImage) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let resized;
    let mask = if mask.dimensions() != (w, h) {
        log::debug!(
            "mask: stretching {}x{} mask to {}x{}",
            mask.width(),
            mask.height(),
            w,
            h
        );
        resized = imageops::resize(mask, w, h, imageops::FilterType::Triangle);
        &resized
    } else {
        mask
    };

    let lut = build_levels_lut();
    let stride = w as usize * 4;
    let mask_raw = mask.as_raw();
    let raw: &mut [u8] = image;
    raw.par_chunks_mut(stride)
        .zip(mask_raw.par_chunks(stride))
        .for_each(|(row, mask_row)| {
            for (px, m) in row.chunks_exact_mut(4).zip(mask_row.chunks_exact(4)) {
                px[3] = lut[m[0] as usize];
            }
        });
}

/// Decode `original` and `mask`, apply the mask as alpha, and return the
/// result as PNG bytes.
pub fn apply_mask(original: &[u8], mask: &[u8]) -> ComposeResult<Vec<u8>> {
    let mut image = io::decode_image(original)?;
    let mask = io::decode_image(mask)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ComposeError::Render("original image has no pixels".into()));
    }
    apply_mask_to_image(&mut image, &mask);
    io::encode_png(&image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png(img: &RgbaImage) -> Vec<u8> {
        io::encode_png(img).unwrap()
    }

    #[test]
    fn levels_reference_points() {
        assert_eq!(levels_alpha(0), 0);
        assert_eq!(levels_alpha(50), 0);
        assert_eq!(levels_alpha(125), 127);
        assert_eq!(levels_alpha(200), 255);
        assert_eq!(levels_alpha(255), 255);
        let lut = build_levels_lut();
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn mask_replaces_alpha_and_keeps_rgb() {
        let original = RgbaImage::from_fn(4, 1, |x, _| Rgba([10 * x as u8, 20, 30, 255]));
        let mask = RgbaImage::from_fn(4, 1, |x, _| {
            let m = [0u8, 125, 255, 60][x as usize];
            Rgba([m, m, m, 255])
        });
        let out = io::decode_image(&apply_mask(&png(&original), &png(&mask)).unwrap()).unwrap();
        let alphas: Vec<u8> = out.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![0, 127, 255, 17]);
        for (a, b) in out.pixels().zip(original.pixels()) {
            assert_eq!(&a.0[..3], &b.0[..3]);
        }
    }

    #[test]
    fn mask_is_stretched_to_original_size() {
        let original = RgbaImage::from_pixel(8, 6, Rgba([1, 2, 3, 255]));
        let mask = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let out = io::decode_image(&apply_mask(&png(&original), &png(&mask)).unwrap()).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert!(out.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn undecodable_input_is_a_decode_error() {
        let ok = png(&RgbaImage::new(1, 1));
        assert!(matches!(apply_mask(b"nope", &ok), Err(ComposeError::Decode(_))));
        assert!(matches!(apply_mask(&ok, b"nope"), Err(ComposeError::Decode(_))));
    }
}
