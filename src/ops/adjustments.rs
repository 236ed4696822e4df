// ============================================================================
// COLOR CORRECTION — per-layer filter stack applied at render/export time
// ============================================================================
//
// The stack mirrors CSS filter functions and always runs in the same order:
// brightness → contrast → saturate → hue-rotate → blur. Stages at their
// identity value are skipped, so default settings leave pixels untouched.
// Per-pixel work is parallelized by row via rayon.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::ColorCorrection;
use crate::ops::filters;

// ============================================================================
// HELPER: per-pixel transform
// ============================================================================

/// Apply a per-pixel transform function to every pixel of `img`.
/// `transform` receives (r, g, b, a) as f32 in 0..255 and returns the same.
fn apply_pixel_transform<F>(img: &mut RgbaImage, transform: F)
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = img.width() as usize;
    if w == 0 || img.height() == 0 {
        return;
    }
    let stride = w * 4;
    let raw: &mut [u8] = img;

    raw.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            let (nr, ng, nb, na) = transform(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32);
            px[0] = nr.round().clamp(0.0, 255.0) as u8;
            px[1] = ng.round().clamp(0.0, 255.0) as u8;
            px[2] = nb.round().clamp(0.0, 255.0) as u8;
            px[3] = na.round().clamp(0.0, 255.0) as u8;
        }
    });
}

/// 3×3 color matrix applied to RGB (0..1 range).
type ColorMatrix = [[f32; 3]; 3];

/// CSS `saturate()` matrix. `amount` 1.0 = unchanged, 0.0 = grayscale.
fn saturate_matrix(amount: f32) -> ColorMatrix {
    let s = amount;
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

/// CSS `hue-rotate()` matrix.
fn hue_rotate_matrix(degrees: f32) -> ColorMatrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

fn apply_matrix(m: &ColorMatrix, r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    (
        (m[0][0] * r + m[0][1] * g + m[0][2] * b).clamp(0.0, 1.0),
        (m[1][0] * r + m[1][1] * g + m[1][2] * b).clamp(0.0, 1.0),
        (m[2][0] * r + m[2][1] * g + m[2][2] * b).clamp(0.0, 1.0),
    )
}

// ============================================================================
// FILTER STACK
// ============================================================================

/// Run the full color-correction stack over `img` in place.
pub fn apply_color_correction(img: &mut RgbaImage, cc: &ColorCorrection) {
    let cc = cc.clamped();
    if cc.is_identity() {
        return;
    }

    let brightness = (cc.brightness != 100.0).then_some(cc.brightness / 100.0);
    let contrast = (cc.contrast != 100.0).then_some(cc.contrast / 100.0);
    let saturate = (cc.saturation != 100.0).then(|| saturate_matrix(cc.saturation / 100.0));
    let hue = (cc.hue != 0.0).then(|| hue_rotate_matrix(cc.hue));

    if brightness.is_some() || contrast.is_some() || saturate.is_some() || hue.is_some() {
        apply_pixel_transform(img, move |r, g, b, a| {
            let (mut r, mut g, mut b) = (r / 255.0, g / 255.0, b / 255.0);
            if let Some(k) = brightness {
                r = (r * k).clamp(0.0, 1.0);
                g = (g * k).clamp(0.0, 1.0);
                b = (b * k).clamp(0.0, 1.0);
            }
            if let Some(k) = contrast {
                let intercept = 0.5 - 0.5 * k;
                r = (r * k + intercept).clamp(0.0, 1.0);
                g = (g * k + intercept).clamp(0.0, 1.0);
                b = (b * k + intercept).clamp(0.0, 1.0);
            }
            if let Some(m) = &saturate {
                (r, g, b) = apply_matrix(m, r, g, b);
            }
            if let Some(m) = &hue {
                (r, g, b) = apply_matrix(m, r, g, b);
            }
            (r * 255.0, g * 255.0, b * 255.0, a)
        });
    }

    if cc.blur > 0.0 {
        *img = filters::gaussian_blur(img, cc.blur);
    }
}

/// Extra pixels a layer buffer needs around its body so blur can spread
/// into transparent surroundings.
pub fn filter_margin(cc: &ColorCorrection) -> u32 {
    filters::blur_radius(cc.clamped().blur) as u32
}
