// ============================================================================
// IMAGE FILTERS — Gaussian blur for the color-correction stack
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

/// Kernel half-width for a given standard deviation (3 sigma).
pub fn blur_radius(sigma: f32) -> usize {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0).ceil() as usize
}

fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = blur_radius(sigma);
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *k = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Separable Gaussian blur with `sigma` as the CSS `blur()` standard deviation.
///
/// Colors are premultiplied before filtering and everything outside the buffer
/// counts as transparent, so opaque content fades out at the edges instead of
/// smearing its border pixels. Callers that want the fade to be visible must
/// pad the buffer by [`blur_radius`] first.
pub fn gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let kernel = build_gaussian_kernel(sigma);
    if w == 0 || h == 0 || kernel.len() == 1 {
        return src.clone();
    }
    let radius = (kernel.len() / 2) as isize;
    let stride = w * 4;

    // Premultiplied f32 buffer.
    let mut buf_in = vec![0.0f32; w * h * 4];
    buf_in
        .par_chunks_mut(stride)
        .zip(src.as_raw().par_chunks(stride))
        .for_each(|(row_out, row_in)| {
            for (o, p) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
                let a = p[3] as f32 / 255.0;
                o[0] = p[0] as f32 * a;
                o[1] = p[1] as f32 * a;
                o[2] = p[2] as f32 * a;
                o[3] = p[3] as f32;
            }
        });

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; w * h * 4];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = x as isize + ki as isize - radius;
                if sx < 0 || sx >= w as isize {
                    continue;
                }
                let idx = sx as usize * 4;
                for c in 0..4 {
                    acc[c] += row_in[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row), unpremultiplied on the way out ---
    let mut dst = vec![0u8; w * h * 4];
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = y as isize + ki as isize - radius;
                if sy < 0 || sy >= h as isize {
                    continue;
                }
                let idx = sy as usize * stride + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            let out = &mut row_out[x * 4..x * 4 + 4];
            let a = acc[3];
            if a < 0.5 {
                out.copy_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let inv = 255.0 / a;
            out[0] = (acc[0] * inv).round().clamp(0.0, 255.0) as u8;
            out[1] = (acc[1] * inv).round().clamp(0.0, 255.0) as u8;
            out[2] = (acc[2] * inv).round().clamp(0.0, 255.0) as u8;
            out[3] = a.round().clamp(0.0, 255.0) as u8;
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst).unwrap_or_else(|| src.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = build_gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[12]).abs() < 1e-7);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let img = RgbaImage::from_fn(5, 5, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 7, 255]));
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn uniform_interior_keeps_color() {
        let img = RgbaImage::from_pixel(41, 41, Rgba([200, 100, 50, 255]));
        let out = gaussian_blur(&img, 2.0);
        assert_eq!(*out.get_pixel(20, 20), Rgba([200, 100, 50, 255]));
        // Edges fade because the outside is transparent, color stays put.
        let edge = out.get_pixel(0, 20);
        assert!(edge[3] < 255);
        assert_eq!(&edge.0[..3], &[200, 100, 50]);
    }

    #[test]
    fn transparent_neighbours_do_not_darken_color() {
        let mut img = RgbaImage::new(21, 21);
        img.put_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let out = gaussian_blur(&img, 1.5);
        let p = out.get_pixel(11, 10);
        assert!(p[3] > 0);
        assert_eq!(p[0], 255);
        assert_eq!(p[1], 0);
    }
}
