// ============================================================================
// EXPORT — flatten every visible layer into one bitmap
// ============================================================================
//
// The output covers the union of all visible layer bounds; world
// (min_x, min_y) lands on pixel (0, 0). Each layer is resampled into its own
// buffer by inverse-mapping output pixel centers, color-corrected, then
// blended onto the accumulator in ascending z order.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{Layer, blend_pixel};
use crate::error::{ComposeError, ComposeResult};
use crate::io;
use crate::ops::adjustments;
use crate::ops::transform::{self, Aabb};

/// Largest output edge, in pixels.
pub const MAX_EXPORT_DIM: u32 = 16384;

/// Bilinear sample at fractional texel coordinates, clamp-to-edge.
#[inline]
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        let cx = sx.clamp(0, w as i32 - 1) as u32;
        let cy = sy.clamp(0, h as i32 - 1) as u32;
        let p = img.get_pixel(cx, cy).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let inv_fx = 1.0 - fx;
    let inv_fy = 1.0 - fy;
    let w00 = inv_fx * inv_fy;
    let w10 = fx * inv_fy;
    let w01 = inv_fx * fy;
    let w11 = fx * fy;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let v = p00[c] * w00 + p10[c] * w10 + p01[c] * w01 + p11[c] * w11;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Pixel rectangle `[x0, x1) × [y0, y1)` inside the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Region {
    fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Output pixels a layer can touch, padded for its blur and clipped to the canvas.
fn layer_region(layer: &Layer, origin: &Aabb, out_w: u32, out_h: u32) -> Region {
    let lb = layer.bounds();
    let margin = adjustments::filter_margin(&layer.color_correction) as f32;
    let clip = |v: f32, max: u32| v.max(0.0).min(max as f32) as u32;
    Region {
        x0: clip((lb.min_x - origin.min_x).floor() - margin, out_w),
        y0: clip((lb.min_y - origin.min_y).floor() - margin, out_h),
        x1: clip((lb.max_x - origin.min_x).ceil() + margin, out_w),
        y1: clip((lb.max_y - origin.min_y).ceil() + margin, out_h),
    }
}

/// Resample `img` (the layer's decoded pixels) into a buffer covering `region`.
fn rasterize_layer(img: &RgbaImage, layer: &Layer, origin: &Aabb, region: Region) -> RgbaImage {
    let rw = region.x1 - region.x0;
    let rh = region.y1 - region.y0;
    let mut buf = RgbaImage::new(rw, rh);
    let (iw, ih) = (img.width() as f32, img.height() as f32);
    let (half_w, half_h) = (layer.size.x * 0.5, layer.size.y * 0.5);
    let (tex_sx, tex_sy) = (iw / layer.size.x, ih / layer.size.y);
    let stride = rw as usize * 4;
    let raw: &mut [u8] = &mut buf;

    raw.par_chunks_mut(stride).enumerate().for_each(|(row, out_row)| {
        let wy = origin.min_y + (region.y0 + row as u32) as f32 + 0.5;
        for (col, px) in out_row.chunks_exact_mut(4).enumerate() {
            let wx = origin.min_x + (region.x0 + col as u32) as f32 + 0.5;
            let local = transform::world_to_local(layer, egui::pos2(wx, wy));
            let u = (local.x + half_w) * tex_sx;
            let v = (local.y + half_h) * tex_sy;
            if u < 0.0 || v < 0.0 || u >= iw || v >= ih {
                continue;
            }
            let p = sample_bilinear(img, u - 0.5, v - 0.5);
            px.copy_from_slice(&p.0);
        }
    });
    buf
}

/// Blend `buf` (placed at `region`) onto `out` with the layer's mode and opacity.
fn blend_onto(out: &mut RgbaImage, buf: &RgbaImage, region: Region, layer: &Layer) {
    let stride = out.width() as usize * 4;
    let buf_stride = buf.width() as usize * 4;
    let x_off = region.x0 as usize * 4;
    let mode = layer.blend_mode;
    let opacity = layer.opacity;
    let raw: &mut [u8] = out;
    let rows = &mut raw[region.y0 as usize * stride..region.y1 as usize * stride];

    rows.par_chunks_mut(stride)
        .zip(buf.as_raw().par_chunks(buf_stride))
        .for_each(|(out_row, src_row)| {
            let dst = &mut out_row[x_off..x_off + buf_stride];
            for (d, s) in dst.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let top = Rgba([s[0], s[1], s[2], s[3]]);
                if top[3] == 0 {
                    continue;
                }
                let base = Rgba([d[0], d[1], d[2], d[3]]);
                d.copy_from_slice(&blend_pixel(base, top, mode, opacity).0);
            }
        });
}

/// Rasterize every visible layer into one RGBA bitmap.
pub fn flatten_layers(layers: &[Layer]) -> ComposeResult<RgbaImage> {
    let mut visible: Vec<&Layer> = layers.iter().filter(|l| l.visible).collect();
    if visible.is_empty() {
        return Err(ComposeError::EmptyExport);
    }
    visible.sort_by_key(|l| l.z_index);

    let bounds = transform::union_bounds(visible.iter().map(|l| l.bounds()))
        .ok_or(ComposeError::EmptyExport)?;
    if ![bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(ComposeError::Render("layer bounds are not finite".into()));
    }

    let width = bounds.width().ceil().max(1.0);
    let height = bounds.height().ceil().max(1.0);
    if width > MAX_EXPORT_DIM as f32 || height > MAX_EXPORT_DIM as f32 {
        return Err(ComposeError::Render(format!(
            "output {}x{} exceeds {MAX_EXPORT_DIM}x{MAX_EXPORT_DIM}",
            width, height
        )));
    }
    let (out_w, out_h) = (width as u32, height as u32);
    log::info!("export: {} visible layer(s) into {}x{}", visible.len(), out_w, out_h);

    let mut out = RgbaImage::new(out_w, out_h);
    for layer in visible {
        let Some(source) = layer.pixel_source() else {
            log::debug!("export: skipping text layer '{}'", layer.name);
            continue;
        };
        if !(layer.size.x > 0.0 && layer.size.y > 0.0 && layer.scale > 0.0) {
            log::warn!("export: skipping degenerate layer '{}'", layer.name);
            continue;
        }
        let decoded = match source.decode() {
            Ok(img) => img,
            Err(e) => {
                log::warn!("export: skipping layer '{}': {}", layer.name, e);
                continue;
            }
        };

        let region = layer_region(layer, &bounds, out_w, out_h);
        if region.is_empty() {
            continue;
        }
        let mut buf = rasterize_layer(&decoded, layer, &bounds, region);
        adjustments::apply_color_correction(&mut buf, &layer.color_correction);
        blend_onto(&mut out, &buf, region, layer);
    }
    Ok(out)
}

/// Flatten and encode as PNG.
pub fn export_flattened(layers: &[Layer]) -> ComposeResult<Vec<u8>> {
    let image = flatten_layers(layers)?;
    io::encode_png(&image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BlendMode, ColorCorrection};
    use egui::{pos2, vec2};

    fn image_layer(img: &RgbaImage, x: f32, y: f32, z: i64) -> Layer {
        let bytes = io::encode_png(img).unwrap();
        let mut layer = Layer::from_image_bytes("img", bytes, pos2(x, y), None).unwrap();
        layer.z_index = z;
        layer
    }

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 17) as u8, (y * 29) as u8, ((x + y) * 7) as u8, 255]))
    }

    #[test]
    fn single_layer_round_trips_exactly() {
        let img = gradient(13, 7);
        let out = flatten_layers(&[image_layer(&img, 40.0, -3.0, 0)]).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn single_layer_with_partial_alpha_is_preserved() {
        let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([200, 100, 50, (x * 60 + y + 1) as u8]));
        let out = flatten_layers(&[image_layer(&img, 0.0, 0.0, 0)]).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn invisible_layers_are_absent_and_top_covers_bottom() {
        let red = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let green = RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 255]));
        let blue = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));

        let bottom = image_layer(&red, 0.0, 0.0, 1);
        let mut hidden = image_layer(&green, 100.0, 100.0, 2);
        hidden.visible = false;
        let top = image_layer(&blue, 5.0, 5.0, 3);

        // Insertion order deliberately differs from z order.
        let out = flatten_layers(&[top, hidden, bottom]).unwrap();
        assert_eq!(out.dimensions(), (15, 15));
        assert_eq!(*out.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(7, 7), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(12, 2), Rgba([0, 0, 0, 0]));
        assert!(out.pixels().all(|p| p[1] == 0));
    }

    #[test]
    fn no_visible_layers_is_empty_export() {
        assert!(matches!(flatten_layers(&[]), Err(ComposeError::EmptyExport)));
        let mut layer = image_layer(&gradient(2, 2), 0.0, 0.0, 0);
        layer.visible = false;
        assert!(matches!(flatten_layers(&[layer]), Err(ComposeError::EmptyExport)));
    }

    #[test]
    fn quarter_turn_swaps_output_dimensions() {
        let img = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]));
        let mut layer = image_layer(&img, 0.0, 0.0, 0);
        layer.rotation = 90.0;
        let out = flatten_layers(&[layer]).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        assert!(out.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn scale_enlarges_output() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let mut layer = image_layer(&img, 0.0, 0.0, 0);
        layer.scale = 2.0;
        let out = flatten_layers(&[layer]).unwrap();
        assert_eq!(out.dimensions(), (8, 8));
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn undecodable_layer_is_skipped() {
        let good = image_layer(&RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])), 0.0, 0.0, 0);
        let mut broken = Layer::text("broken", "", pos2(0.0, 0.0), vec2(2.0, 2.0));
        broken.kind = crate::canvas::LayerKind::Image {
            source: crate::canvas::ImageSource::new(b"garbage".to_vec()),
            original: crate::canvas::ImageSource::new(b"garbage".to_vec()),
        };
        broken.z_index = 1;
        let out = flatten_layers(&[good, broken]).unwrap();
        assert!(out.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn text_layers_extend_bounds_but_do_not_draw() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let text = Layer::text("caption", "hi", pos2(2.0, 0.0), vec2(3.0, 2.0));
        let out = flatten_layers(&[image_layer(&img, 0.0, 0.0, 0), text]).unwrap();
        assert_eq!(out.dimensions(), (5, 2));
        assert_eq!(out.get_pixel(4, 1)[3], 0);
    }

    #[test]
    fn opacity_and_blend_mode_are_applied() {
        let base = RgbaImage::from_pixel(2, 2, Rgba([128, 128, 128, 255]));
        let top = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 128, 255]));
        let mut upper = image_layer(&top, 0.0, 0.0, 1);
        upper.blend_mode = BlendMode::Multiply;
        let out = flatten_layers(&[image_layer(&base, 0.0, 0.0, 0), upper.clone()]).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([128, 0, 64, 255]));

        upper.blend_mode = BlendMode::Normal;
        upper.opacity = 0.0;
        let out = flatten_layers(&[image_layer(&base, 0.0, 0.0, 0), upper]).unwrap();
        assert_eq!(*out.get_pixel(1, 1), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn color_correction_runs_at_export_only() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([100, 100, 100, 255]));
        let mut layer = image_layer(&img, 0.0, 0.0, 0);
        layer.color_correction = ColorCorrection { brightness: 50.0, ..Default::default() };
        let out = flatten_layers(std::slice::from_ref(&layer)).unwrap();
        assert_eq!(*out.get_pixel(1, 1), Rgba([50, 50, 50, 255]));
        // Source bytes are untouched.
        assert_eq!(layer.pixel_source().unwrap().decode().unwrap(), img);
    }

    #[test]
    fn exported_bytes_are_png_and_deterministic() {
        let layers = [image_layer(&gradient(9, 5), 0.0, 0.0, 0)];
        let a = export_flattened(&layers).unwrap();
        let b = export_flattened(&layers).unwrap();
        assert_eq!(a, b);
        assert_eq!(io::decode_image(&a).unwrap().dimensions(), (9, 5));
    }

    #[test]
    fn oversized_output_is_a_render_error() {
        let mut layer = image_layer(&gradient(2, 2), 0.0, 0.0, 0);
        layer.scale = 10_000.0;
        assert!(matches!(flatten_layers(&[layer]), Err(ComposeError::Render(_))));
    }
}
