use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{BlendMode, ColorCorrection};
use crate::error::{ComposeError, ComposeResult};

// ============================================================================
// CODEC
// ============================================================================

/// Decode encoded image bytes (PNG, JPEG, WebP, BMP) to RGBA8.
pub fn decode_image(bytes: &[u8]) -> ComposeResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(ComposeError::Decode("empty image data".into()));
    }
    let img = image::load_from_memory(bytes).map_err(|e| ComposeError::Decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> ComposeResult<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    encoder
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(|e| ComposeError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn read_bytes(path: &Path) -> ComposeResult<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Write already-encoded bytes to `path`.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> ComposeResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

/// File stem used as the default layer name.
pub fn layer_name_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Layer")
        .to_string()
}

// ============================================================================
// SCENE MANIFEST — JSON description of one flatten run
// ============================================================================

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// One layer in a scene manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneLayer {
    pub image: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// World width; defaults to the image's pixel width.
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_one")]
    pub scale: f32,
    #[serde(default = "default_one")]
    pub opacity: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    /// Defaults to the position in the list.
    #[serde(default)]
    pub z_index: Option<i64>,
    /// Precomputed foreground mask applied as background removal.
    #[serde(default)]
    pub mask: Option<PathBuf>,
    #[serde(default)]
    pub color_correction: ColorCorrection,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub layers: Vec<SceneLayer>,
}

impl SceneManifest {
    pub fn parse(json: &str) -> ComposeResult<Self> {
        serde_json::from_str(json).map_err(|e| ComposeError::Scene(e.to_string()))
    }

    /// Load a manifest and resolve relative image/mask paths against its directory.
    pub fn load(path: &Path) -> ComposeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut scene = Self::parse(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        scene.resolve_paths(base);
        Ok(scene)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for layer in &mut self.layers {
            resolve(&mut layer.image);
            if let Some(mask) = layer.mask.as_mut() {
                resolve(mask);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_encode_decode_preserves_pixels() {
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 9, 128]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(decode_image(&bytes).unwrap(), img);
    }

    #[test]
    fn garbage_and_empty_bytes_fail_to_decode() {
        assert!(matches!(decode_image(&[]), Err(ComposeError::Decode(_))));
        assert!(matches!(decode_image(b"not an image"), Err(ComposeError::Decode(_))));
    }

    #[test]
    fn scene_defaults_fill_missing_fields() {
        let scene = SceneManifest::parse(
            r#"{ "layers": [
                { "image": "a.png" },
                { "image": "/abs/b.png", "x": 5, "rotation": 450, "blendMode": "color-dodge",
                  "zIndex": 9, "mask": "b_mask.png", "colorCorrection": { "hue": 30 } }
            ] }"#,
        )
        .unwrap();
        let a = &scene.layers[0];
        assert_eq!(a.scale, 1.0);
        assert_eq!(a.opacity, 1.0);
        assert!(a.visible);
        assert_eq!(a.blend_mode, BlendMode::Normal);
        assert!(a.color_correction.is_identity());

        let b = &scene.layers[1];
        assert_eq!(b.rotation, 450.0);
        assert_eq!(b.blend_mode, BlendMode::ColorDodge);
        assert_eq!(b.z_index, Some(9));
        assert_eq!(b.color_correction.hue, 30.0);
        assert_eq!(b.color_correction.brightness, 100.0);
    }

    #[test]
    fn relative_paths_resolve_against_manifest_dir() {
        let mut scene = SceneManifest::parse(
            r#"{ "layers": [ { "image": "a.png", "mask": "m.png" }, { "image": "/abs/b.png" } ] }"#,
        )
        .unwrap();
        scene.resolve_paths(Path::new("/scenes/demo"));
        assert_eq!(scene.layers[0].image, PathBuf::from("/scenes/demo/a.png"));
        assert_eq!(scene.layers[0].mask, Some(PathBuf::from("/scenes/demo/m.png")));
        assert_eq!(scene.layers[1].image, PathBuf::from("/abs/b.png"));
    }

    #[test]
    fn unknown_blend_mode_is_a_scene_error() {
        let err = SceneManifest::parse(r#"{ "layers": [ { "image": "a.png", "blendMode": "glow" } ] }"#);
        assert!(matches!(err, Err(ComposeError::Scene(_))));
    }
}
