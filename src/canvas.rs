use std::sync::Arc;

use egui::{Pos2, Vec2, pos2, vec2};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComposeResult;
use crate::ops::transform::{self, Aabb};

pub type LayerId = Uuid;

/// Viewport zoom limits.
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-layer compositing operator. Names follow the CSS `mix-blend-mode`
/// keywords so scene files and display adapters can use them verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Returns all blend modes for UI display
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Hue,
            BlendMode::Saturation,
            BlendMode::Color,
            BlendMode::Luminosity,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::HardLight => "Hard Light",
            BlendMode::SoftLight => "Soft Light",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::Hue => "Hue",
            BlendMode::Saturation => "Saturation",
            BlendMode::Color => "Color",
            BlendMode::Luminosity => "Luminosity",
        }
    }

    /// The canvas `globalCompositeOperation` keyword for this mode.
    /// Normal maps to plain source-over.
    pub fn composite_operation(&self) -> &'static str {
        match self {
            BlendMode::Normal => "source-over",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
            BlendMode::Hue => "hue",
            BlendMode::Saturation => "saturation",
            BlendMode::Color => "color",
            BlendMode::Luminosity => "luminosity",
        }
    }

    /// Parse a CSS keyword (`"color-dodge"`) or display name (`"Color Dodge"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim().to_lowercase().replace(' ', "-");
        if key == "source-over" {
            return Some(BlendMode::Normal);
        }
        Self::all()
            .iter()
            .copied()
            .find(|m| m.composite_operation() == key || (key == "normal" && *m == BlendMode::Normal))
    }

    fn is_non_separable(&self) -> bool {
        matches!(
            self,
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity
        )
    }
}

/// Composite `top` over `base` using `mode` at the given layer opacity.
///
/// Colors are treated as straight (non-premultiplied) sRGB in 0..1. The blend
/// result is mixed with the source by the backdrop alpha and then composited
/// source-over, following the W3C compositing model.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    let opacity = opacity.min(1.0);

    // Empty backdrop: every mode reduces to the source pixel
    if base[3] == 0 {
        let a = (top[3] as f32 * opacity).round().clamp(0.0, 255.0) as u8;
        return Rgba([top[0], top[1], top[2], a]);
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel — just overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let cb = [base[0] as f32 / 255.0, base[1] as f32 / 255.0, base[2] as f32 / 255.0];
    let cs = [top[0] as f32 / 255.0, top[1] as f32 / 255.0, top[2] as f32 / 255.0];
    let ab = base[3] as f32 / 255.0;
    let a_s = (top[3] as f32 / 255.0) * opacity;

    let blended = if mode.is_non_separable() {
        blend_non_separable(cb, cs, mode)
    } else {
        [
            blend_channel(cb[0], cs[0], mode),
            blend_channel(cb[1], cs[1], mode),
            blend_channel(cb[2], cs[2], mode),
        ]
    };

    let out_a = a_s + ab * (1.0 - a_s);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let mixed = (1.0 - ab) * cs[i] + ab * blended[i];
        let c = (mixed * a_s + cb[i] * ab * (1.0 - a_s)) / out_a;
        out[i] = (c * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn blend_channel(base: f32, top: f32, mode: BlendMode) -> f32 {
    match mode {
        BlendMode::Normal => top,
        BlendMode::Multiply => base * top,
        BlendMode::Screen => base + top - base * top,
        BlendMode::Overlay => hard_light_channel(top, base),
        BlendMode::Darken => base.min(top),
        BlendMode::Lighten => base.max(top),
        BlendMode::ColorDodge => color_dodge_channel(base, top),
        BlendMode::ColorBurn => color_burn_channel(base, top),
        BlendMode::HardLight => hard_light_channel(base, top),
        BlendMode::SoftLight => soft_light_channel(base, top),
        BlendMode::Difference => (base - top).abs(),
        BlendMode::Exclusion => base + top - 2.0 * base * top,
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => top,
    }
}

// Blend mode helper functions
fn hard_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base * 2.0 * top
    } else {
        let t = 2.0 * top - 1.0;
        base + t - base * t
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if base <= 0.0 {
        0.0
    } else if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if base >= 1.0 {
        1.0
    } else if top <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - base) / top).min(1.0)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

fn blend_non_separable(cb: [f32; 3], cs: [f32; 3], mode: BlendMode) -> [f32; 3] {
    match mode {
        BlendMode::Hue => set_lum(set_sat(cs, sat(cb)), lum(cb)),
        BlendMode::Saturation => set_lum(set_sat(cb, sat(cs)), lum(cb)),
        BlendMode::Color => set_lum(cs, lum(cb)),
        _ => set_lum(cb, lum(cs)),
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > 0.0 {
        for v in &mut out {
            *v = l + (*v - l) * l / (l - n);
        }
    }
    if x > 1.0 && x - l > 0.0 {
        for v in &mut out {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let mut idx = [0usize, 1, 2];
    idx.sort_by(|&a, &b| c[a].total_cmp(&c[b]));
    let (min_i, mid_i, max_i) = (idx[0], idx[1], idx[2]);
    let mut out = [0.0f32; 3];
    if c[max_i] > c[min_i] {
        out[mid_i] = (c[mid_i] - c[min_i]) * s / (c[max_i] - c[min_i]);
        out[max_i] = s;
    }
    out
}

// ============================================================================
// COLOR CORRECTION
// ============================================================================

/// Non-destructive per-layer filter stack, applied at render and export time.
/// Always fully populated; `Default` is the identity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCorrection {
    /// Percent, 0..=200.
    pub brightness: f32,
    /// Percent, 0..=200.
    pub contrast: f32,
    /// Percent, 0..=200.
    pub saturation: f32,
    /// Degrees, -180..=180.
    pub hue: f32,
    /// Blur radius in pixels, 0..=20.
    pub blur: f32,
}

impl Default for ColorCorrection {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            hue: 0.0,
            blur: 0.0,
        }
    }
}

impl ColorCorrection {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Copy with every field clamped to its documented range.
    /// Non-finite values fall back to the default for that field.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let fix = |v: f32, fallback: f32, lo: f32, hi: f32| {
            if v.is_finite() { v.clamp(lo, hi) } else { fallback }
        };
        Self {
            brightness: fix(self.brightness, d.brightness, 0.0, 200.0),
            contrast: fix(self.contrast, d.contrast, 0.0, 200.0),
            saturation: fix(self.saturation, d.saturation, 0.0, 200.0),
            hue: fix(self.hue, d.hue, -180.0, 180.0),
            blur: fix(self.blur, d.blur, 0.0, 20.0),
        }
    }

    /// Equivalent CSS filter string, in the order the export pipeline applies it.
    pub fn css_filter(&self) -> String {
        format!(
            "brightness({}%) contrast({}%) saturate({}%) hue-rotate({}deg) blur({}px)",
            self.brightness, self.contrast, self.saturation, self.hue, self.blur
        )
    }
}

// ============================================================================
// LAYERS
// ============================================================================

/// Immutable encoded image bytes shared between layer states.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageSource(Arc<[u8]>);

impl ImageSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn decode(&self) -> ComposeResult<RgbaImage> {
        crate::io::decode_image(&self.0)
    }

    /// True when both handles point at the same allocation.
    pub fn same_data(&self, other: &ImageSource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageSource({} bytes)", self.0.len())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    /// `source` is what is displayed; `original` is the bytes the layer was
    /// created from and is never replaced.
    Image { source: ImageSource, original: ImageSource },
    /// Reserved. Text layers take part in bounds and gestures but have no renderer.
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    /// Top-left of the unrotated, unscaled rectangle in world space.
    pub position: Pos2,
    /// Intrinsic width/height in world units.
    pub size: Vec2,
    /// Degrees, clockwise, never normalized.
    pub rotation: f32,
    pub scale: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub visible: bool,
    pub locked: bool,
    pub masked: bool,
    pub z_index: i64,
    pub color_correction: ColorCorrection,
}

impl Layer {
    /// Build an image layer from encoded bytes. The height follows the decoded
    /// aspect ratio; `width` defaults to the image's pixel width.
    pub fn from_image_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        position: Pos2,
        width: Option<f32>,
    ) -> ComposeResult<Self> {
        let source = ImageSource::new(bytes);
        let decoded = source.decode()?;
        let (iw, ih) = decoded.dimensions();
        let width = width
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(iw as f32);
        let height = width * ih as f32 / iw as f32;

        Ok(Self::with_kind(
            name,
            LayerKind::Image { original: source.clone(), source },
            position,
            vec2(width, height),
        ))
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>, position: Pos2, size: Vec2) -> Self {
        Self::with_kind(name, LayerKind::Text { text: text.into() }, position, size)
    }

    fn with_kind(name: impl Into<String>, kind: LayerKind, position: Pos2, size: Vec2) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            position,
            size,
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            visible: true,
            locked: false,
            masked: false,
            z_index: 0,
            color_correction: ColorCorrection::default(),
        }
    }

    pub fn pixel_source(&self) -> Option<&ImageSource> {
        match &self.kind {
            LayerKind::Image { source, .. } => Some(source),
            LayerKind::Text { .. } => None,
        }
    }

    pub fn original_pixel_source(&self) -> Option<&ImageSource> {
        match &self.kind {
            LayerKind::Image { original, .. } => Some(original),
            LayerKind::Text { .. } => None,
        }
    }

    /// World-space center of the layer rectangle.
    pub fn center(&self) -> Pos2 {
        self.position + self.size * 0.5
    }

    /// World-space AABB after rotation and scale.
    pub fn bounds(&self) -> Aabb {
        transform::transformed_bounds(
            self.position.x,
            self.position.y,
            self.size.x,
            self.size.y,
            self.rotation,
            self.scale,
        )
    }

    fn apply(&mut self, patch: &LayerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            if size.x > 0.0 && size.y > 0.0 {
                self.size = size;
            }
        }
        if let Some(rotation) = patch.rotation.filter(|r| r.is_finite()) {
            self.rotation = rotation;
        }
        if let Some(scale) = patch.scale.filter(|s| s.is_finite() && *s > 0.0) {
            self.scale = scale;
        }
        if let Some(opacity) = patch.opacity.filter(|o| o.is_finite()) {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(mode) = patch.blend_mode {
            self.blend_mode = mode;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
        if let Some(cc) = patch.color_correction {
            self.color_correction = cc.clamped();
        }
    }
}

/// Partial field update for [`LayerStore::update`]. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub position: Option<Pos2>,
    pub size: Option<Vec2>,
    pub rotation: Option<f32>,
    pub scale: Option<f32>,
    pub opacity: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub z_index: Option<i64>,
    pub color_correction: Option<ColorCorrection>,
}

// ============================================================================
// VIEWPORT
// ============================================================================

/// Maps world coordinates to screen coordinates: `screen = world * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub offset: Vec2,
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset: Vec2::ZERO, scale: 1.0 }
    }
}

impl Viewport {
    pub fn world_to_screen(&self, p: Pos2) -> Pos2 {
        pos2(p.x * self.scale + self.offset.x, p.y * self.scale + self.offset.y)
    }

    pub fn screen_to_world(&self, p: Pos2) -> Pos2 {
        pos2((p.x - self.offset.x) / self.scale, (p.y - self.offset.y) / self.scale)
    }

    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }
}

// ============================================================================
// LAYER STORE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZDirection {
    Up,
    Down,
}

/// Ordered layer collection. Always kept sorted ascending by `z_index`
/// (stable, so equal keys keep insertion order).
#[derive(Clone, Debug, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
    selected: Option<LayerId>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in draw order (lowest z first).
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.visible)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    /// One above the current maximum, or 0 for an empty store.
    pub fn next_z_index(&self) -> i64 {
        self.layers.iter().map(|l| l.z_index).max().map_or(0, |z| z + 1)
    }

    pub fn add(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.layers.push(layer);
        self.resort();
        id
    }

    /// Remove a layer, clearing the selection if it was selected.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.layers.iter().position(|l| l.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.layers.remove(idx))
    }

    /// Apply a partial update. Returns `false` for unknown ids.
    pub fn update(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        self.modify(id, |layer| layer.apply(patch))
    }

    /// Mutation helper: run `f` on the layer and re-derive draw order.
    pub fn modify<F>(&mut self, id: LayerId, f: F) -> bool
    where
        F: FnOnce(&mut Layer),
    {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        f(layer);
        self.resort();
        true
    }

    /// Swap z with the adjacent layer in the requested direction.
    /// No-op at the top/bottom of the stack or for unknown ids.
    pub fn move_z(&mut self, id: LayerId, direction: ZDirection) -> bool {
        self.resort();
        let Some(idx) = self.layers.iter().position(|l| l.id == id) else {
            return false;
        };
        let neighbour = match direction {
            ZDirection::Up if idx + 1 < self.layers.len() => idx + 1,
            ZDirection::Down if idx > 0 => idx - 1,
            _ => return false,
        };
        let z = self.layers[idx].z_index;
        self.layers[idx].z_index = self.layers[neighbour].z_index;
        self.layers[neighbour].z_index = z;
        self.layers.swap(idx, neighbour);
        self.resort();
        true
    }

    /// Select a layer, or clear the selection. Unknown ids clear it.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id.filter(|id| self.contains(*id));
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Replace the displayed pixels with a background-removed derivative.
    /// The original bytes are left untouched.
    pub fn set_masked_source(&mut self, id: LayerId, masked: ImageSource) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        let LayerKind::Image { source, .. } = &mut layer.kind else {
            return false;
        };
        *source = masked;
        layer.masked = true;
        true
    }

    /// Point the displayed pixels back at the true original.
    pub fn restore_original(&mut self, id: LayerId) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        let LayerKind::Image { source, original } = &mut layer.kind else {
            return false;
        };
        *source = original.clone();
        layer.masked = false;
        true
    }

    fn resort(&mut self) {
        self.layers.sort_by_key(|l| l.z_index);
    }
}

// ============================================================================
// DISPLAY PROJECTION
// ============================================================================

/// Screen-space placement of one layer, for display adapters.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedLayer {
    pub id: LayerId,
    pub center: Pos2,
    /// Unrotated on-screen size (intrinsic size × layer scale × viewport scale).
    pub size: Vec2,
    pub rotation: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub filter: ColorCorrection,
    pub selected: bool,
    pub locked: bool,
}

/// Project visible layers to screen space in draw order.
pub fn composite(store: &LayerStore, viewport: &Viewport) -> Vec<RenderedLayer> {
    store
        .visible()
        .map(|layer| RenderedLayer {
            id: layer.id,
            center: viewport.world_to_screen(layer.center()),
            size: layer.size * (layer.scale * viewport.scale),
            rotation: layer.rotation,
            opacity: layer.opacity,
            blend_mode: layer.blend_mode,
            filter: layer.color_correction,
            selected: store.selected() == Some(layer.id),
            locked: layer.locked,
        })
        .collect()
}
