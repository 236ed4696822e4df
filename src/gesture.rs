// ============================================================================
// GESTURES — pointer-driven pan / move / rotate / scale state machine
// ============================================================================
//
// All pointer coordinates are screen space. Anchors are captured on
// pointer-down and live only inside the active `GestureState` variant; every
// move recomputes from the anchors, never incrementally.

use egui::{Pos2, Vec2, pos2, vec2};

use crate::canvas::{Layer, LayerId, LayerStore, Viewport};
use crate::ops::transform;

/// Smallest scale a scale gesture can produce.
pub const MIN_LAYER_SCALE: f32 = 0.1;
/// Floor for the cursor-to-center distance captured when scaling starts.
pub const MIN_ANCHOR_DISTANCE: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    PanningViewport {
        start_cursor: Pos2,
        start_offset: Vec2,
    },
    DraggingLayer {
        id: LayerId,
        start_cursor: Pos2,
        start_position: Pos2,
    },
    RotatingLayer {
        id: LayerId,
        /// Layer center in screen space.
        center: Pos2,
        /// Cursor angle around `center` at pointer-down, radians.
        start_angle: f32,
        start_rotation: f32,
    },
    ScalingLayer {
        id: LayerId,
        center: Pos2,
        start_distance: f32,
        start_scale: f32,
    },
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }

    /// Layer the gesture is transforming, if any.
    pub fn target(&self) -> Option<LayerId> {
        match *self {
            GestureState::DraggingLayer { id, .. }
            | GestureState::RotatingLayer { id, .. }
            | GestureState::ScalingLayer { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// What a screen point lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    RotateHandle(LayerId),
    ScaleHandle(LayerId),
    Body(LayerId),
    Empty,
}

/// Handle geometry, in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleStyle {
    pub radius: f32,
    /// Distance of the rotate handle above the top edge midpoint.
    pub rotate_offset: f32,
}

impl Default for HandleStyle {
    fn default() -> Self {
        Self { radius: 10.0, rotate_offset: 30.0 }
    }
}

/// Layer center in screen space: `world_center * scale + offset`.
pub fn screen_center(layer: &Layer, viewport: &Viewport) -> Pos2 {
    viewport.world_to_screen(layer.center())
}

/// Screen positions of the (rotate, scale) handles for `layer`.
pub fn handle_positions(layer: &Layer, viewport: &Viewport, style: &HandleStyle) -> (Pos2, Pos2) {
    let [tl, tr, br, _] = transform::layer_corners(layer);
    let top_mid = viewport.world_to_screen(pos2((tl.x + tr.x) * 0.5, (tl.y + tr.y) * 0.5));
    let (sin, cos) = (layer.rotation as f64).to_radians().sin_cos();
    let up = vec2(sin as f32, -cos as f32);
    (top_mid + up * style.rotate_offset, viewport.world_to_screen(br))
}

/// Classify a screen point. Handles of the selected, unlocked layer win over
/// bodies; bodies are tested topmost first.
pub fn hit_test(store: &LayerStore, viewport: &Viewport, cursor: Pos2, style: &HandleStyle) -> HitTarget {
    if let Some(layer) = store.selected_layer().filter(|l| l.visible && !l.locked) {
        let (rotate, scale) = handle_positions(layer, viewport, style);
        if rotate.distance(cursor) <= style.radius {
            return HitTarget::RotateHandle(layer.id);
        }
        if scale.distance(cursor) <= style.radius {
            return HitTarget::ScaleHandle(layer.id);
        }
    }

    let world = viewport.screen_to_world(cursor);
    store
        .iter()
        .rev()
        .filter(|l| l.visible)
        .find(|l| transform::contains_point(l, world))
        .map_or(HitTarget::Empty, |l| HitTarget::Body(l.id))
}

fn cursor_angle(center: Pos2, cursor: Pos2) -> f32 {
    (cursor.y - center.y).atan2(cursor.x - center.x)
}

/// Owns the gesture state and the knobs that shape it.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureController {
    state: GestureState,
    pub handles: HandleStyle,
    pub zoom_sensitivity: f32,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(HandleStyle::default(), 0.001)
    }
}

impl GestureController {
    pub fn new(handles: HandleStyle, zoom_sensitivity: f32) -> Self {
        Self { state: GestureState::Idle, handles, zoom_sensitivity }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn pointer_down(&mut self, store: &mut LayerStore, viewport: &Viewport, cursor: Pos2) -> GestureState {
        self.state = match hit_test(store, viewport, cursor, &self.handles) {
            HitTarget::RotateHandle(id) => match store.get(id) {
                Some(layer) => {
                    let center = screen_center(layer, viewport);
                    GestureState::RotatingLayer {
                        id,
                        center,
                        start_angle: cursor_angle(center, cursor),
                        start_rotation: layer.rotation,
                    }
                }
                None => GestureState::Idle,
            },
            HitTarget::ScaleHandle(id) => match store.get(id) {
                Some(layer) => {
                    let center = screen_center(layer, viewport);
                    GestureState::ScalingLayer {
                        id,
                        center,
                        start_distance: center.distance(cursor).max(MIN_ANCHOR_DISTANCE),
                        start_scale: layer.scale,
                    }
                }
                None => GestureState::Idle,
            },
            HitTarget::Body(id) => {
                store.select(Some(id));
                match store.get(id) {
                    Some(layer) if !layer.locked => GestureState::DraggingLayer {
                        id,
                        start_cursor: cursor,
                        start_position: layer.position,
                    },
                    _ => GestureState::Idle,
                }
            }
            HitTarget::Empty => {
                store.select(None);
                GestureState::PanningViewport { start_cursor: cursor, start_offset: viewport.offset }
            }
        };
        log::trace!("gesture: pointer down -> {:?}", self.state);
        self.state
    }

    /// Apply the active gesture for a cursor position. Returns `true` when
    /// the viewport or a layer changed.
    pub fn pointer_move(&mut self, store: &mut LayerStore, viewport: &mut Viewport, cursor: Pos2) -> bool {
        match self.state {
            GestureState::Idle => false,
            GestureState::PanningViewport { start_cursor, start_offset } => {
                viewport.offset = start_offset + (cursor - start_cursor);
                true
            }
            GestureState::DraggingLayer { id, start_cursor, start_position } => {
                let position = start_position + (cursor - start_cursor) / viewport.scale;
                modify_unlocked(store, id, |l| l.position = position)
            }
            GestureState::RotatingLayer { id, center, start_angle, start_rotation } => {
                let delta = (cursor_angle(center, cursor) - start_angle).to_degrees();
                modify_unlocked(store, id, |l| l.rotation = start_rotation + delta)
            }
            GestureState::ScalingLayer { id, center, start_distance, start_scale } => {
                let scale = (start_scale * center.distance(cursor) / start_distance).max(MIN_LAYER_SCALE);
                modify_unlocked(store, id, |l| l.scale = scale)
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.state = GestureState::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Exponential zoom about the world origin, only while the zoom modifier
    /// is held. Returns `true` when the viewport scale was touched.
    pub fn wheel(&self, viewport: &mut Viewport, delta_y: f32, zoom_modifier: bool) -> bool {
        if !zoom_modifier || !delta_y.is_finite() {
            return false;
        }
        let factor = (-delta_y * self.zoom_sensitivity).exp();
        viewport.set_scale(viewport.scale * factor);
        true
    }
}

/// Mutate a layer only if it still exists and is not locked.
fn modify_unlocked<F>(store: &mut LayerStore, id: LayerId, f: F) -> bool
where
    F: FnOnce(&mut Layer),
{
    if !store.get(id).is_some_and(|l| !l.locked) {
        return false;
    }
    store.modify(id, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{LayerPatch, MAX_ZOOM, MIN_ZOOM};

    /// 100×50 layer at world (100, 100).
    fn setup() -> (LayerStore, Viewport, LayerId) {
        let mut store = LayerStore::new();
        let id = store.add(Layer::text("a", "", pos2(100.0, 100.0), vec2(100.0, 50.0)));
        (store, Viewport::default(), id)
    }

    #[test]
    fn pointer_down_on_body_selects_and_drags() {
        let (mut store, mut vp, id) = setup();
        vp.scale = 2.0;
        let mut g = GestureController::default();
        let cursor = vp.world_to_screen(pos2(120.0, 110.0));
        assert!(matches!(g.pointer_down(&mut store, &vp, cursor), GestureState::DraggingLayer { .. }));
        assert_eq!(store.selected(), Some(id));

        assert!(g.pointer_move(&mut store, &mut vp, cursor + vec2(40.0, -20.0)));
        assert_eq!(store.get(id).unwrap().position, pos2(120.0, 90.0));
        g.pointer_up();
        assert!(g.state().is_idle());
        assert!(!g.pointer_move(&mut store, &mut vp, pos2(0.0, 0.0)));
        assert_eq!(store.get(id).unwrap().position, pos2(120.0, 90.0));
    }

    #[test]
    fn locked_layer_is_selected_but_never_dragged() {
        let (mut store, mut vp, id) = setup();
        store.update(id, &LayerPatch { locked: Some(true), ..Default::default() });
        let mut g = GestureController::default();
        assert_eq!(g.pointer_down(&mut store, &vp, pos2(150.0, 120.0)), GestureState::Idle);
        assert_eq!(store.selected(), Some(id));
        assert!(!g.pointer_move(&mut store, &mut vp, pos2(300.0, 300.0)));
        assert_eq!(store.get(id).unwrap().position, pos2(100.0, 100.0));
    }

    #[test]
    fn empty_canvas_deselects_and_pans() {
        let (mut store, mut vp, id) = setup();
        store.select(Some(id));
        vp.offset = vec2(5.0, 5.0);
        let mut g = GestureController::default();
        assert!(matches!(g.pointer_down(&mut store, &vp, pos2(10.0, 10.0)), GestureState::PanningViewport { .. }));
        assert_eq!(store.selected(), None);
        g.pointer_move(&mut store, &mut vp, pos2(30.0, 0.0));
        assert_eq!(vp.offset, vec2(25.0, -5.0));
        g.pointer_leave();
        assert!(g.state().is_idle());
    }

    #[test]
    fn topmost_body_wins() {
        let (mut store, vp, _) = setup();
        let mut upper = Layer::text("b", "", pos2(120.0, 100.0), vec2(100.0, 50.0));
        upper.z_index = 5;
        let upper = store.add(upper);
        assert_eq!(hit_test(&store, &vp, pos2(150.0, 120.0), &HandleStyle::default()), HitTarget::Body(upper));
    }

    #[test]
    fn handles_are_checked_before_bodies() {
        let (mut store, vp, id) = setup();
        // A second layer covering the scale handle of the first.
        let mut cover = Layer::text("cover", "", pos2(180.0, 130.0), vec2(50.0, 50.0));
        cover.z_index = 9;
        store.add(cover);
        store.select(Some(id));
        let style = HandleStyle::default();
        assert_eq!(hit_test(&store, &vp, pos2(200.0, 150.0), &style), HitTarget::ScaleHandle(id));
        assert_eq!(hit_test(&store, &vp, pos2(150.0, 70.0), &style), HitTarget::RotateHandle(id));
    }

    #[test]
    fn rotate_handle_follows_rotation() {
        let (mut store, vp, id) = setup();
        store.update(id, &LayerPatch { rotation: Some(90.0), ..Default::default() });
        let layer = store.get(id).unwrap();
        let (rotate, _) = handle_positions(layer, &vp, &HandleStyle::default());
        // Top edge now faces +x: midpoint at center + (25, 0), then 30 further out.
        assert!((rotate.x - 205.0).abs() < 1e-3 && (rotate.y - 125.0).abs() < 1e-3, "{rotate:?}");
    }

    #[test]
    fn rotate_gesture_adds_cursor_angle() {
        let (mut store, mut vp, id) = setup();
        store.select(Some(id));
        let mut g = GestureController::default();
        // Rotate handle sits straight above the center (150, 125).
        assert!(matches!(g.pointer_down(&mut store, &vp, pos2(150.0, 70.0)), GestureState::RotatingLayer { .. }));
        // Quarter turn clockwise: from above the center to its right.
        g.pointer_move(&mut store, &mut vp, pos2(250.0, 125.0));
        assert!((store.get(id).unwrap().rotation - 90.0).abs() < 1e-3);
    }

    #[test]
    fn scale_gesture_is_proportional_and_floored() {
        let (mut store, mut vp, id) = setup();
        store.select(Some(id));
        let mut g = GestureController::default();
        assert!(matches!(g.pointer_down(&mut store, &vp, pos2(200.0, 150.0)), GestureState::ScalingLayer { .. }));
        // Twice as far from the center (150, 125).
        g.pointer_move(&mut store, &mut vp, pos2(250.0, 175.0));
        assert!((store.get(id).unwrap().scale - 2.0).abs() < 1e-4);
        g.pointer_move(&mut store, &mut vp, pos2(150.0, 125.0));
        assert_eq!(store.get(id).unwrap().scale, MIN_LAYER_SCALE);
    }

    #[test]
    fn zero_anchor_distance_never_yields_nan() {
        // On a 4×4 layer the scale handle covers the center itself.
        let mut store = LayerStore::new();
        let id = store.add(Layer::text("dot", "", pos2(0.0, 0.0), vec2(4.0, 4.0)));
        store.select(Some(id));
        let mut vp = Viewport::default();
        let mut g = GestureController::default();

        let state = g.pointer_down(&mut store, &vp, pos2(2.0, 2.0));
        let GestureState::ScalingLayer { start_distance, .. } = state else {
            panic!("expected a scale grab, got {state:?}");
        };
        assert_eq!(start_distance, MIN_ANCHOR_DISTANCE);

        g.pointer_move(&mut store, &mut vp, pos2(2.0, 2.0));
        let scale = store.get(id).unwrap().scale;
        assert!(scale.is_finite());
        assert_eq!(scale, MIN_LAYER_SCALE);
        g.pointer_move(&mut store, &mut vp, pos2(5.0, 6.0));
        assert_eq!(store.get(id).unwrap().scale, 5.0);
    }

    #[test]
    fn moves_on_deleted_or_locked_targets_are_noops() {
        let (mut store, mut vp, id) = setup();
        let mut g = GestureController::default();
        g.pointer_down(&mut store, &vp, pos2(150.0, 120.0));
        store.update(id, &LayerPatch { locked: Some(true), ..Default::default() });
        assert!(!g.pointer_move(&mut store, &mut vp, pos2(0.0, 0.0)));
        store.remove(id);
        assert!(!g.pointer_move(&mut store, &mut vp, pos2(0.0, 0.0)));
    }

    #[test]
    fn wheel_zoom_needs_modifier_and_clamps() {
        let g = GestureController::default();
        let mut vp = Viewport::default();
        assert!(!g.wheel(&mut vp, -500.0, false));
        assert_eq!(vp.scale, 1.0);

        g.wheel(&mut vp, -100.0, true);
        assert!((vp.scale - (0.1f32).exp()).abs() < 1e-5);

        for _ in 0..100 {
            g.wheel(&mut vp, -1000.0, true);
        }
        assert_eq!(vp.scale, MAX_ZOOM);
        for _ in 0..100 {
            g.wheel(&mut vp, 1000.0, true);
        }
        assert_eq!(vp.scale, MIN_ZOOM);
    }
}
