// ============================================================================
// GEOMETRY KERNEL — rotated/scaled rectangles, bounding boxes, hit tests
// ============================================================================
//
// Rotation is in degrees, positive = clockwise in the Y-down world. Trig is
// evaluated in f64 so angles far outside [0, 360) need no normalization.

use egui::{Pos2, pos2};

use crate::canvas::Layer;

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn from_points(points: &[Pos2]) -> Aabb {
        let mut bb = Aabb {
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        };
        for p in points {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        bb
    }
}

/// Corners (TL, TR, BR, BL) of a rectangle after scaling then rotating about
/// its own center.
pub fn rect_corners(x: f32, y: f32, width: f32, height: f32, rotation_deg: f32, scale: f32) -> [Pos2; 4] {
    let cx = x as f64 + width as f64 * 0.5;
    let cy = y as f64 + height as f64 * 0.5;
    let hw = width as f64 * 0.5 * scale as f64;
    let hh = height as f64 * 0.5 * scale as f64;
    let (sin, cos) = (rotation_deg as f64).to_radians().sin_cos();

    let place = |lx: f64, ly: f64| -> Pos2 {
        pos2(
            (cx + lx * cos - ly * sin) as f32,
            (cy + lx * sin + ly * cos) as f32,
        )
    };
    [place(-hw, -hh), place(hw, -hh), place(hw, hh), place(-hw, hh)]
}

/// World-space AABB of a rectangle at `(x, y)` sized `width × height`,
/// scaled and rotated about its center.
pub fn transformed_bounds(x: f32, y: f32, width: f32, height: f32, rotation_deg: f32, scale: f32) -> Aabb {
    Aabb::from_points(&rect_corners(x, y, width, height, rotation_deg, scale))
}

pub fn layer_corners(layer: &Layer) -> [Pos2; 4] {
    rect_corners(
        layer.position.x,
        layer.position.y,
        layer.size.x,
        layer.size.y,
        layer.rotation,
        layer.scale,
    )
}

/// Union of all boxes, or `None` for an empty iterator.
pub fn union_bounds<I>(boxes: I) -> Option<Aabb>
where
    I: IntoIterator<Item = Aabb>,
{
    boxes.into_iter().reduce(|acc, b| acc.union(&b))
}

/// Map a world point into the layer's local frame: origin at the layer
/// center, unrotated and unscaled, so the body spans `±size / 2`.
pub fn world_to_local(layer: &Layer, world: Pos2) -> Pos2 {
    let c = layer.center();
    let dx = (world.x - c.x) as f64;
    let dy = (world.y - c.y) as f64;
    let (sin, cos) = (layer.rotation as f64).to_radians().sin_cos();
    let inv_scale = if layer.scale.abs() > 1e-6 { 1.0 / layer.scale as f64 } else { 0.0 };
    pos2(
        ((dx * cos + dy * sin) * inv_scale) as f32,
        ((-dx * sin + dy * cos) * inv_scale) as f32,
    )
}

/// True when the world point lies on the layer body.
pub fn contains_point(layer: &Layer, world: Pos2) -> bool {
    let local = world_to_local(layer, world);
    let hw = layer.size.x * 0.5;
    let hh = layer.size.y * 0.5;
    local.x >= -hw && local.x <= hw && local.y >= -hh && local.y <= hh
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::vec2;

    fn assert_close(a: Aabb, b: Aabb, tol: f32) {
        assert!((a.min_x - b.min_x).abs() <= tol, "{a:?} vs {b:?}");
        assert!((a.min_y - b.min_y).abs() <= tol, "{a:?} vs {b:?}");
        assert!((a.max_x - b.max_x).abs() <= tol, "{a:?} vs {b:?}");
        assert!((a.max_y - b.max_y).abs() <= tol, "{a:?} vs {b:?}");
    }

    #[test]
    fn identity_bounds_match_rect() {
        let bb = transformed_bounds(10.0, 20.0, 100.0, 50.0, 0.0, 1.0);
        assert_eq!(bb, Aabb { min_x: 10.0, min_y: 20.0, max_x: 110.0, max_y: 70.0 });
    }

    #[test]
    fn scale_grows_about_center() {
        let bb = transformed_bounds(0.0, 0.0, 100.0, 50.0, 0.0, 2.0);
        assert_eq!(bb, Aabb { min_x: -50.0, min_y: -25.0, max_x: 150.0, max_y: 75.0 });
    }

    #[test]
    fn quarter_turn_swaps_extents() {
        let bb = transformed_bounds(0.0, 0.0, 100.0, 50.0, 90.0, 1.0);
        assert_close(bb, Aabb { min_x: 25.0, min_y: -25.0, max_x: 75.0, max_y: 75.0 }, 1e-3);
    }

    #[test]
    fn bounds_are_periodic_in_full_turns() {
        for &theta in &[0.0f32, 17.5, 45.0, 90.0, 133.0, -60.0] {
            let base = transformed_bounds(3.0, -7.0, 120.0, 80.0, theta, 1.3);
            for k in [-3i32, -1, 1, 2, 10] {
                let turned = transformed_bounds(3.0, -7.0, 120.0, 80.0, theta + 360.0 * k as f32, 1.3);
                assert_close(base, turned, 1e-2);
            }
        }
    }

    #[test]
    fn rotation_450_matches_90() {
        let a = transformed_bounds(0.0, 0.0, 200.0, 100.0, 450.0, 1.0);
        let b = transformed_bounds(0.0, 0.0, 200.0, 100.0, 90.0, 1.0);
        assert_close(a, b, 1e-3);
    }

    #[test]
    fn forty_five_degrees_expands_square() {
        let bb = transformed_bounds(0.0, 0.0, 100.0, 100.0, 45.0, 1.0);
        let half_diag = 50.0 * std::f32::consts::SQRT_2;
        assert_close(
            bb,
            Aabb { min_x: 50.0 - half_diag, min_y: 50.0 - half_diag, max_x: 50.0 + half_diag, max_y: 50.0 + half_diag },
            1e-3,
        );
    }

    #[test]
    fn positive_rotation_is_clockwise() {
        // Top-right corner of a centered square swings down to the right.
        let corners = rect_corners(-50.0, -50.0, 100.0, 100.0, 45.0, 1.0);
        let tr = corners[1];
        assert!(tr.x > 70.0 && tr.y.abs() < 1e-3, "{tr:?}");
    }

    #[test]
    fn union_covers_all_boxes() {
        let a = transformed_bounds(0.0, 0.0, 10.0, 10.0, 0.0, 1.0);
        let b = transformed_bounds(-5.0, 20.0, 10.0, 10.0, 0.0, 1.0);
        let u = union_bounds([a, b]).unwrap();
        assert_eq!(u, Aabb { min_x: -5.0, min_y: 0.0, max_x: 10.0, max_y: 30.0 });
        assert!(union_bounds(std::iter::empty()).is_none());
    }

    #[test]
    fn hit_test_respects_rotation_and_scale() {
        let mut layer = Layer::text("t", "", pos2(0.0, 0.0), vec2(100.0, 20.0));
        assert!(contains_point(&layer, pos2(90.0, 10.0)));
        layer.rotation = 90.0;
        assert!(!contains_point(&layer, pos2(90.0, 10.0)));
        assert!(contains_point(&layer, pos2(50.0, 55.0)));
        layer.scale = 0.5;
        assert!(!contains_point(&layer, pos2(50.0, 55.0)));
        assert!(contains_point(&layer, pos2(50.0, 30.0)));
    }
}
