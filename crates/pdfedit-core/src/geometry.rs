//! Geometry helpers shared by every draggable overlay kind.
//!
//! All coordinates are unscaled page pixels with a top-left origin (y grows
//! downward). Rotation is stored in degrees about the box center and is not
//! normalized into [0, 360); callers normalize for display only.

use serde::{Deserialize, Serialize};

/// Smallest width/height a wrapper may be resized to.
pub const MIN_WRAPPER_SIZE: f64 = 20.0;

/// Rotation snap increment applied while the modifier key is held.
pub const ROTATION_SNAP_DEG: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Rotate `p` around `center` by `angle_rad` (positive = clockwise in
/// screen coordinates, since y grows downward).
pub fn rotate_point(p: Point, center: Point, angle_rad: f64) -> Point {
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    Point {
        x: center.x + dx * angle_rad.cos() - dy * angle_rad.sin(),
        y: center.y + dx * angle_rad.sin() + dy * angle_rad.cos(),
    }
}

/// Arrowhead length for live overlay drawing, growing with the stroke so
/// heavy arrows keep a proportionate head. Committed output uses a fixed
/// length instead.
pub fn overlay_arrow_head_len(stroke_width: f64) -> f64 {
    10.0 + 3.0 * stroke_width
}

/// The two wing points of an arrowhead for a shaft from `start` to `end`,
/// with a 30 degree half-angle. `head_len` differs between live overlay
/// geometry and commit-time drawing, so the caller supplies it.
pub fn arrow_head(start: Point, end: Point, head_len: f64) -> (Point, Point) {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let half = std::f64::consts::PI / 6.0;
    (
        Point {
            x: end.x - head_len * (angle - half).cos(),
            y: end.y - head_len * (angle - half).sin(),
        },
        Point {
            x: end.x - head_len * (angle + half).cos(),
            y: end.y - head_len * (angle + half).sin(),
        },
    )
}

/// One of the eight compass resize handles around a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl Handle {
    /// Handle position as fractions of the box, top-left = (0, 0).
    pub fn coords(self) -> (f64, f64) {
        match self {
            Handle::Nw => (0.0, 0.0),
            Handle::N => (0.5, 0.0),
            Handle::Ne => (1.0, 0.0),
            Handle::W => (0.0, 0.5),
            Handle::E => (1.0, 0.5),
            Handle::Sw => (0.0, 1.0),
            Handle::S => (0.5, 1.0),
            Handle::Se => (1.0, 1.0),
        }
    }

    /// Fractional position of the anchor, the point held fixed during a
    /// resize: always the opposite side/corner.
    pub fn anchor(self) -> (f64, f64) {
        let (hx, hy) = self.coords();
        (1.0 - hx, 1.0 - hy)
    }

    pub fn affects_width(self) -> bool {
        !matches!(self, Handle::N | Handle::S)
    }

    pub fn affects_height(self) -> bool {
        !matches!(self, Handle::E | Handle::W)
    }

    /// Corner handles are the only ones that aspect-lock with the modifier.
    pub fn is_corner(self) -> bool {
        matches!(self, Handle::Nw | Handle::Ne | Handle::Sw | Handle::Se)
    }
}

/// Geometry of one wrapper: top-left position, size, and rotation in
/// degrees about the center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapperBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
}

impl WrapperBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        WrapperBox {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn rotation_rad(&self) -> f64 {
        self.rotation.to_radians()
    }

    /// Rotation-aware hit test: maps the point into the unrotated frame
    /// and checks the axis-aligned bounds.
    pub fn contains(&self, p: Point) -> bool {
        let local = rotate_point(p, self.center(), -self.rotation_rad());
        local.x >= self.x
            && local.x <= self.x + self.width
            && local.y >= self.y
            && local.y <= self.y + self.height
    }

    /// Position of a handle in page coordinates, rotation applied.
    pub fn handle_position(&self, handle: Handle) -> Point {
        let (hx, hy) = handle.coords();
        let p = Point {
            x: self.x + self.width * hx,
            y: self.y + self.height * hy,
        };
        rotate_point(p, self.center(), self.rotation_rad())
    }
}

/// Compute the resized box for a drag of `handle` to `pointer`, holding the
/// opposite point fixed. Works for rotated boxes by transforming the
/// anchor-to-pointer vector into the local (unrotated) frame, sizing there,
/// and mapping the new center back out. `keep_aspect` (the shift key)
/// preserves the starting aspect ratio on corner handles.
pub fn resize_from_handle(
    start: &WrapperBox,
    handle: Handle,
    pointer: Point,
    keep_aspect: bool,
) -> WrapperBox {
    let angle = start.rotation_rad();
    let (hx, hy) = handle.coords();
    let (ax, ay) = handle.anchor();

    let anchor_local = Point {
        x: start.x + start.width * ax,
        y: start.y + start.height * ay,
    };
    let anchor_global = rotate_point(anchor_local, start.center(), angle);

    // Anchor-to-pointer vector, expressed in the element's own axes.
    let dx = pointer.x - anchor_global.x;
    let dy = pointer.y - anchor_global.y;
    let local_dx = dx * (-angle).cos() - dy * (-angle).sin();
    let local_dy = dx * (-angle).sin() + dy * (-angle).cos();

    let mut new_w = start.width;
    let mut new_h = start.height;
    if handle.affects_width() {
        new_w = local_dx * if hx == 0.0 { -1.0 } else { 1.0 };
    }
    if handle.affects_height() {
        new_h = local_dy * if hy == 0.0 { -1.0 } else { 1.0 };
    }

    new_w = new_w.max(MIN_WRAPPER_SIZE);
    new_h = new_h.max(MIN_WRAPPER_SIZE);

    if keep_aspect && handle.is_corner() && start.height > 0.0 {
        let ratio = start.width / start.height;
        if new_w / new_h > ratio {
            new_h = new_w / ratio;
        } else {
            new_w = new_h * ratio;
        }
    }

    // The anchor stays put; the center sits at (0.5, 0.5) of the new box.
    let vec_cx = (0.5 - ax) * new_w;
    let vec_cy = (0.5 - ay) * new_h;
    let rot_cx = vec_cx * angle.cos() - vec_cy * angle.sin();
    let rot_cy = vec_cx * angle.sin() + vec_cy * angle.cos();

    let new_center = Point {
        x: anchor_global.x + rot_cx,
        y: anchor_global.y + rot_cy,
    };

    WrapperBox {
        x: new_center.x - new_w / 2.0,
        y: new_center.y - new_h / 2.0,
        width: new_w,
        height: new_h,
        rotation: start.rotation,
    }
}

/// Angle of `pointer` as seen from `center`, in radians.
pub fn pointer_angle(center: Point, pointer: Point) -> f64 {
    (pointer.y - center.y).atan2(pointer.x - center.x)
}

/// Snap an angle in degrees to the nearest increment.
pub fn snap_angle(deg: f64, increment: f64) -> f64 {
    (deg / increment).round() * increment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rotate_point_quarter_turn() {
        let p = rotate_point(
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
            std::f64::consts::FRAC_PI_2,
        );
        assert!(approx(p.x, 0.0), "x was {}", p.x);
        assert!(approx(p.y, 10.0), "y was {}", p.y);
    }

    #[test]
    fn handle_anchor_is_opposite() {
        assert_eq!(Handle::Se.anchor(), (0.0, 0.0));
        assert_eq!(Handle::Nw.anchor(), (1.0, 1.0));
        assert_eq!(Handle::N.anchor(), (0.5, 1.0));
        assert_eq!(Handle::E.anchor(), (0.0, 0.5));
    }

    #[test]
    fn resize_se_keeps_top_left() {
        let start = WrapperBox::new(40.0, 30.0, 100.0, 60.0);
        let out = resize_from_handle(&start, Handle::Se, Point::new(200.0, 150.0), false);
        assert!(approx(out.x, 40.0));
        assert!(approx(out.y, 30.0));
        assert!(approx(out.width, 160.0));
        assert!(approx(out.height, 120.0));
    }

    #[test]
    fn resize_nw_keeps_bottom_right() {
        let start = WrapperBox::new(40.0, 30.0, 100.0, 60.0);
        let out = resize_from_handle(&start, Handle::Nw, Point::new(20.0, 10.0), false);
        assert!(approx(out.x + out.width, 140.0));
        assert!(approx(out.y + out.height, 90.0));
        assert!(approx(out.width, 120.0));
        assert!(approx(out.height, 80.0));
    }

    #[test]
    fn resize_east_only_changes_width() {
        let start = WrapperBox::new(0.0, 0.0, 80.0, 50.0);
        let out = resize_from_handle(&start, Handle::E, Point::new(120.0, 25.0), false);
        assert!(approx(out.width, 120.0));
        assert!(approx(out.height, 50.0));
        assert!(approx(out.y, 0.0));
    }

    #[test]
    fn resize_clamps_to_minimum() {
        let start = WrapperBox::new(0.0, 0.0, 100.0, 100.0);
        // Dragging the se handle past the nw anchor collapses the box.
        let out = resize_from_handle(&start, Handle::Se, Point::new(2.0, 2.0), false);
        assert!(approx(out.width, MIN_WRAPPER_SIZE));
        assert!(approx(out.height, MIN_WRAPPER_SIZE));
    }

    #[test]
    fn resize_aspect_lock_preserves_ratio() {
        let start = WrapperBox::new(0.0, 0.0, 200.0, 100.0);
        let out = resize_from_handle(&start, Handle::Se, Point::new(300.0, 60.0), true);
        assert!(approx(out.width / out.height, 2.0));
        // Width won the comparison, height followed.
        assert!(approx(out.width, 300.0));
    }

    #[test]
    fn resize_rotated_keeps_global_anchor() {
        let mut start = WrapperBox::new(100.0, 100.0, 80.0, 40.0);
        start.rotation = 30.0;
        let before = start.handle_position(Handle::Nw);
        let out = resize_from_handle(&start, Handle::Se, Point::new(260.0, 210.0), false);
        let after = out.handle_position(Handle::Nw);
        assert!((before.x - after.x).abs() < 1e-6);
        assert!((before.y - after.y).abs() < 1e-6);
    }

    #[test]
    fn contains_respects_rotation() {
        let mut b = WrapperBox::new(0.0, 0.0, 100.0, 20.0);
        b.rotation = 90.0;
        // After rotating about (50, 10), the box spans roughly x in [40, 60],
        // y in [-40, 60].
        assert!(b.contains(Point::new(50.0, -30.0)));
        assert!(!b.contains(Point::new(95.0, 10.0)));
    }

    #[test]
    fn snap_rounds_to_nearest() {
        assert_eq!(snap_angle(22.0, 15.0), 15.0);
        assert_eq!(snap_angle(23.0, 15.0), 30.0);
        assert_eq!(snap_angle(-8.0, 15.0), -15.0);
    }

    #[test]
    fn arrow_head_wings_are_symmetric() {
        let (p1, p2) = arrow_head(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 15.0);
        assert!(approx(p1.x, p2.x));
        assert!(approx(p1.y, -p2.y));
        assert!(p1.x < 100.0);
    }

    #[test]
    fn overlay_head_scales_with_stroke() {
        assert_eq!(overlay_arrow_head_len(2.0), 16.0);
        assert_eq!(overlay_arrow_head_len(5.0), 25.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: rotating a point by an angle and back is the identity.
        #[test]
        fn rotate_round_trip(
            px in -500.0f64..500.0, py in -500.0f64..500.0,
            cx in -500.0f64..500.0, cy in -500.0f64..500.0,
            deg in -720.0f64..720.0,
        ) {
            let rad = deg.to_radians();
            let p = Point::new(px, py);
            let c = Point::new(cx, cy);
            let back = rotate_point(rotate_point(p, c, rad), c, -rad);
            prop_assert!((back.x - p.x).abs() < 1e-6);
            prop_assert!((back.y - p.y).abs() < 1e-6);
        }

        /// Property: for any handle and rotation, the opposite point of the
        /// box does not move during a resize.
        #[test]
        fn resize_anchor_invariant(
            x in 0.0f64..400.0, y in 0.0f64..400.0,
            w in 30.0f64..300.0, h in 30.0f64..300.0,
            deg in -180.0f64..180.0,
            px in -200.0f64..800.0, py in -200.0f64..800.0,
            handle_idx in 0usize..8,
        ) {
            let handles = [
                Handle::Nw, Handle::N, Handle::Ne, Handle::E,
                Handle::Se, Handle::S, Handle::Sw, Handle::W,
            ];
            let handle = handles[handle_idx];
            let anchor_handle = handles[(handle_idx + 4) % 8];

            let start = WrapperBox { x, y, width: w, height: h, rotation: deg };
            let out = resize_from_handle(&start, handle, Point::new(px, py), false);

            let before = start.handle_position(anchor_handle);
            let after = out.handle_position(anchor_handle);
            prop_assert!((before.x - after.x).abs() < 1e-6);
            prop_assert!((before.y - after.y).abs() < 1e-6);
        }

        /// Property: resize never produces a degenerate box.
        #[test]
        fn resize_respects_minimum(
            w in 30.0f64..300.0, h in 30.0f64..300.0,
            px in -500.0f64..500.0, py in -500.0f64..500.0,
        ) {
            let start = WrapperBox::new(0.0, 0.0, w, h);
            let out = resize_from_handle(&start, Handle::Se, Point::new(px, py), false);
            prop_assert!(out.width >= MIN_WRAPPER_SIZE);
            prop_assert!(out.height >= MIN_WRAPPER_SIZE);
        }

        /// Property: rotating a box by a full turn leaves every handle where
        /// it was.
        #[test]
        fn full_turn_is_identity(
            x in 0.0f64..400.0, y in 0.0f64..400.0,
            w in 20.0f64..300.0, h in 20.0f64..300.0,
            deg in -180.0f64..180.0,
        ) {
            let a = WrapperBox { x, y, width: w, height: h, rotation: deg };
            let b = WrapperBox { rotation: deg + 360.0, ..a };
            for handle in [Handle::Nw, Handle::Ne, Handle::Sw, Handle::Se] {
                let pa = a.handle_position(handle);
                let pb = b.handle_position(handle);
                prop_assert!((pa.x - pb.x).abs() < 1e-6);
                prop_assert!((pa.y - pb.y).abs() < 1e-6);
            }
        }
    }
}
