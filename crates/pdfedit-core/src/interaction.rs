//! Pointer gestures for the selection wrapper: move, resize by handle, and
//! rotate. A gesture captures its reference state once at pointer-down and
//! every update is computed fresh from that state plus the current pointer,
//! so intermediate updates never accumulate rounding error.

use crate::annotation::{Annotation, AnnotationId};
use crate::geometry::{
    pointer_angle, resize_from_handle, Handle, Point, WrapperBox, ROTATION_SNAP_DEG,
};

/// Keyboard modifiers sampled on each pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift locks aspect ratio while resizing from a corner and snaps
    /// rotation to 15 degree steps.
    pub shift: bool,
}

/// How a finished gesture is recorded in history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureEnd {
    /// Lightweight snapshot of document bytes plus overlay sidecar. The
    /// default for wrapper gestures.
    #[default]
    Snapshot,
    /// Granular before/after entry. Used for notes, and skipped entirely if
    /// the gesture ended where it began.
    Granular,
    /// Record nothing.
    Discard,
}

/// Translation drag. The grab offset inside the wrapper is fixed at
/// pointer-down so the element never jumps under the cursor.
#[derive(Debug, Clone, Copy)]
pub struct MoveGesture {
    start: WrapperBox,
    grab: Point,
}

impl MoveGesture {
    pub fn begin(start: WrapperBox, pointer: Point) -> Self {
        Self {
            start,
            grab: pointer,
        }
    }

    pub fn update(&self, pointer: Point) -> WrapperBox {
        WrapperBox {
            x: self.start.x + (pointer.x - self.grab.x),
            y: self.start.y + (pointer.y - self.grab.y),
            ..self.start
        }
    }
}

/// Resize drag from one of the eight handles, holding the opposite point
/// fixed in page space even when the wrapper is rotated.
#[derive(Debug, Clone, Copy)]
pub struct ResizeGesture {
    start: WrapperBox,
    handle: Handle,
}

impl ResizeGesture {
    pub fn begin(start: WrapperBox, handle: Handle) -> Self {
        Self { start, handle }
    }

    pub fn update(&self, pointer: Point, modifiers: Modifiers) -> WrapperBox {
        resize_from_handle(&self.start, self.handle, pointer, modifiers.shift)
    }
}

/// Rotation drag around the wrapper center. The pointer's starting bearing
/// is the zero reference, so grabbing the rotate handle never kicks the
/// element to a new angle.
#[derive(Debug, Clone, Copy)]
pub struct RotateGesture {
    start: WrapperBox,
    start_bearing_deg: f64,
}

impl RotateGesture {
    pub fn begin(start: WrapperBox, pointer: Point) -> Self {
        let start_bearing_deg = pointer_angle(start.center(), pointer).to_degrees();
        Self {
            start,
            start_bearing_deg,
        }
    }

    pub fn update(&self, pointer: Point, modifiers: Modifiers) -> WrapperBox {
        let bearing = pointer_angle(self.start.center(), pointer).to_degrees();
        let mut rotation = self.start.rotation + (bearing - self.start_bearing_deg);
        if modifiers.shift {
            rotation = crate::geometry::snap_angle(rotation, ROTATION_SNAP_DEG);
        }
        WrapperBox {
            rotation,
            ..self.start
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ActiveGesture {
    Move(MoveGesture),
    Resize(ResizeGesture),
    Rotate(RotateGesture),
}

impl ActiveGesture {
    pub fn update(&self, pointer: Point, modifiers: Modifiers) -> WrapperBox {
        match self {
            ActiveGesture::Move(gesture) => gesture.update(pointer),
            ActiveGesture::Resize(gesture) => gesture.update(pointer, modifiers),
            ActiveGesture::Rotate(gesture) => gesture.update(pointer, modifiers),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActiveGesture::Move(_) => "move",
            ActiveGesture::Resize(_) => "resize",
            ActiveGesture::Rotate(_) => "rotate",
        }
    }
}

/// A gesture in flight, bound to the annotation it manipulates. At most one
/// exists per session; starting another while one is live is an error.
#[derive(Debug, Clone)]
pub struct GestureState {
    pub id: AnnotationId,
    /// Full record at pointer-down, for change detection and granular undo.
    pub before: Annotation,
    pub gesture: ActiveGesture,
}

impl GestureState {
    pub fn new(before: Annotation, gesture: ActiveGesture) -> Self {
        Self {
            id: before.id,
            before,
            gesture,
        }
    }
}
