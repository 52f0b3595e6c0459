//! Geometry value objects shared by every pipeline stage.
//!
//! All coordinates use a **top-left origin**: x grows to the right and y grows
//! downward, matching the extractor that produces the fragments. Nothing in
//! this crate converts to the bottom-left PDF user space; that is the
//! compositor's job when it draws a [`crate::output::RenderPlan`].

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box `(x0, y0, x1, y1)`.
///
/// Serialised as a four-element array, the shape extractors emit.
/// A well-formed box has `x1 >= x0` and `y1 >= y0`; malformed boxes are
/// tolerated (see [`BoundingBox::is_malformed`]) and their derived extents are
/// clamped to zero by [`BoundingBox::width`] and [`BoundingBox::height`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width, clamped to zero for inverted boxes.
    pub fn width(&self) -> f32 {
        self.raw_width().max(0.0)
    }

    /// Height, clamped to zero for inverted boxes.
    pub fn height(&self) -> f32 {
        self.raw_height().max(0.0)
    }

    /// `x1 - x0` without clamping. Negative for inverted boxes.
    pub fn raw_width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// `y1 - y0` without clamping.
    pub fn raw_height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// True when either extent is negative or any coordinate is not finite.
    pub fn is_malformed(&self) -> bool {
        let finite = [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.x1 < self.x0 || self.y1 < self.y0
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_extents() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 32.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 12.0);
        assert!(!b.is_malformed());
    }

    #[test]
    fn inverted_box_clamps_to_zero() {
        let b = BoundingBox::new(50.0, 10.0, 40.0, 5.0);
        assert!(b.is_malformed());
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
        assert_eq!(b.raw_width(), -10.0);
    }

    #[test]
    fn nan_coordinates_are_malformed() {
        let b = BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0);
        assert!(b.is_malformed());
    }

    #[test]
    fn serialises_as_array() {
        let b = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn union_covers_both() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 20.0, 15.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, 0.0, 20.0, 15.0));
        assert_eq!(b.union(&a), a.union(&b));
    }
}
