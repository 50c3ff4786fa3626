// THEORY:
// `Blob` and `Point` are the two "dumb" data containers of the engine.
//
// A `Blob` is a snapshot: one bright, roughly round region found in one binary
// frame, summarized by its center, its size and the shape metrics it was filtered
// on. It has no memory and is discarded once the frame is processed.
//
// A `Point` is what survives of a blob once it is accepted into the trail: an
// integer pixel position. A point may also be a placeholder carried forward on a
// frame where the marker was missed, which is what the `held` flag records.

/// A 2D pixel position in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    /// `true` when this point repeats the previous one because nothing was detected.
    pub held: bool,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y, held: false }
    }

    /// A copy of this position marked as carried forward.
    pub fn held_over(self) -> Self {
        Self { held: true, ..self }
    }

    /// Euclidean distance in pixels. The `held` flag plays no part.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

/// A single candidate marker detected in a binary frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Sub-pixel center of the region (mean of its pixel coordinates).
    pub center: (f64, f64),
    /// Equivalent diameter in pixels: the diameter of a disk with the same area.
    pub size: f64,
    /// Number of pixels in the region.
    pub area: usize,
    /// `4π·area / perimeter²`, clamped to 1.0.
    pub circularity: f64,
    /// Region area over the lattice area of its convex hull, clamped to 1.0.
    pub convexity: f64,
    /// Minor over major axis of the region's second moments. 1.0 is isotropic.
    pub inertia_ratio: f64,
    /// Quality score used to pick the single best blob of a frame.
    pub response: f64,
}

impl Blob {
    /// The trail position of this blob, truncating the sub-pixel center.
    pub fn point(&self) -> Point {
        Point::new(self.center.0 as i32, self.center.1 as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_over_keeps_position() {
        let p = Point::new(12, -3);
        let h = p.held_over();
        assert!(h.held);
        assert_eq!((h.x, h.y), (12, -3));
        assert_eq!(p.distance_to(&h), 0.0);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn blob_point_truncates_center() {
        let blob = Blob {
            center: (10.9, 4.2),
            size: 8.0,
            area: 49,
            circularity: 1.0,
            convexity: 1.0,
            inertia_ratio: 1.0,
            response: 8.0,
        };
        assert_eq!(blob.point(), Point::new(10, 4));
    }
}
