// THEORY:
// The `TrailBuffer` is the memory of the tracker. Where the detector only knows
// the current frame, the trail remembers where the marker has been, newest first.
//
// Key principles:
// 1.  **Bounded**: it never holds more than `TRAIL_CAPACITY` points. New points go
//     in at the front and the oldest fall off the back.
// 2.  **Loss tolerant**: a single missed frame should not erase the stroke. The
//     session calls `hold_last` on such frames, which repeats the front point as a
//     held-over placeholder.
// 3.  **Recency indexed**: the gesture recognizer reads it by "how many frames
//     ago", so index 0 is always the newest point.

use crate::core_modules::blob::Point;
use std::collections::VecDeque;

/// Maximum number of points kept in the trail.
pub const TRAIL_CAPACITY: usize = 64;

/// Bounded, most-recent-first history of tracked positions.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    points: VecDeque<Point>,
    capacity: usize,
}

impl Default for TrailBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrailBuffer {
    pub fn new() -> Self {
        Self::with_capacity(TRAIL_CAPACITY)
    }

    /// A trail with a custom bound. A capacity of 0 is raised to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepends a point, evicting the oldest one past capacity.
    pub fn push(&mut self, point: Point) {
        self.points.push_front(point);
        if self.points.len() > self.capacity {
            self.points.pop_back();
        }
    }

    /// Repeats the newest point as a held-over placeholder. No-op on an empty trail.
    pub fn hold_last(&mut self) {
        if let Some(front) = self.points.front().copied() {
            self.push(front.held_over());
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// The point `recency` frames ago, or `None` past the end of the trail.
    pub fn at(&self, recency: usize) -> Option<Point> {
        self.points.get(recency).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Point> + '_ {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_never_exceeds_capacity() {
        let mut trail = TrailBuffer::new();
        for i in 0..200 {
            trail.push(Point::new(i, i * 2));
            assert!(trail.len() <= TRAIL_CAPACITY);
            assert_eq!(trail.at(0), Some(Point::new(i, i * 2)));
        }
        assert_eq!(trail.len(), TRAIL_CAPACITY);
        // The oldest surviving point is the 64th most recent push.
        assert_eq!(trail.at(TRAIL_CAPACITY - 1), Some(Point::new(136, 272)));
    }

    #[test]
    fn at_out_of_range_is_none() {
        let mut trail = TrailBuffer::new();
        assert_eq!(trail.at(0), None);
        trail.push(Point::new(1, 1));
        assert_eq!(trail.at(1), None);
    }

    #[test]
    fn hold_last_on_empty_trail_is_noop() {
        let mut trail = TrailBuffer::new();
        trail.hold_last();
        assert!(trail.is_empty());
    }

    #[test]
    fn hold_last_repeats_front_as_held() {
        let mut trail = TrailBuffer::new();
        trail.push(Point::new(5, 6));
        trail.hold_last();
        assert_eq!(trail.len(), 2);
        let front = trail.at(0).unwrap();
        assert!(front.held);
        assert_eq!((front.x, front.y), (5, 6));
        assert!(!trail.at(1).unwrap().held);
    }

    #[test]
    fn clear_twice_leaves_trail_empty() {
        let mut trail = TrailBuffer::new();
        trail.push(Point::new(1, 2));
        trail.clear();
        assert!(trail.is_empty());
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut trail = TrailBuffer::with_capacity(0);
        trail.push(Point::new(1, 1));
        trail.push(Point::new(2, 2));
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.at(0), Some(Point::new(2, 2)));
    }
}
