// THEORY:
// The gesture recognizer looks for a triangle drawn in the air. It does not fit
// a shape to the whole trail. It samples three points at fixed recency indices
// (the oldest of a 30-point window, its midpoint, and the newest) and checks
// whether those three corners make a reasonable, closed triangle.
//
// The check is loose enough for shaky hand-drawn strokes. All of its knobs live
// in `GestureConfig`:
// - `min_side`: every side must be at least this long, in pixels.
// - `min_side_ratio` / `max_side_ratio`: shortest over longest side must lie
//   strictly inside this band.
// - `closure_factor`: the closing side C->A must stay below this multiple of
//   the longest side.

use crate::core_modules::blob::Point;
use crate::core_modules::trail::TrailBuffer;
use tracing::debug;

/// Whether held-over points take part in gesture geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeldPointPolicy {
    /// Held points count like detections (the trail is sampled as-is).
    #[default]
    Include,
    /// Held points are skipped; indices count real detections only.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Points needed before any evaluation happens.
    pub min_points: usize,
    /// Recency index of corner A, the oldest sampled point.
    pub oldest_index: usize,
    /// Recency index of corner B.
    pub midpoint_index: usize,
    /// Recency index of corner C, the newest point.
    pub newest_index: usize,
    pub min_side: f64,
    pub min_side_ratio: f64,
    pub max_side_ratio: f64,
    pub closure_factor: f64,
    pub held_points: HeldPointPolicy,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_points: 30,
            oldest_index: 29,
            midpoint_index: 14,
            newest_index: 0,
            min_side: 10.0,
            min_side_ratio: 0.5,
            max_side_ratio: 1.5,
            closure_factor: 1.5,
            held_points: HeldPointPolicy::Include,
        }
    }
}

/// Why a trail was not recognized as a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooFewPoints,
    /// A side is shorter than `min_side`.
    Degenerate,
    /// Sides too dissimilar to approximate a triangle.
    Dissimilar,
    /// The stroke does not come back toward its start.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureVerdict {
    Recognized,
    NotRecognized(Rejection),
}

impl GestureVerdict {
    pub fn is_recognized(&self) -> bool {
        matches!(self, GestureVerdict::Recognized)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GestureRecognizer {
    config: GestureConfig,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Samples corners A, B and C from the trail and classifies the triangle they form.
    pub fn evaluate(&self, trail: &TrailBuffer) -> GestureVerdict {
        let Some((a, b, c)) = self.corners(trail) else {
            return GestureVerdict::NotRecognized(Rejection::TooFewPoints);
        };
        let verdict = self.classify(a.distance_to(&b), b.distance_to(&c), c.distance_to(&a));
        debug!(?a, ?b, ?c, ?verdict, "gesture evaluation");
        verdict
    }

    fn corners(&self, trail: &TrailBuffer) -> Option<(Point, Point, Point)> {
        let cfg = &self.config;
        match cfg.held_points {
            HeldPointPolicy::Include => {
                if trail.len() < cfg.min_points {
                    return None;
                }
                Some((
                    trail.at(cfg.oldest_index)?,
                    trail.at(cfg.midpoint_index)?,
                    trail.at(cfg.newest_index)?,
                ))
            }
            HeldPointPolicy::Exclude => {
                let detected: Vec<Point> = trail.iter().filter(|p| !p.held).copied().collect();
                if detected.len() < cfg.min_points {
                    return None;
                }
                Some((
                    *detected.get(cfg.oldest_index)?,
                    *detected.get(cfg.midpoint_index)?,
                    *detected.get(cfg.newest_index)?,
                ))
            }
        }
    }

    /// Applies the rejection rules, in order, to the side lengths AB, BC and CA.
    pub fn classify(&self, ab: f64, bc: f64, ca: f64) -> GestureVerdict {
        let cfg = &self.config;
        let sides = [ab, bc, ca];
        if sides.iter().any(|d| *d < cfg.min_side) {
            return GestureVerdict::NotRecognized(Rejection::Degenerate);
        }

        let shortest = sides.iter().copied().fold(f64::INFINITY, f64::min);
        let longest = sides.iter().copied().fold(0.0, f64::max);
        let ratio = shortest / longest;
        if ratio <= cfg.min_side_ratio || ratio >= cfg.max_side_ratio {
            return GestureVerdict::NotRecognized(Rejection::Dissimilar);
        }

        if ca >= cfg.closure_factor * longest {
            return GestureVerdict::NotRecognized(Rejection::Open);
        }
        GestureVerdict::Recognized
    }
}
