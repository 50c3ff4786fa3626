// THEORY:
// The `Detector` is the engine of the spatial layer. It turns a binary frame into
// a short list of `Blob`s that look like the round, bright tip of an IR wand.
//
// Algorithm steps:
// 1.  **Labeling**: the frame is scanned in raster order. Every unvisited pixel
//     of the target brightness seeds a breadth-first region grow over its 8
//     neighbors, producing one connected component per bright region.
// 2.  **Size gate**: the component's equivalent diameter is computed from its
//     pixel count. Anything whose squared size lies outside `[min_area, max_area]`
//     is dropped before the more expensive shape metrics run.
// 3.  **Shape gates**: circularity, convexity and inertia ratio (see
//     `shape_metrics`) must each reach the configured minimum.
// 4.  **Scoring**: the survivors get a response that rewards round, solid and
//     large regions. `select_best` keeps the single highest response.
//
// The detector is also self-tuning. When the session reports a long enough gap
// without any accepted blob, `relax` swaps in `config.relaxed(step)`: a lower
// threshold and a wider area window, clamped so that repeated relaxations
// converge on fixed limits instead of drifting or oscillating.

use crate::core_modules::blob::Blob;
use crate::core_modules::shape_metrics::{self, Pixel};
use crate::core_modules::threshold;
use image::GrayImage;
use std::f64::consts::PI;
use tracing::{debug, info};

/// The tunable acceptance thresholds of the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Grayscale level a pixel must exceed to count as lit.
    pub threshold: u8,
    /// Lower bound on a blob's squared size.
    pub min_area: f64,
    /// Upper bound on a blob's squared size.
    pub max_area: f64,
    pub min_circularity: f64,
    pub min_convexity: f64,
    pub min_inertia_ratio: f64,
    /// Binary intensity of marker pixels. 255 tracks bright-on-dark markers.
    pub blob_color: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 210,
            min_area: 3.0,
            max_area: 100.0,
            min_circularity: 0.85,
            min_convexity: 0.8,
            min_inertia_ratio: 0.6,
            blob_color: threshold::FOREGROUND,
        }
    }
}

/// How far one relaxation moves the thresholds, and where it stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationStep {
    pub threshold_delta: u8,
    pub threshold_floor: u8,
    pub min_area_delta: f64,
    pub min_area_floor: f64,
    pub max_area_delta: f64,
    pub max_area_ceiling: f64,
}

impl Default for RelaxationStep {
    fn default() -> Self {
        Self {
            threshold_delta: 10,
            threshold_floor: 200,
            min_area_delta: 1.0,
            min_area_floor: 1.0,
            max_area_delta: 20.0,
            max_area_ceiling: 120.0,
        }
    }
}

impl DetectorConfig {
    /// The next, more permissive configuration. Values already past a clamp are left alone,
    /// so the result never tightens any bound.
    pub fn relaxed(&self, step: &RelaxationStep) -> Self {
        let threshold = if self.threshold > step.threshold_floor {
            self.threshold
                .saturating_sub(step.threshold_delta)
                .max(step.threshold_floor)
        } else {
            self.threshold
        };
        let min_area = if self.min_area > step.min_area_floor {
            (self.min_area - step.min_area_delta).max(step.min_area_floor)
        } else {
            self.min_area
        };
        let max_area = if self.max_area < step.max_area_ceiling {
            (self.max_area + step.max_area_delta).min(step.max_area_ceiling)
        } else {
            self.max_area
        };
        Self {
            threshold,
            min_area,
            max_area,
            ..*self
        }
    }
}

/// Finds and scores marker candidates in binary frames.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    step: RelaxationStep,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), RelaxationStep::default())
    }
}

impl Detector {
    pub fn new(config: DetectorConfig, step: RelaxationStep) -> Self {
        Self { config, step }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Thresholds and cleans a grayscale frame with the current threshold.
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        threshold::binarize(gray, self.config.threshold)
    }

    /// Applies one relaxation step. Returns `false` once every bound sits at its clamp.
    pub fn relax(&mut self) -> bool {
        let relaxed = self.config.relaxed(&self.step);
        let changed = relaxed != self.config;
        if changed {
            info!(
                threshold = relaxed.threshold,
                min_area = relaxed.min_area,
                max_area = relaxed.max_area,
                "relaxing detector after detection gap"
            );
        }
        self.config = relaxed;
        changed
    }

    /// Returns every blob in the binary frame that passes the size and shape gates.
    pub fn detect(&self, binary: &GrayImage) -> Vec<Blob> {
        let labeling = components::label(binary, self.config.blob_color);
        let candidates = labeling.components.len();

        let blobs: Vec<Blob> = labeling
            .components
            .iter()
            .enumerate()
            .filter_map(|(id, component)| self.measure(&labeling, id, component))
            .collect();

        debug!(candidates, accepted = blobs.len(), "blob detection");
        blobs
    }

    fn measure(&self, labeling: &components::Labeling, id: usize, component: &components::Component) -> Option<Blob> {
        let area = component.pixels.len();
        let size = 2.0 * (area as f64 / PI).sqrt();
        let squared_size = size * size;
        if squared_size < self.config.min_area || squared_size > self.config.max_area {
            return None;
        }

        let perimeter = shape_metrics::boundary_length(component.start, area, |x, y| labeling.contains(id, x, y));
        let circularity = shape_metrics::circularity(area, perimeter);
        if circularity < self.config.min_circularity {
            return None;
        }

        let hull = shape_metrics::convex_hull(&component.row_extremes());
        let convexity = shape_metrics::convexity(area, &hull);
        if convexity < self.config.min_convexity {
            return None;
        }

        let center = component.center();
        let inertia_ratio = shape_metrics::inertia_ratio(&component.pixels, center);
        if inertia_ratio < self.config.min_inertia_ratio {
            return None;
        }

        Some(Blob {
            center,
            size,
            area,
            circularity,
            convexity,
            inertia_ratio,
            response: circularity * convexity * inertia_ratio * size,
        })
    }
}

/// The blob with the highest response, or `None` when there is nothing to choose from.
///
/// Equal responses are not ordered: which of several tied blobs is returned is unspecified.
pub fn select_best(blobs: Vec<Blob>) -> Option<Blob> {
    blobs.into_iter().max_by(|a, b| a.response.total_cmp(&b.response))
}

pub mod components {
    use super::*;

    const UNLABELED: u32 = u32::MAX;

    /// One 8-connected region of target-colored pixels.
    #[derive(Debug, Clone)]
    pub struct Component {
        /// First pixel in raster order: topmost, then leftmost.
        pub start: Pixel,
        pub pixels: Vec<Pixel>,
    }

    impl Component {
        /// Mean pixel position.
        pub fn center(&self) -> (f64, f64) {
            let n = self.pixels.len() as f64;
            let (sx, sy) = self
                .pixels
                .iter()
                .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + *x as f64, sy + *y as f64));
            (sx / n, sy / n)
        }

        /// Leftmost and rightmost pixel of every row. Their convex hull is the hull of the region.
        pub fn row_extremes(&self) -> Vec<Pixel> {
            let mut extremes: std::collections::BTreeMap<i32, (i32, i32)> = std::collections::BTreeMap::new();
            for &(x, y) in &self.pixels {
                extremes
                    .entry(y)
                    .and_modify(|(lo, hi)| {
                        *lo = (*lo).min(x);
                        *hi = (*hi).max(x);
                    })
                    .or_insert((x, x));
            }
            extremes
                .into_iter()
                .flat_map(|(y, (lo, hi))| [(lo, y), (hi, y)])
                .collect()
        }
    }

    /// A label image plus the components it indexes.
    pub struct Labeling {
        width: u32,
        height: u32,
        labels: Vec<u32>,
        pub components: Vec<Component>,
    }

    impl Labeling {
        /// Whether pixel `(x, y)` belongs to component `id`. Out-of-image pixels never do.
        pub fn contains(&self, id: usize, x: i32, y: i32) -> bool {
            if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
                return false;
            }
            self.labels[(y as u32 * self.width + x as u32) as usize] == id as u32
        }
    }

    /// Labels every 8-connected region whose pixels equal `target`.
    pub fn label(binary: &GrayImage, target: u8) -> Labeling {
        let (width, height) = binary.dimensions();
        let mut labels = vec![UNLABELED; (width * height) as usize];
        let mut components = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if labels[index] != UNLABELED || binary.get_pixel(x, y)[0] != target {
                    continue;
                }
                let id = components.len() as u32;
                components.push(grow_region(binary, target, (x, y), id, &mut labels));
            }
        }

        Labeling {
            width,
            height,
            labels,
            components,
        }
    }

    /// Breadth-first region grow from a seed, labeling as it goes.
    fn grow_region(binary: &GrayImage, target: u8, seed: (u32, u32), id: u32, labels: &mut [u32]) -> Component {
        let (width, height) = binary.dimensions();
        let mut pixels = Vec::new();
        let mut queue = std::collections::VecDeque::from([seed]);
        labels[(seed.1 * width + seed.0) as usize] = id;

        while let Some((cx, cy)) = queue.pop_front() {
            pixels.push((cx as i32, cy as i32));

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = cx as i64 + dx;
                    let ny = cy as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let index = (ny * width + nx) as usize;
                    if labels[index] == UNLABELED && binary.get_pixel(nx, ny)[0] == target {
                        labels[index] = id;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }

        Component {
            start: (seed.0 as i32, seed.1 as i32),
            pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::new(width, height)
    }

    fn paint_disk(img: &mut GrayImage, cx: i64, cy: i64, radius: i64) {
        for y in 0..img.height() as i64 {
            for x in 0..img.width() as i64 {
                if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius {
                    img.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
    }

    fn paint_rect(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn detects_round_marker() {
        let mut img = blank(64, 48);
        paint_disk(&mut img, 30, 20, 4);
        let blobs = Detector::default().detect(&img);
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert_eq!(blob.area, 49);
        assert_eq!(blob.point(), crate::core_modules::blob::Point::new(30, 20));
        assert!(blob.size * blob.size > 60.0 && blob.size * blob.size < 65.0);
        assert!(blob.response > 0.0);
    }

    #[test]
    fn rejects_streaks_and_oversized_regions() {
        let mut img = blank(120, 60);
        paint_rect(&mut img, 5, 5, 12, 2); // motion streak
        paint_rect(&mut img, 50, 10, 30, 30); // lamp, far too large
        assert!(Detector::default().detect(&img).is_empty());
    }

    #[test]
    fn rejects_dark_on_bright_regions() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([255]));
        for y in 16..24 {
            for x in 16..24 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        // The only bright component is the frame itself, which is too large.
        assert!(Detector::default().detect(&img).is_empty());
    }

    #[test]
    fn select_best_prefers_larger_round_marker() {
        let mut img = blank(80, 40);
        paint_disk(&mut img, 15, 20, 2);
        paint_disk(&mut img, 55, 20, 4);
        let blobs = Detector::default().detect(&img);
        assert_eq!(blobs.len(), 2);
        let best = select_best(blobs).unwrap();
        assert_eq!(best.area, 49);
    }

    #[test]
    fn select_best_of_nothing_is_none() {
        assert!(select_best(Vec::new()).is_none());
    }

    #[test]
    fn relaxation_is_monotone_and_converges() {
        let step = RelaxationStep::default();
        let first = DetectorConfig::default().relaxed(&step);
        assert_eq!(first.threshold, 200);
        assert_eq!(first.min_area, 2.0);
        assert_eq!(first.max_area, 120.0);

        let second = first.relaxed(&step);
        assert_eq!(second.threshold, 200);
        assert_eq!(second.min_area, 1.0);
        assert_eq!(second.max_area, 120.0);

        let third = second.relaxed(&step);
        assert_eq!(third, second);
        assert_eq!(third.min_circularity, DetectorConfig::default().min_circularity);
    }

    #[test]
    fn relaxation_never_tightens_out_of_range_values() {
        let step = RelaxationStep::default();
        let loose = DetectorConfig {
            threshold: 150,
            min_area: 0.5,
            max_area: 500.0,
            ..DetectorConfig::default()
        };
        assert_eq!(loose.relaxed(&step), loose);
    }

    #[test]
    fn relax_reports_when_clamped() {
        let mut detector = Detector::default();
        assert!(detector.relax());
        assert!(detector.relax());
        assert!(!detector.relax());
        assert_eq!(detector.config().threshold, 200);
    }

    #[test]
    fn labeling_joins_diagonal_neighbors() {
        let mut img = blank(5, 5);
        img.put_pixel(1, 1, Luma([255]));
        img.put_pixel(2, 2, Luma([255]));
        img.put_pixel(4, 0, Luma([255]));
        let labeling = components::label(&img, 255);
        assert_eq!(labeling.components.len(), 2);
        assert_eq!(labeling.components[0].start, (4, 0));
        assert_eq!(labeling.components[1].pixels.len(), 2);
        assert!(labeling.contains(1, 2, 2));
        assert!(!labeling.contains(1, -1, 2));
    }
}
