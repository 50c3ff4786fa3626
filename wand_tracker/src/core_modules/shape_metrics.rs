// THEORY:
// Shape metrics for a single connected region of pixels. Each one answers a
// different question about "does this look like the round tip of a wand?":
//
// - circularity: how close the outline is to a circle, from area and perimeter.
//   The perimeter is the outer boundary traced through pixel centers, so a
//   digital disk scores close to 1.0 and a thin streak scores close to 0.
// - convexity: how much of its own convex hull the region fills. Hull area is
//   counted in lattice points (Pick's theorem) so it is directly comparable with
//   a pixel count.
// - inertia ratio: minor over major eigenvalue of the second central moments.
//   Motion-blurred streaks are elongated and score low.
//
// All functions are pure and work on integer pixel coordinates.

use std::f64::consts::PI;

pub type Pixel = (i32, i32);

/// The 8 neighbor offsets, counterclockwise on screen starting East (y grows down).
const DIRECTIONS: [Pixel; 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Traces the outer boundary of a region with Moore-neighbor tracing and
/// returns its length through pixel centers.
///
/// `start` must be the first pixel of the region in raster order (topmost, then
/// leftmost). Stops when the trace re-enters its second pixel from the first one.
pub fn boundary_length<F>(start: Pixel, area: usize, is_member: F) -> f64
where
    F: Fn(i32, i32) -> bool,
{
    let mut boundary = vec![start];
    let mut current = start;
    let mut dir = 7usize;
    let max_steps = 4 * area + 8;

    for _ in 0..max_steps {
        let begin = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
        let next = (0..8).map(|k| (begin + k) % 8).find_map(|d| {
            let (dx, dy) = DIRECTIONS[d];
            let candidate = (current.0 + dx, current.1 + dy);
            is_member(candidate.0, candidate.1).then_some((candidate, d))
        });
        // An isolated pixel has no neighbors to walk to.
        let Some((next_pixel, next_dir)) = next else {
            break;
        };
        dir = next_dir;
        current = next_pixel;

        let last = boundary[boundary.len() - 1];
        if boundary.len() >= 2 && current == boundary[1] && last == start {
            boundary.pop();
            break;
        }
        boundary.push(current);
    }

    closed_polyline_length(&boundary)
}

fn closed_polyline_length(vertices: &[Pixel]) -> f64 {
    if vertices.len() < 2 {
        return 0.0;
    }
    vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| {
            let dx = (b.0 - a.0) as f64;
            let dy = (b.1 - a.1) as f64;
            dx.hypot(dy)
        })
        .sum()
}

/// `4π·area / perimeter²`, clamped to 1.0. A zero perimeter (single pixel) is a perfect circle.
pub fn circularity(area: usize, perimeter: f64) -> f64 {
    if perimeter <= f64::EPSILON {
        return 1.0;
    }
    (4.0 * PI * area as f64 / (perimeter * perimeter)).min(1.0)
}

/// Convex hull of a point set (Andrew's monotone chain), counterclockwise in
/// math orientation, without collinear points.
pub fn convex_hull(points: &[Pixel]) -> Vec<Pixel> {
    let mut sorted: Vec<Pixel> = points.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: Pixel, a: Pixel, b: Pixel| -> i64 {
        (a.0 - o.0) as i64 * (b.1 - o.1) as i64 - (a.1 - o.1) as i64 * (b.0 - o.0) as i64
    };

    let half_hull = |points: &mut dyn Iterator<Item = Pixel>| -> Vec<Pixel> {
        let mut chain: Vec<Pixel> = Vec::new();
        for p in points {
            while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0 {
                chain.pop();
            }
            chain.push(p);
        }
        // The last point of each chain is the first point of the other.
        chain.pop();
        chain
    };

    let mut hull = half_hull(&mut sorted.iter().copied());
    hull.extend(half_hull(&mut sorted.iter().rev().copied()));
    hull
}

/// Number of lattice points inside or on a convex lattice polygon (Pick's theorem).
pub fn lattice_points_in(hull: &[Pixel]) -> usize {
    match hull.len() {
        0 => 0,
        1 => 1,
        _ => {
            let mut twice_area: i64 = 0;
            let mut on_boundary: i64 = 0;
            for (a, b) in hull.iter().zip(hull.iter().cycle().skip(1)) {
                twice_area += a.0 as i64 * b.1 as i64 - b.0 as i64 * a.1 as i64;
                on_boundary += gcd((b.0 - a.0).unsigned_abs() as i64, (b.1 - a.1).unsigned_abs() as i64);
            }
            ((twice_area.abs() + on_boundary) / 2 + 1) as usize
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Region pixel count over the lattice points of its convex hull, clamped to 1.0.
pub fn convexity(area: usize, hull: &[Pixel]) -> f64 {
    let hull_points = lattice_points_in(hull);
    if hull_points == 0 {
        return 0.0;
    }
    (area as f64 / hull_points as f64).min(1.0)
}

/// Minor over major eigenvalue of the region's second central moments.
pub fn inertia_ratio(pixels: &[Pixel], center: (f64, f64)) -> f64 {
    let (mut mu20, mut mu02, mut mu11) = (0.0, 0.0, 0.0);
    for &(x, y) in pixels {
        let dx = x as f64 - center.0;
        let dy = y as f64 - center.1;
        mu20 += dx * dx;
        mu02 += dy * dy;
        mu11 += dx * dy;
    }
    let trace = mu20 + mu02;
    if trace <= f64::EPSILON {
        return 1.0;
    }
    let spread = ((mu20 - mu02).powi(2) + 4.0 * mu11 * mu11).sqrt();
    ((trace - spread) / (trace + spread)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn disk(radius: i32) -> Vec<Pixel> {
        let mut pixels = Vec::new();
        for y in -radius..=radius {
            for x in -radius..=radius {
                if x * x + y * y <= radius * radius {
                    pixels.push((x, y));
                }
            }
        }
        pixels
    }

    fn perimeter_of(pixels: &[Pixel]) -> f64 {
        let set: HashSet<Pixel> = pixels.iter().copied().collect();
        let start = *pixels.iter().min_by_key(|(x, y)| (*y, *x)).unwrap();
        boundary_length(start, pixels.len(), |x, y| set.contains(&(x, y)))
    }

    #[test]
    fn single_pixel_has_zero_perimeter() {
        assert_eq!(perimeter_of(&[(3, 3)]), 0.0);
        assert_eq!(circularity(1, 0.0), 1.0);
    }

    #[test]
    fn square_perimeter_runs_through_pixel_centers() {
        let square: Vec<Pixel> = (0..3).flat_map(|y| (0..3).map(move |x| (x, y))).collect();
        assert!((perimeter_of(&square) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn disk_is_nearly_circular() {
        let pixels = disk(4);
        assert_eq!(pixels.len(), 49);
        let perimeter = perimeter_of(&pixels);
        let expected = 4.0 * (3.0 * 2f64.sqrt() + 2.0);
        assert!((perimeter - expected).abs() < 1e-9, "perimeter {perimeter}");
        assert!(circularity(pixels.len(), perimeter) > 0.95);
    }

    #[test]
    fn streak_is_not_circular() {
        let line: Vec<Pixel> = (0..20).map(|x| (x, 0)).collect();
        let perimeter = perimeter_of(&line);
        assert!((perimeter - 38.0).abs() < 1e-9);
        assert!(circularity(line.len(), perimeter) < 0.2);
    }

    #[test]
    fn hull_lattice_count_matches_convex_shapes() {
        let square: Vec<Pixel> = (0..4).flat_map(|y| (0..4).map(move |x| (x, y))).collect();
        let hull = convex_hull(&square);
        assert_eq!(hull.len(), 4);
        assert_eq!(lattice_points_in(&hull), 16);

        let line: Vec<Pixel> = (0..7).map(|x| (x, 2)).collect();
        assert_eq!(lattice_points_in(&convex_hull(&line)), 7);
        assert_eq!(lattice_points_in(&convex_hull(&[(5, 5)])), 1);
    }

    #[test]
    fn disk_is_convex_and_l_shape_is_not() {
        let pixels = disk(4);
        assert!((convexity(pixels.len(), &convex_hull(&pixels)) - 1.0).abs() < 1e-9);

        // A 5x5 L: bottom row plus left column, 9 pixels in a hull of 15 lattice points.
        let mut l_shape: Vec<Pixel> = (0..5).map(|x| (x, 4)).collect();
        l_shape.extend((0..4).map(|y| (0, y)));
        let c = convexity(l_shape.len(), &convex_hull(&l_shape));
        assert!((c - 9.0 / 15.0).abs() < 1e-9, "convexity {c}");
    }

    #[test]
    fn inertia_separates_disks_from_streaks() {
        let pixels = disk(3);
        assert!((inertia_ratio(&pixels, (0.0, 0.0)) - 1.0).abs() < 1e-9);

        let line: Vec<Pixel> = (0..10).map(|x| (x, 0)).collect();
        assert_eq!(inertia_ratio(&line, (4.5, 0.0)), 0.0);
        assert_eq!(inertia_ratio(&[(1, 1)], (1.0, 1.0)), 1.0);
    }
}
