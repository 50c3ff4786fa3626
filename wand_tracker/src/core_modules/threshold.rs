// THEORY:
// The IR marker is by far the brightest thing the camera sees, so the first
// step is a hard binary threshold: everything brighter than the detector's
// current threshold becomes 255, everything else 0.
//
// A single opening pass (erode, then dilate) with the 3x3 elliptical structuring
// element follows. At 3x3 that ellipse is a cross. The opening wipes out isolated
// hot pixels and one-pixel filaments from sensor noise while leaving a marker of
// a few pixels' radius intact.

use image::{GrayImage, Luma};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Offsets of the 3x3 elliptical (cross-shaped) structuring element.
const CROSS: [(i64, i64); 5] = [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)];

/// Thresholds a grayscale frame and cleans it with a morphological opening.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let thresholded = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });
    dilate(&erode(&thresholded))
}

/// A pixel survives erosion if every in-bounds pixel under the cross is set.
pub fn erode(binary: &GrayImage) -> GrayImage {
    apply_cross(binary, |values| values.iter().all(|v| *v == FOREGROUND))
}

/// A pixel is set after dilation if any in-bounds pixel under the cross is set.
pub fn dilate(binary: &GrayImage) -> GrayImage {
    apply_cross(binary, |values| values.iter().any(|v| *v == FOREGROUND))
}

fn apply_cross<F>(binary: &GrayImage, keep: F) -> GrayImage
where
    F: Fn(&[u8]) -> bool,
{
    let (width, height) = (binary.width() as i64, binary.height() as i64);
    let mut neighborhood = Vec::with_capacity(CROSS.len());
    GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
        neighborhood.clear();
        for (dx, dy) in CROSS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            // Out-of-image neighbors are ignored rather than treated as background.
            if nx >= 0 && nx < width && ny >= 0 && ny < height {
                neighborhood.push(binary.get_pixel(nx as u32, ny as u32)[0]);
            }
        }
        if keep(&neighborhood) {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(width: u32, height: u32, cx: i64, cy: i64, radius: i64, value: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let dx = x as i64 - cx;
            let dy = y as i64 - cy;
            if dx * dx + dy * dy <= radius * radius {
                Luma([value])
            } else {
                Luma([10])
            }
        })
    }

    fn count_set(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p[0] == FOREGROUND).count()
    }

    #[test]
    fn threshold_is_strictly_greater() {
        // Three 5x5 squares at intensities 209, 210 and 211, one per column band.
        let gray = GrayImage::from_fn(30, 10, |x, y| {
            let inside = (2..7).contains(&y) && (2..7).contains(&(x % 10));
            match (inside, x / 10) {
                (true, 0) => Luma([209]),
                (true, 1) => Luma([210]),
                (true, _) => Luma([211]),
                (false, _) => Luma([0]),
            }
        });
        let binary = binarize(&gray, 210);
        // Only the 211 square passes; the opening trims its four corners.
        assert_eq!(count_set(&binary), 21);
        assert_eq!(binary.get_pixel(24, 4)[0], FOREGROUND);
        assert_eq!(binary.get_pixel(22, 2)[0], BACKGROUND);
        assert_eq!(binary.get_pixel(14, 4)[0], BACKGROUND);
    }

    #[test]
    fn opening_removes_isolated_pixel() {
        let mut gray = GrayImage::new(20, 20);
        gray.put_pixel(10, 10, Luma([255]));
        assert_eq!(count_set(&binarize(&gray, 200)), 0);
    }

    #[test]
    fn opening_keeps_radius_four_disk() {
        let gray = disk(40, 40, 20, 20, 4, 250);
        let binary = binarize(&gray, 210);
        assert_eq!(count_set(&binary), 49);
        assert_eq!(binary.get_pixel(24, 20)[0], FOREGROUND);
        assert_eq!(binary.get_pixel(20, 16)[0], FOREGROUND);
    }

    #[test]
    fn dim_disk_is_dropped_by_threshold() {
        let gray = disk(40, 40, 20, 20, 4, 150);
        assert_eq!(count_set(&binarize(&gray, 210)), 0);
    }
}
