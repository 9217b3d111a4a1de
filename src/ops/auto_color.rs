// ============================================================================
// AUTO-COLOR — region detection over line art, palette fill, smoothing
// ============================================================================

use image::{Rgba, RgbaImage};
use rand::Rng;
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::canvas::RasterSurface;
use crate::ops::color::{darken_rgb, jitter_rgb};

/// A channel above this counts toward "white" (all three must be).
pub const WHITE_THRESHOLD: u8 = 200;
/// A channel below this counts toward "dark".
pub const DARK_THRESHOLD: u8 = 100;
/// Seeds are looked for on a grid with this spacing.
pub const SAMPLE_STEP: u32 = 5;
/// BFS stops enqueueing once a region reaches this many pixels.
pub const MAX_REGION_PIXELS: usize = 10_000;
/// Regions below this size are left alone.
pub const MIN_REGION_PIXELS: usize = 100;
pub const EDGE_RADIUS: i64 = 2;
pub const EDGE_DARKEN: u8 = 20;
pub const FILL_JITTER: i32 = 15;

/// Bright tones: every entry has a channel >= 200 and, after jitter, one
/// that stays below the white threshold.
pub const PALETTE: [[u8; 3]; 10] = [
    [255, 170, 180],
    [255, 215, 170],
    [255, 240, 150],
    [170, 240, 190],
    [170, 215, 255],
    [210, 175, 255],
    [255, 200, 140],
    [200, 250, 140],
    [140, 225, 250],
    [250, 150, 200],
];

const NEIGHBORS_8: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[inline]
pub fn is_white(p: &Rgba<u8>) -> bool {
    p[0] > WHITE_THRESHOLD && p[1] > WHITE_THRESHOLD && p[2] > WHITE_THRESHOLD
}

/// Line art: every channel below the dark threshold.
#[inline]
pub fn is_dark(p: &Rgba<u8>) -> bool {
    p[0] < DARK_THRESHOLD && p[1] < DARK_THRESHOLD && p[2] < DARK_THRESHOLD
}

/// Stricter exclusion used by smoothing: any single dark channel.
#[inline]
fn has_dark_channel(p: &[u8]) -> bool {
    p[0] < DARK_THRESHOLD || p[1] < DARK_THRESHOLD || p[2] < DARK_THRESHOLD
}

/// One accepted region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionInfo {
    pub id: usize,
    pub size: usize,
    pub seed: (u32, u32),
    pub color: [u8; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutoColorReport {
    /// Accepted regions, largest first.
    pub regions: Vec<RegionInfo>,
    /// Regions found but rejected for being too small.
    pub discarded: usize,
    pub filled_pixels: usize,
}

impl AutoColorReport {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// 8-connected BFS over white pixels from `seed`.
///
/// `visited` is marked on enqueue so no pixel is processed twice, across
/// calls too. Enqueueing stops once `cap` pixels have been queued.
pub(crate) fn flood_white_region(
    img: &RgbaImage,
    seed: (u32, u32),
    visited: &mut [bool],
    cap: usize,
) -> Vec<(u32, u32)> {
    let (w, h) = img.dimensions();
    let (sx, sy) = seed;
    if sx >= w || sy >= h {
        return Vec::new();
    }
    let seed_idx = sy as usize * w as usize + sx as usize;
    if visited[seed_idx] || !is_white(img.get_pixel(sx, sy)) {
        return Vec::new();
    }

    let mut queue = VecDeque::new();
    let mut region = Vec::new();
    visited[seed_idx] = true;
    queue.push_back(seed);
    let mut queued = 1usize;

    while let Some((x, y)) = queue.pop_front() {
        region.push((x, y));
        for (dx, dy) in NEIGHBORS_8 {
            if queued >= cap {
                break;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            let idx = ny as usize * w as usize + nx as usize;
            if visited[idx] || !is_white(img.get_pixel(nx as u32, ny as u32)) {
                continue;
            }
            visited[idx] = true;
            queue.push_back((nx as u32, ny as u32));
            queued += 1;
        }
    }

    region
}

/// Find every enclosed white region reachable from a grid seed.
/// Returns accepted regions (largest first) and the number rejected.
pub fn detect_regions(img: &RgbaImage) -> (Vec<Vec<(u32, u32)>>, usize) {
    let (w, h) = img.dimensions();
    let mut visited = vec![false; w as usize * h as usize];
    let mut accepted = Vec::new();
    let mut discarded = 0;

    for y in (0..h).step_by(SAMPLE_STEP as usize) {
        for x in (0..w).step_by(SAMPLE_STEP as usize) {
            let region = flood_white_region(img, (x, y), &mut visited, MAX_REGION_PIXELS);
            if region.is_empty() {
                continue;
            }
            if region.len() >= MIN_REGION_PIXELS {
                accepted.push(region);
            } else {
                discarded += 1;
            }
        }
    }

    // Stable: equal sizes keep discovery order
    accepted.sort_by(|a, b| b.len().cmp(&a.len()));
    (accepted, discarded)
}

fn near_dark(img: &RgbaImage, x: u32, y: u32) -> bool {
    let (w, h) = img.dimensions();
    for dy in -EDGE_RADIUS..=EDGE_RADIUS {
        for dx in -EDGE_RADIUS..=EDGE_RADIUS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            if is_dark(img.get_pixel(nx as u32, ny as u32)) {
                return true;
            }
        }
    }
    false
}

/// Color every enclosed region of the surface in place. Line art is never touched.
pub fn auto_color<R: Rng + ?Sized>(surface: &mut RasterSurface, rng: &mut R) -> AutoColorReport {
    let original = surface.pixels();
    let (regions, discarded) = detect_regions(original);

    let mut report = AutoColorReport {
        discarded,
        ..Default::default()
    };
    if regions.is_empty() {
        log::info!("auto-color: no regions found ({} too small)", discarded);
        return report;
    }

    let mut filled_img = original.clone();

    for (i, region) in regions.iter().enumerate() {
        let palette_idx = (i * 3 + rng.gen_range(0..=2)) % PALETTE.len();
        let color = PALETTE[palette_idx];

        for &(x, y) in region {
            let mut rgb = jitter_rgb(color, FILL_JITTER, rng);
            if near_dark(original, x, y) {
                rgb = darken_rgb(rgb, EDGE_DARKEN);
            }
            filled_img.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        }

        report.filled_pixels += region.len();
        report.regions.push(RegionInfo {
            id: i,
            size: region.len(),
            seed: region[0],
            color,
        });
    }

    let smoothed = smooth(&filled_img);
    log::info!(
        "auto-color: {} regions, {} pixels ({} discarded)",
        report.regions.len(),
        report.filled_pixels,
        discarded
    );
    surface.replace_pixels(smoothed);
    report
}

/// One 3x3 box-blur pass over every non-line-art pixel, reading the
/// pre-smoothing buffer. Pixels with any dark channel are neither averaged in
/// nor written.
fn smooth(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    let wu = w as usize;
    let stride = wu * 4;
    let raw = src.as_raw();
    let mut out = raw.clone();

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..wu {
            let o = (y * wu + x) * 4;
            if has_dark_channel(&raw[o..o + 3]) {
                continue;
            }

            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let no = (ny as usize * wu + nx as usize) * 4;
                    let n = &raw[no..no + 3];
                    if has_dark_channel(n) {
                        continue;
                    }
                    sum[0] += n[0] as u32;
                    sum[1] += n[1] as u32;
                    sum[2] += n[2] as u32;
                    count += 1;
                }
            }

            // count >= 1: the pixel itself passed the check above
            let ro = x * 4;
            for c in 0..3 {
                row[ro + c] = ((sum[c] + count / 2) / count) as u8;
            }
        }
    });

    RgbaImage::from_raw(w, h, out).unwrap_or_else(|| src.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn palette_is_bright() {
        for c in PALETTE {
            assert!(c.iter().copied().max().unwrap_or(0) >= 200);
            assert!(c.iter().copied().min().unwrap_or(255) as i32 + FILL_JITTER <= WHITE_THRESHOLD as i32);
        }
    }

    #[test]
    fn bfs_respects_cap() {
        let img = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));
        let mut visited = vec![false; 200 * 200];
        let region = flood_white_region(&img, (0, 0), &mut visited, MAX_REGION_PIXELS);
        assert_eq!(region.len(), MAX_REGION_PIXELS);
        assert_eq!(visited.iter().filter(|v| **v).count(), MAX_REGION_PIXELS);
    }

    #[test]
    fn bfs_is_eight_connected() {
        // Two white pixels touching only at a corner, everything else black
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let mut visited = vec![false; 16];
        assert_eq!(flood_white_region(&img, (1, 1), &mut visited, 100).len(), 2);
    }

    #[test]
    fn blank_surface_is_one_region() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut surface = RasterSurface::new(50, 50);
        let report = auto_color(&mut surface, &mut rng);
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.filled_pixels, 2500);
        assert!(surface.pixels().pixels().all(|p| !is_white(p)));
    }

    #[test]
    fn grey_antialias_pixels_are_smoothed_too() {
        let mut img = RgbaImage::from_fn(30, 30, |x, y| {
            if x == 0 || y == 0 || x == 29 || y == 29 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        img.put_pixel(15, 15, Rgba([150, 150, 150, 255]));
        let mut surface = RasterSurface::from_rgba_image(img);
        auto_color(&mut surface, &mut StdRng::seed_from_u64(1));

        let p = surface.pixel(15, 15).unwrap_or(Rgba([0, 0, 0, 0]));
        assert_ne!(p, Rgba([150, 150, 150, 255]));
        // Eight filled neighbours pull it toward the region color
        assert!(p.0[..3].iter().any(|c| *c > 150));
    }

    #[test]
    fn all_black_surface_is_untouched() {
        let mut rng = StdRng::seed_from_u64(3);
        let img = RgbaImage::from_pixel(30, 30, Rgba([0, 0, 0, 255]));
        let mut surface = RasterSurface::from_rgba_image(img.clone());
        let report = auto_color(&mut surface, &mut rng);
        assert!(report.is_empty());
        assert_eq!(surface.pixels(), &img);
    }
}
