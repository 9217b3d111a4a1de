use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect};
use image::{Rgba, RgbaImage};

/// Default edge length of a new coloring surface.
pub const DEFAULT_CANVAS_SIZE: u32 = 800;

/// Largest surface we will allocate per axis.
pub const MAX_CANVAS_DIM: u32 = 16_384;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// How painted coverage is combined with the pixels already on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Composite {
    /// Normal painting: color over the existing content.
    #[default]
    SourceOver,
    /// Cut-out: removes existing content in proportion to coverage.
    DestinationOut,
}

/// Perceived brightness used by line-art detection: plain channel average.
#[inline]
pub fn brightness(p: &Rgba<u8>) -> f32 {
    (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0
}

/// Distance from `p` to the segment `a`–`b`.
#[inline]
pub fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq < 1e-6 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Opaque full copy of a surface's pixels, used by the history manager.
#[derive(Clone)]
pub struct SurfaceSnapshot {
    pixels: RgbaImage,
}

impl SurfaceSnapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// The pixel buffer a coloring session paints on.
///
/// Dimensions are fixed at creation. Every primitive clips against the surface
/// bounds, samples coverage at pixel centers and reports the rectangle it touched
/// so callers can build undo patches.
pub struct RasterSurface {
    pixels: RgbaImage,
    /// Union of everything painted since the host last consumed it.
    pub dirty_rect: Option<Rect>,
    /// Bumped on every mutation; hosts compare it to decide when to re-upload.
    pub dirty_generation: u64,
}

impl RasterSurface {
    /// New opaque white surface.
    pub fn new(width: u32, height: u32) -> Self {
        let w = width.clamp(1, MAX_CANVAS_DIM);
        let h = height.clamp(1, MAX_CANVAS_DIM);
        Self {
            pixels: RgbaImage::from_pixel(w, h, WHITE),
            dirty_rect: None,
            dirty_generation: 0,
        }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let mut surface = Self {
            pixels: img,
            dirty_rect: None,
            dirty_generation: 0,
        };
        surface.mark_dirty(None);
        surface
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn full_rect(&self) -> Rect {
        Rect::from_min_max(
            Pos2::ZERO,
            Pos2::new(self.width() as f32, self.height() as f32),
        )
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x < self.width() && y < self.height() {
            self.pixels.put_pixel(x, y, color);
        }
    }

    /// Replace the whole buffer. Dimensions must match; mismatches are ignored.
    pub fn replace_pixels(&mut self, pixels: RgbaImage) {
        if pixels.dimensions() != self.pixels.dimensions() {
            log::warn!(
                "replace_pixels: size {:?} does not match surface {:?}",
                pixels.dimensions(),
                self.pixels.dimensions()
            );
            return;
        }
        self.pixels = pixels;
        self.mark_dirty(None);
    }

    pub fn mark_dirty(&mut self, rect: Option<Rect>) {
        let rect = rect.unwrap_or_else(|| self.full_rect());
        self.dirty_rect = Some(match self.dirty_rect {
            Some(existing) => existing.union(rect),
            None => rect,
        });
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    pub fn take_dirty_rect(&mut self) -> Option<Rect> {
        self.dirty_rect.take()
    }

    /// Reset to opaque white.
    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = WHITE;
        }
        self.mark_dirty(None);
    }

    /// Clear to white and draw `template` scaled to fit, centered, aspect kept.
    pub fn draw_template(&mut self, template: &RgbaImage) {
        let (tw, th) = template.dimensions();
        for p in self.pixels.pixels_mut() {
            *p = WHITE;
        }
        if tw == 0 || th == 0 {
            self.mark_dirty(None);
            return;
        }

        let scale = (self.width() as f32 / tw as f32).min(self.height() as f32 / th as f32);
        let new_w = ((tw as f32 * scale).round() as u32).clamp(1, self.width());
        let new_h = ((th as f32 * scale).round() as u32).clamp(1, self.height());
        let scaled = if (new_w, new_h) == (tw, th) {
            template.clone()
        } else {
            image::imageops::resize(
                template,
                new_w,
                new_h,
                image::imageops::FilterType::Triangle,
            )
        };

        let off_x = (self.width() - new_w) / 2;
        let off_y = (self.height() - new_h) / 2;
        for (x, y, src) in scaled.enumerate_pixels() {
            let dst = self.pixels.get_pixel_mut(off_x + x, off_y + y);
            blend_over(dst, [src[0], src[1], src[2]], src[3] as f32 / 255.0);
        }
        self.mark_dirty(None);
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            pixels: self.pixels.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &SurfaceSnapshot) {
        self.replace_pixels(snapshot.pixels.clone());
    }

    // ========================================================================
    // PAINT PRIMITIVES
    // ========================================================================

    /// Blend one pixel. Coordinates outside the surface are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 3], alpha: f32, mode: Composite) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        match mode {
            Composite::SourceOver => blend_over(dst, color, alpha),
            Composite::DestinationOut => erase_out(dst, alpha),
        }
    }

    /// Anti-aliased filled circle.
    pub fn stamp_disc(
        &mut self,
        center: Pos2,
        radius: f32,
        color: [u8; 3],
        alpha: f32,
        mode: Composite,
    ) -> Option<Rect> {
        if radius <= 0.0 || alpha <= 0.0 {
            return None;
        }
        let reach = radius + 1.0;
        let bounds = Rect::from_center_size(center, egui::vec2(reach * 2.0, reach * 2.0));
        self.paint_coverage(bounds, color, alpha, mode, |p| {
            coverage(radius - p.distance(center))
        })
    }

    /// Round-capped line of the given width.
    pub fn stroke_segment(
        &mut self,
        a: Pos2,
        b: Pos2,
        width: f32,
        color: [u8; 3],
        alpha: f32,
        mode: Composite,
    ) -> Option<Rect> {
        if width <= 0.0 || alpha <= 0.0 {
            return None;
        }
        let half = width / 2.0;
        let bounds = Rect::from_two_pos(a, b).expand(half + 1.0);
        self.paint_coverage(bounds, color, alpha, mode, |p| {
            coverage(half - distance_to_segment(p, a, b))
        })
    }

    /// Round-capped line with a soft halo of `blur` pixels around its edge.
    pub fn stroke_segment_glow(
        &mut self,
        a: Pos2,
        b: Pos2,
        width: f32,
        color: [u8; 3],
        blur: f32,
    ) -> Option<Rect> {
        if width <= 0.0 {
            return None;
        }
        let half = width / 2.0;
        let blur = blur.max(0.0);
        let bounds = Rect::from_two_pos(a, b).expand(half + blur + 1.0);
        self.paint_coverage(bounds, color, 1.0, Composite::SourceOver, |p| {
            let d = distance_to_segment(p, a, b);
            let core = coverage(half - d);
            if blur <= 0.0 || d <= half {
                return core;
            }
            let falloff = (1.0 - (d - half) / blur).clamp(0.0, 1.0);
            core.max(0.5 * falloff * falloff)
        })
    }

    /// Annulus centered at `center`, `thickness` wide, outer edge at `radius`.
    pub fn stroke_ring(
        &mut self,
        center: Pos2,
        radius: f32,
        thickness: f32,
        color: [u8; 3],
        alpha: f32,
    ) -> Option<Rect> {
        if radius <= 0.0 || thickness <= 0.0 || alpha <= 0.0 {
            return None;
        }
        let inner = (radius - thickness).max(0.0);
        let bounds = Rect::from_center_size(center, egui::vec2(radius * 2.0 + 2.0, radius * 2.0 + 2.0));
        self.paint_coverage(bounds, color, alpha, Composite::SourceOver, |p| {
            let d = p.distance(center);
            coverage(radius - d).min(coverage(d - inner))
        })
    }

    /// Walk every pixel center inside `bounds` (clipped) and blend `alpha * coverage`.
    /// Returns the clipped rectangle, or `None` if it fell outside the surface.
    fn paint_coverage<F>(
        &mut self,
        bounds: Rect,
        color: [u8; 3],
        alpha: f32,
        mode: Composite,
        coverage_at: F,
    ) -> Option<Rect>
    where
        F: Fn(Pos2) -> f32,
    {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let min_x = bounds.min.x.floor().max(0.0);
        let min_y = bounds.min.y.floor().max(0.0);
        let max_x = bounds.max.x.ceil().min(w);
        let max_y = bounds.max.y.ceil().min(h);
        if min_x >= max_x || min_y >= max_y {
            return None;
        }

        for y in min_y as u32..max_y as u32 {
            for x in min_x as u32..max_x as u32 {
                let c = coverage_at(Pos2::new(x as f32 + 0.5, y as f32 + 0.5));
                if c <= 0.0 {
                    continue;
                }
                let dst = self.pixels.get_pixel_mut(x, y);
                match mode {
                    Composite::SourceOver => blend_over(dst, color, alpha * c),
                    Composite::DestinationOut => erase_out(dst, alpha * c),
                }
            }
        }

        let rect = Rect::from_min_max(Pos2::new(min_x, min_y), Pos2::new(max_x, max_y));
        self.mark_dirty(Some(rect));
        Some(rect)
    }

    /// Converts the surface to egui's ColorImage format
    pub fn to_color_image(&self) -> ColorImage {
        let size = [self.width() as usize, self.height() as usize];
        let pixels: Vec<Color32> = self
            .pixels
            .as_raw()
            .chunks_exact(4)
            .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
            .collect();
        ColorImage { size, pixels }
    }
}

/// One-pixel anti-aliasing ramp from a signed edge distance.
#[inline]
fn coverage(signed_distance: f32) -> f32 {
    (signed_distance + 0.5).clamp(0.0, 1.0)
}

/// Source-over on straight (non-premultiplied) RGBA.
pub(crate) fn blend_over(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        *dst = TRANSPARENT;
        return;
    }
    for c in 0..3 {
        let v = (src[c] as f32 * a + dst[c] as f32 * da * (1.0 - a)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Destination-out: scale the existing alpha down by `alpha`.
fn erase_out(dst: &mut Rgba<u8>, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    let remaining = dst[3] as f32 * (1.0 - a);
    if remaining < 0.5 {
        *dst = TRANSPARENT;
    } else {
        dst[3] = remaining.round() as u8;
    }
}
