// ============================================================================
// BRUSH EFFECTS — per-segment stroke algorithms
// ============================================================================
//
// Every brush is a function of (surface, start, end, context, rng). Strokes
// arrive as a chain of short segments, one per pointer move, so nothing here
// keeps state between calls apart from the random source.

use eframe::egui;
use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;
use rand::Rng;
use std::f32::consts::PI;

use crate::canvas::{Composite, RasterSurface, brightness};
use crate::components::tools::{BrushContext, BrushKind};
use crate::ops::color::{Hsl, jitter_rgb, scale_rgb};

/// Guided coloring treats anything darker than this as an outline.
pub const GUIDE_DARK_THRESHOLD: f32 = 50.0;

/// Per-channel jitter applied to texture noise dots.
pub const COLOR_JITTER: i32 = 15;

pub const TEXTURE_NOISE_DOTS: usize = 3;

/// Width multipliers and base alphas of the three blend passes.
pub const BLEND_WIDTHS: [f32; 3] = [1.0, 1.5, 2.5];
pub const BLEND_ALPHAS: [f32; 3] = [0.4, 0.2, 0.1];

pub const SHADE_DARKEN: f32 = 0.7;

const WHITE_RGB: [u8; 3] = [255, 255, 255];
const FINISH_ALPHA: f32 = 0.3;

/// One guided-coloring sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuideProbe {
    pub position: Pos2,
    /// Radius actually painted at this sample.
    pub radius: f32,
    pub near_boundary: bool,
}

/// What one brush call touched.
#[derive(Debug, Default)]
pub struct BrushOutput {
    pub bounds: Option<Rect>,
    pub probes: Vec<GuideProbe>,
}

impl BrushOutput {
    fn include(&mut self, rect: Option<Rect>) {
        if let Some(r) = rect {
            self.bounds = Some(match self.bounds {
                Some(existing) => existing.union(r),
                None => r,
            });
        }
    }
}

/// Sub-pattern shared by the pattern brush and the pattern fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternStyle {
    Dots,
    CrossHatch,
    Zigzag,
}

impl PatternStyle {
    /// `min(2, floor(intensity * 3))`
    pub fn index_for(intensity: f32) -> usize {
        ((intensity.clamp(0.0, 1.0) * 3.0).floor() as usize).min(2)
    }

    pub fn from_intensity(intensity: f32) -> Self {
        match Self::index_for(intensity) {
            0 => PatternStyle::Dots,
            1 => PatternStyle::CrossHatch,
            _ => PatternStyle::Zigzag,
        }
    }

    /// Stamp every n-th sampled point.
    pub fn stride(&self) -> usize {
        match self {
            PatternStyle::Dots | PatternStyle::CrossHatch => 3,
            PatternStyle::Zigzag => 2,
        }
    }
}

// ============================================================================
// DERIVED PARAMETERS
// ============================================================================

pub fn glow_blur(ctx: &BrushContext) -> f32 {
    ctx.size() * ctx.intensity() * 2.0
}

/// `(width, alpha)` of each blend pass.
pub fn blend_passes(ctx: &BrushContext) -> [(f32, f32); 3] {
    let mut passes = [(0.0, 0.0); 3];
    for (i, pass) in passes.iter_mut().enumerate() {
        *pass = (BLEND_WIDTHS[i] * ctx.size(), BLEND_ALPHAS[i] * ctx.intensity());
    }
    passes
}

/// Base dot radius range of the texture brush.
pub fn texture_radius_range(ctx: &BrushContext) -> (f32, f32) {
    let scale = ctx.size() * ctx.intensity();
    (0.5 * scale, 1.0 * scale)
}

pub fn shade_alpha(ctx: &BrushContext) -> f32 {
    0.3 * ctx.intensity()
}

/// Largest absolute hue (degrees), saturation and lightness (percent) offsets.
pub fn smart_adjust_amplitude(ctx: &BrushContext) -> (f32, f32, f32) {
    let i = ctx.intensity();
    (15.0 * i, 10.0 * i, 15.0 * i)
}

/// Hue/saturation/lightness offsets at stroke fraction `t`.
pub fn smart_adjust_shift(intensity: f32, t: f32) -> (f32, f32, f32) {
    let d_hue = (2.0 * PI * t).sin() * 15.0 * intensity;
    let d_sat = (PI * t).cos() * 10.0 * intensity;
    let d_light = ((3.0 * PI * t).sin() * 10.0 - 5.0) * intensity;
    (d_hue, d_sat, d_light)
}

pub fn highlight_probability(ctx: &BrushContext) -> f32 {
    0.3 * ctx.intensity()
}

pub fn guidance_radius(ctx: &BrushContext) -> f32 {
    3.0 * ctx.size() * ctx.intensity()
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Render one segment with the context's brush.
///
/// `guide` is the surface as it was when the stroke started; guided coloring
/// falls back to a copy of the current pixels when none is given.
pub fn apply_brush<R: Rng + ?Sized>(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    guide: Option<&RgbaImage>,
    rng: &mut R,
) -> BrushOutput {
    let mut out = BrushOutput::default();
    match ctx.kind() {
        BrushKind::Standard => {
            out.include(surface.stroke_segment(
                start,
                end,
                ctx.size(),
                ctx.color(),
                1.0,
                Composite::SourceOver,
            ));
        }
        BrushKind::SmartColor => smart_color(surface, start, end, ctx, &mut out),
        BrushKind::Texture => texture(surface, start, end, ctx, rng, &mut out),
        BrushKind::Blend => blend(surface, start, end, ctx, &mut out),
        BrushKind::Shade => shade(surface, start, end, ctx, &mut out),
        BrushKind::Pattern => pattern(surface, start, end, ctx, &mut out),
        BrushKind::SmartAdjust => smart_adjust(surface, start, end, ctx, rng, &mut out),
        BrushKind::GuidedColoring => {
            let owned;
            let guide = match guide {
                Some(g) => g,
                None => {
                    owned = surface.pixels().clone();
                    &owned
                }
            };
            guided(surface, start, end, ctx, guide, &mut out);
        }
    }
    out
}

/// `max(1, floor(distance))`
fn sample_count(start: Pos2, end: Pos2) -> usize {
    (start.distance(end).floor() as usize).max(1)
}

/// Evenly spaced points from `start` to `end`, with their fraction `t`.
fn sample_points(start: Pos2, end: Pos2, count: usize) -> impl Iterator<Item = (f32, Pos2)> {
    let count = count.max(1);
    (0..count).map(move |i| {
        let t = if count == 1 {
            0.0
        } else {
            i as f32 / (count - 1) as f32
        };
        (t, start.lerp(end, t))
    })
}

fn segment_direction(start: Pos2, end: Pos2) -> Vec2 {
    let d = end - start;
    if d.length_sq() < 1e-6 {
        Vec2::X
    } else {
        d.normalized()
    }
}

// ============================================================================
// BRUSHES
// ============================================================================

fn smart_color(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    out: &mut BrushOutput,
) {
    out.include(surface.stroke_segment_glow(start, end, ctx.size(), ctx.color(), glow_blur(ctx)));
}

fn texture<R: Rng + ?Sized>(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    rng: &mut R,
    out: &mut BrushOutput,
) {
    let (lo, hi) = texture_radius_range(ctx);
    let size = ctx.size();
    for (_, p) in sample_points(start, end, sample_count(start, end)) {
        let radius = rng.gen_range(lo..=hi);
        out.include(surface.stamp_disc(p, radius, ctx.color(), 1.0, Composite::SourceOver));

        for _ in 0..TEXTURE_NOISE_DOTS {
            let offset = egui::vec2(rng.gen_range(-size..=size), rng.gen_range(-size..=size));
            let color = jitter_rgb(ctx.color(), COLOR_JITTER, rng);
            let noise_radius = rng.gen_range(lo..=hi) * 0.3;
            out.include(surface.stamp_disc(
                p + offset,
                noise_radius,
                color,
                0.6,
                Composite::SourceOver,
            ));
        }
    }
}

fn blend(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    out: &mut BrushOutput,
) {
    for (width, alpha) in blend_passes(ctx) {
        out.include(surface.stroke_segment(
            start,
            end,
            width,
            ctx.color(),
            alpha,
            Composite::SourceOver,
        ));
    }
}

fn shade(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    out: &mut BrushOutput,
) {
    let size = ctx.size();
    out.include(surface.stroke_segment(start, end, size, ctx.color(), 1.0, Composite::SourceOver));

    let angle = (end.y - start.y).atan2(end.x - start.x) + PI / 2.0;
    let offset = egui::vec2(angle.cos(), angle.sin()) * size * 0.5;
    out.include(surface.stroke_segment(
        start + offset,
        end + offset,
        size * 0.7,
        scale_rgb(ctx.color(), SHADE_DARKEN),
        shade_alpha(ctx),
        Composite::SourceOver,
    ));
}

fn pattern(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    out: &mut BrushOutput,
) {
    let size = ctx.size();
    let color = ctx.color();
    let style = PatternStyle::from_intensity(ctx.intensity());
    let stride = style.stride();
    let normal = segment_direction(start, end).rot90();

    let mut prev_zig = start;
    for (i, (_, p)) in sample_points(start, end, sample_count(start, end)).enumerate() {
        if i % stride != 0 {
            continue;
        }
        match style {
            PatternStyle::Dots => {
                out.include(surface.stamp_disc(p, size * 0.4, color, 1.0, Composite::SourceOver));
            }
            PatternStyle::CrossHatch => {
                let h = size * 0.5;
                let width = (size * 0.15).max(1.0);
                out.include(surface.stroke_segment(
                    p + egui::vec2(-h, -h),
                    p + egui::vec2(h, h),
                    width,
                    color,
                    1.0,
                    Composite::SourceOver,
                ));
                out.include(surface.stroke_segment(
                    p + egui::vec2(-h, h),
                    p + egui::vec2(h, -h),
                    width,
                    color,
                    1.0,
                    Composite::SourceOver,
                ));
            }
            PatternStyle::Zigzag => {
                let side = if (i / stride) % 2 == 0 { 1.0 } else { -1.0 };
                let zig = p + normal * (side * size * 0.5);
                out.include(surface.stroke_segment(
                    prev_zig,
                    zig,
                    (size * 0.3).max(1.0),
                    color,
                    1.0,
                    Composite::SourceOver,
                ));
                prev_zig = zig;
            }
        }
    }
}

fn smart_adjust<R: Rng + ?Sized>(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    rng: &mut R,
    out: &mut BrushOutput,
) {
    let size = ctx.size();
    let base = Hsl::from_rgb(ctx.color());
    let highlight_p = highlight_probability(ctx);

    for (t, p) in sample_points(start, end, sample_count(start, end)) {
        let (d_hue, d_sat, d_light) = smart_adjust_shift(ctx.intensity(), t);
        let rgb = base.shifted(d_hue, d_sat, d_light).to_rgb();
        out.include(surface.stamp_disc(p, size * 0.8, rgb, 1.0, Composite::SourceOver));

        if rng.r#gen::<f32>() < highlight_p {
            let offset = egui::vec2(rng.gen_range(-0.5..=0.5), rng.gen_range(-0.5..=0.5)) * size;
            let light = base.shifted(d_hue, d_sat, d_light + 20.0).to_rgb();
            out.include(surface.stamp_disc(
                p + offset,
                size * 0.3,
                light,
                0.6,
                Composite::SourceOver,
            ));
        }
    }

    out.include(surface.stroke_segment(
        start,
        end,
        size,
        ctx.color(),
        FINISH_ALPHA,
        Composite::SourceOver,
    ));
}

fn guided(
    surface: &mut RasterSurface,
    start: Pos2,
    end: Pos2,
    ctx: &BrushContext,
    guide: &RgbaImage,
    out: &mut BrushOutput,
) {
    let size = ctx.size();
    let color = ctx.color();
    let radius = guidance_radius(ctx);
    let count = ((start.distance(end) * 2.0).floor() as usize).max(2);

    for (_, p) in sample_points(start, end, count) {
        let probe = match boundary_direction(guide, p, radius) {
            Some(dir) => {
                let r = size * 0.6;
                out.include(surface.stamp_disc(p, r, color, 1.0, Composite::SourceOver));
                out.include(surface.stroke_ring(p, r + 1.0, 1.0, WHITE_RGB, 0.3));
                out.include(surface.stamp_disc(
                    p - dir * (size * 0.8),
                    size * 0.4,
                    color,
                    0.3,
                    Composite::SourceOver,
                ));
                GuideProbe { position: p, radius: r, near_boundary: true }
            }
            None => {
                out.include(surface.stamp_disc(p, size, color, 1.0, Composite::SourceOver));
                GuideProbe { position: p, radius: size, near_boundary: false }
            }
        };
        out.probes.push(probe);
    }

    out.include(surface.stroke_segment(
        start,
        end,
        size * 0.5,
        color,
        FINISH_ALPHA,
        Composite::SourceOver,
    ));
}

// ============================================================================
// BOUNDARY DETECTION
// ============================================================================

#[inline]
fn is_outline(p: &image::Rgba<u8>) -> bool {
    p[3] > 0 && brightness(p) < GUIDE_DARK_THRESHOLD
}

/// Whether an outline pixel lies within `radius` of `p`.
///
/// Distance is measured from `p` to the pixel's unit cell, so a point inside
/// an outline pixel is always near a boundary, even at radius 0.
pub fn near_boundary(guide: &RgbaImage, p: Pos2, radius: f32) -> bool {
    boundary_direction(guide, p, radius).is_some()
}

/// Unit vector from `p` toward the closest outline pixel within `radius`.
/// Zero when `p` sits on the outline itself.
fn boundary_direction(guide: &RgbaImage, p: Pos2, radius: f32) -> Option<Vec2> {
    let (w, h) = guide.dimensions();
    if w == 0 || h == 0 || radius < 0.0 {
        return None;
    }
    let x0 = (p.x - radius - 1.0).ceil().max(0.0) as i64;
    let y0 = (p.y - radius - 1.0).ceil().max(0.0) as i64;
    let x1 = (p.x + radius).floor().min(w as f32 - 1.0) as i64;
    let y1 = (p.y + radius).floor().min(h as f32 - 1.0) as i64;
    if x1 < x0 || y1 < y0 {
        return None;
    }

    let r_sq = radius * radius;
    let mut best: Option<(f32, Vec2)> = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (xf, yf) = (x as f32, y as f32);
            let dx = if p.x < xf { xf - p.x } else if p.x > xf + 1.0 { p.x - xf - 1.0 } else { 0.0 };
            let dy = if p.y < yf { yf - p.y } else if p.y > yf + 1.0 { p.y - yf - 1.0 } else { 0.0 };
            if dx * dx + dy * dy > r_sq {
                continue;
            }
            if !is_outline(guide.get_pixel(x as u32, y as u32)) {
                continue;
            }
            let to_center = Pos2::new(xf + 0.5, yf + 0.5) - p;
            let d = to_center.length_sq();
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, to_center));
            }
        }
    }

    best.map(|(_, v)| if v.length_sq() < 1e-6 { Vec2::ZERO } else { v.normalized() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx(kind: BrushKind, intensity: f32, size: f32) -> BrushContext {
        BrushContext::new(kind, intensity, [200, 40, 40], size)
    }

    #[test]
    fn pattern_index_is_capped() {
        assert_eq!(PatternStyle::index_for(0.0), 0);
        assert_eq!(PatternStyle::index_for(0.34), 1);
        assert_eq!(PatternStyle::index_for(0.99), 2);
        assert_eq!(PatternStyle::index_for(1.0), 2);
    }

    #[test]
    fn smart_adjust_shift_at_endpoints() {
        let (h, s, l) = smart_adjust_shift(1.0, 0.0);
        assert!(h.abs() < 1e-4);
        assert!((s - 10.0).abs() < 1e-4);
        assert!((l + 5.0).abs() < 1e-4);
        let (_, s, _) = smart_adjust_shift(1.0, 1.0);
        assert!((s + 10.0).abs() < 1e-4);
    }

    #[test]
    fn near_boundary_counts_the_pixel_under_the_point() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        img.put_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert!(near_boundary(&img, Pos2::new(4.5, 4.5), 0.0));
        assert!(!near_boundary(&img, Pos2::new(7.5, 4.5), 2.0));
        assert!(near_boundary(&img, Pos2::new(7.5, 4.5), 2.5));
    }

    #[test]
    fn transparent_pixels_are_not_outlines() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        img.put_pixel(4, 4, Rgba([0, 0, 0, 0]));
        assert!(!near_boundary(&img, Pos2::new(4.5, 4.5), 3.0));
    }

    #[test]
    fn every_brush_paints_something() {
        let mut rng = StdRng::seed_from_u64(1);
        for kind in BrushKind::all() {
            let mut surface = RasterSurface::new(64, 64);
            let out = apply_brush(
                &mut surface,
                Pos2::new(10.0, 30.0),
                Pos2::new(50.0, 30.0),
                &ctx(*kind, 0.8, 4.0),
                None,
                &mut rng,
            );
            assert!(out.bounds.is_some(), "{:?} painted nothing", kind);
            assert_ne!(surface.pixel(30, 30), Some(crate::canvas::WHITE), "{:?}", kind);
        }
    }

    #[test]
    fn guided_reports_one_probe_per_sample() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut surface = RasterSurface::new(64, 64);
        let out = apply_brush(
            &mut surface,
            Pos2::new(10.0, 10.0),
            Pos2::new(20.0, 10.0),
            &ctx(BrushKind::GuidedColoring, 0.5, 3.0),
            None,
            &mut rng,
        );
        assert_eq!(out.probes.len(), 20);
        assert!(out.probes.iter().all(|p| !p.near_boundary && p.radius == 3.0));
    }
}
