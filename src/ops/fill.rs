// ============================================================================
// FILL — click-triggered disc, radial pattern and region fills
// ============================================================================

use eframe::egui;
use egui::{Pos2, Rect};
use image::Rgba;

use crate::canvas::{Composite, RasterSurface};
use crate::components::tools::{BrushContext, BrushKind, FillStrategy};
use crate::ops::auto_color::flood_white_region;
use crate::ops::brushes::PatternStyle;

/// Pattern brushes above this intensity fill with a radial pattern.
pub const PATTERN_FILL_THRESHOLD: f32 = 0.3;

/// Radius of the radial pattern fill.
pub fn pattern_fill_radius(ctx: &BrushContext) -> f32 {
    ctx.size() * 2.0 * ctx.intensity() * 4.0
}

/// Radius of the plain disc fill.
pub fn disc_fill_radius(ctx: &BrushContext) -> f32 {
    ctx.size() * 2.0
}

/// Apply a fill at `pos`. Returns the touched rectangle, `None` for a no-op.
pub fn fill_at(
    surface: &mut RasterSurface,
    pos: Pos2,
    ctx: &BrushContext,
    strategy: FillStrategy,
) -> Option<Rect> {
    if pos.x < 0.0 || pos.y < 0.0 || pos.x >= surface.width() as f32 || pos.y >= surface.height() as f32 {
        log::debug!("fill at {:?} is outside the surface", pos);
        return None;
    }

    match strategy {
        FillStrategy::Region => region_fill(surface, pos, ctx.color()),
        FillStrategy::Disc => {
            if ctx.kind() == BrushKind::Pattern && ctx.intensity() > PATTERN_FILL_THRESHOLD {
                pattern_fill(surface, pos, ctx)
            } else {
                surface.stamp_disc(pos, disc_fill_radius(ctx), ctx.color(), 1.0, Composite::SourceOver)
            }
        }
    }
}

/// Radial fill: dots, stripes or a fading gradient, picked like the pattern brush.
fn pattern_fill(surface: &mut RasterSurface, center: Pos2, ctx: &BrushContext) -> Option<Rect> {
    let radius = pattern_fill_radius(ctx);
    let size = ctx.size();
    let color = ctx.color();

    match PatternStyle::index_for(ctx.intensity()) {
        0 => {
            let spacing = (size * 1.5).max(3.0);
            let steps = (radius / spacing).ceil() as i32;
            let mut touched: Option<Rect> = None;
            for gy in -steps..=steps {
                for gx in -steps..=steps {
                    let p = center + egui::vec2(gx as f32, gy as f32) * spacing;
                    if p.distance(center) > radius {
                        continue;
                    }
                    if let Some(r) = surface.stamp_disc(p, (size * 0.4).max(0.5), color, 1.0, Composite::SourceOver) {
                        touched = Some(touched.map_or(r, |t| t.union(r)));
                    }
                }
            }
            touched
        }
        1 => {
            let period = size.max(2.0);
            paint_radial(surface, center, radius, color, |p, _| {
                let band = ((p.y - center.y) / period).floor() as i64;
                if band.rem_euclid(2) == 0 { 1.0 } else { 0.0 }
            })
        }
        _ => paint_radial(surface, center, radius, color, |_, d| 1.0 - d / radius),
    }
}

/// Blend every pixel whose center lies within `radius`, at `alpha_at(center, distance)`.
fn paint_radial<F>(
    surface: &mut RasterSurface,
    center: Pos2,
    radius: f32,
    color: [u8; 3],
    alpha_at: F,
) -> Option<Rect>
where
    F: Fn(Pos2, f32) -> f32,
{
    if radius <= 0.0 {
        return None;
    }
    let min_x = (center.x - radius).floor().max(0.0) as i32;
    let min_y = (center.y - radius).floor().max(0.0) as i32;
    let max_x = (center.x + radius).ceil().min(surface.width() as f32) as i32;
    let max_y = (center.y + radius).ceil().min(surface.height() as f32) as i32;
    if min_x >= max_x || min_y >= max_y {
        return None;
    }

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
            let d = p.distance(center);
            if d > radius {
                continue;
            }
            let a = alpha_at(p, d);
            if a > 0.0 {
                surface.blend_pixel(x, y, color, a, Composite::SourceOver);
            }
        }
    }

    let rect = Rect::from_min_max(
        Pos2::new(min_x as f32, min_y as f32),
        Pos2::new(max_x as f32, max_y as f32),
    );
    surface.mark_dirty(Some(rect));
    Some(rect)
}

/// Flood the white region under `pos` with `color`, stopping at line art.
fn region_fill(surface: &mut RasterSurface, pos: Pos2, color: [u8; 3]) -> Option<Rect> {
    let seed = (pos.x as u32, pos.y as u32);
    let mut visited = vec![false; surface.width() as usize * surface.height() as usize];
    let region = flood_white_region(surface.pixels(), seed, &mut visited, usize::MAX);
    if region.is_empty() {
        log::debug!("region fill at {:?}: not on a white pixel", seed);
        return None;
    }

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed.0, seed.1, seed.0, seed.1);
    let fill = Rgba([color[0], color[1], color[2], 255]);
    for &(x, y) in &region {
        surface.put_pixel(x, y, fill);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let rect = Rect::from_min_max(
        Pos2::new(min_x as f32, min_y as f32),
        Pos2::new(max_x as f32 + 1.0, max_y as f32 + 1.0),
    );
    surface.mark_dirty(Some(rect));
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WHITE;

    fn ctx(kind: BrushKind, intensity: f32, size: f32) -> BrushContext {
        BrushContext::new(kind, intensity, [0, 0, 255], size)
    }

    #[test]
    fn disc_fill_uses_twice_the_size() {
        let mut s = RasterSurface::new(40, 40);
        fill_at(&mut s, Pos2::new(20.0, 20.0), &ctx(BrushKind::Standard, 0.5, 5.0), FillStrategy::Disc);
        // pixel centers 9 px away are inside, 11 px away are not
        assert_eq!(s.pixel(28, 19), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(s.pixel(31, 19), Some(WHITE));
    }

    #[test]
    fn low_intensity_pattern_falls_back_to_disc() {
        let mut s = RasterSurface::new(40, 40);
        fill_at(&mut s, Pos2::new(20.0, 20.0), &ctx(BrushKind::Pattern, 0.3, 5.0), FillStrategy::Disc);
        assert_eq!(s.pixel(20, 20), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(s.pixel(20, 31), Some(WHITE));
    }

    #[test]
    fn gradient_pattern_fades_outward() {
        let mut s = RasterSurface::new(100, 100);
        let c = ctx(BrushKind::Pattern, 1.0, 5.0);
        assert_eq!(pattern_fill_radius(&c), 40.0);
        fill_at(&mut s, Pos2::new(50.0, 50.0), &c, FillStrategy::Disc);
        let near = s.pixel(50, 50).map(|p| p[0]).unwrap_or(255);
        let far = s.pixel(50, 85).map(|p| p[0]).unwrap_or(0);
        assert!(near < far);
        assert_eq!(s.pixel(50, 95), Some(WHITE));
    }

    #[test]
    fn outside_click_is_noop() {
        let mut s = RasterSurface::new(10, 10);
        assert!(fill_at(&mut s, Pos2::new(-1.0, 4.0), &ctx(BrushKind::Standard, 1.0, 3.0), FillStrategy::Disc).is_none());
        assert!(s.pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn region_fill_stops_at_line_art() {
        let mut s = RasterSurface::new(20, 20);
        for i in 0..20 {
            s.put_pixel(10, i, Rgba([0, 0, 0, 255]));
        }
        let rect = fill_at(&mut s, Pos2::new(3.0, 3.0), &ctx(BrushKind::Standard, 1.0, 1.0), FillStrategy::Region)
            .unwrap();
        assert_eq!(rect.max.x, 10.0);
        assert_eq!(s.pixel(0, 19), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(s.pixel(10, 5), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(s.pixel(15, 5), Some(WHITE));

        // Clicking the outline itself does nothing
        assert!(fill_at(&mut s, Pos2::new(10.5, 5.5), &ctx(BrushKind::Standard, 1.0, 1.0), FillStrategy::Region).is_none());
    }
}
