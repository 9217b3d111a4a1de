use crate::canvas::{Composite, RasterSurface};
use crate::components::history::PixelPatch;
use crate::ops::brushes::{self, GuideProbe};
use eframe::egui;
use egui::{Color32, Pos2, Rect};
use image::RgbaImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The stroke algorithms a brush can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrushKind {
    #[default]
    Standard,
    SmartColor,
    Texture,
    Blend,
    Shade,
    Pattern,
    SmartAdjust,
    GuidedColoring,
}

impl BrushKind {
    pub fn label(&self) -> &'static str {
        match self {
            BrushKind::Standard => "Standard",
            BrushKind::SmartColor => "Smart Color",
            BrushKind::Texture => "Texture",
            BrushKind::Blend => "Blend",
            BrushKind::Shade => "Shade",
            BrushKind::Pattern => "Pattern",
            BrushKind::SmartAdjust => "Smart Adjust",
            BrushKind::GuidedColoring => "Guided Coloring",
        }
    }

    /// Stable name used by the settings file and the CLI.
    pub fn key(&self) -> &'static str {
        match self {
            BrushKind::Standard => "standard",
            BrushKind::SmartColor => "smart-color",
            BrushKind::Texture => "texture",
            BrushKind::Blend => "blend",
            BrushKind::Shade => "shade",
            BrushKind::Pattern => "pattern",
            BrushKind::SmartAdjust => "smart-adjust",
            BrushKind::GuidedColoring => "guided-coloring",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::all().iter().copied().find(|k| k.key() == s)
    }

    pub fn all() -> &'static [BrushKind] {
        &[
            BrushKind::Standard,
            BrushKind::SmartColor,
            BrushKind::Texture,
            BrushKind::Blend,
            BrushKind::Shade,
            BrushKind::Pattern,
            BrushKind::SmartAdjust,
            BrushKind::GuidedColoring,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawMode {
    #[default]
    Draw,
    Erase,
    Fill,
}

impl DrawMode {
    pub fn label(&self) -> &'static str {
        match self {
            DrawMode::Draw => "Draw",
            DrawMode::Erase => "Erase",
            DrawMode::Fill => "Fill",
        }
    }

    pub fn all() -> &'static [DrawMode] {
        &[DrawMode::Draw, DrawMode::Erase, DrawMode::Fill]
    }
}

/// What a click in fill mode does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillStrategy {
    /// Disc (or radial pattern) stamped at the click.
    #[default]
    Disc,
    /// Flood the white region under the click, stopping at line art.
    Region,
}

impl FillStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            FillStrategy::Disc => "Disc",
            FillStrategy::Region => "Region",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            FillStrategy::Disc => "disc",
            FillStrategy::Region => "region",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disc" => Some(FillStrategy::Disc),
            "region" => Some(FillStrategy::Region),
            _ => None,
        }
    }
}

/// Brush state frozen for the duration of one stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushContext {
    kind: BrushKind,
    intensity: f32,
    color: [u8; 3],
    size: f32,
}

impl BrushContext {
    pub const MIN_SIZE: f32 = 0.5;

    /// Intensity is clamped to `[0, 1]`, size to at least 0.5.
    pub fn new(kind: BrushKind, intensity: f32, color: [u8; 3], size: f32) -> Self {
        let intensity = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };
        let size = if size.is_nan() { Self::MIN_SIZE } else { size.max(Self::MIN_SIZE) };
        Self {
            kind,
            intensity,
            color,
            size,
        }
    }

    pub fn kind(&self) -> BrushKind {
        self.kind
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn with_intensity(self, intensity: f32) -> Self {
        Self::new(self.kind, intensity, self.color, self.size)
    }
}

/// Live tool settings edited by the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolProperties {
    pub brush: BrushKind,
    pub intensity: f32,
    pub size: f32,
    pub color: Color32,
    pub mode: DrawMode,
    pub fill_strategy: FillStrategy,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            brush: BrushKind::Standard,
            intensity: 0.5,
            size: 5.0,
            color: Color32::BLACK,
            mode: DrawMode::Draw,
            fill_strategy: FillStrategy::Disc,
        }
    }
}

impl ToolProperties {
    pub fn context(&self) -> BrushContext {
        BrushContext::new(
            self.brush,
            self.intensity,
            [self.color.r(), self.color.g(), self.color.b()],
            self.size,
        )
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.color.r(), self.color.g(), self.color.b()]
    }

    pub fn set_rgb(&mut self, rgb: [u8; 3]) {
        self.color = Color32::from_rgb(rgb[0], rgb[1], rgb[2]);
    }

    /// Brush and fill controls for the side panel.
    pub fn show(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for mode in DrawMode::all() {
                ui.selectable_value(&mut self.mode, *mode, mode.label());
            }
        });
        ui.separator();

        egui::ComboBox::from_label("Brush")
            .selected_text(self.brush.label())
            .show_ui(ui, |ui| {
                for kind in BrushKind::all() {
                    ui.selectable_value(&mut self.brush, *kind, kind.label());
                }
            });

        ui.add(egui::Slider::new(&mut self.intensity, 0.0..=1.0).text("Intensity"));
        ui.add(egui::Slider::new(&mut self.size, BrushContext::MIN_SIZE..=100.0).text("Size"));

        ui.horizontal(|ui| {
            ui.label("Color");
            egui::color_picker::color_edit_button_srgba(
                ui,
                &mut self.color,
                egui::color_picker::Alpha::Opaque,
            );
        });

        if self.mode == DrawMode::Fill {
            ui.horizontal(|ui| {
                ui.label("Fill");
                ui.selectable_value(&mut self.fill_strategy, FillStrategy::Disc, FillStrategy::Disc.label());
                ui.selectable_value(&mut self.fill_strategy, FillStrategy::Region, FillStrategy::Region.label());
            });
        }
    }
}

// ============================================================================
// STROKE TRACKING
// ============================================================================

/// Tracks stroke state for undo/redo integration
#[derive(Default)]
pub struct StrokeTracker {
    /// Whether a stroke is currently in progress
    pub is_active: bool,
    /// Accumulated bounding rect of all modifications in this stroke
    pub bounds: Option<Rect>,
    /// Surface pixels at stroke start
    pub snapshot: Option<RgbaImage>,
    /// e.g. "Texture Stroke", "Erase"
    pub description: String,
}

impl StrokeTracker {
    pub fn start(&mut self, description: &str, surface: &RasterSurface) {
        self.is_active = true;
        self.bounds = None;
        self.snapshot = Some(surface.pixels().clone());
        self.description = description.to_string();
    }

    pub fn expand_bounds(&mut self, rect: Rect) {
        self.bounds = Some(match self.bounds {
            Some(existing) => existing.union(rect),
            None => rect,
        });
    }

    /// "Before" pixels for `bounds`, from the stroke-start snapshot.
    pub fn get_before_patch(&self, bounds: Rect) -> Option<PixelPatch> {
        // Padding covers anti-aliasing outside the tracked coverage rect
        let padded = bounds.expand(2.0);
        self.snapshot
            .as_ref()
            .map(|snapshot| PixelPatch::from_image(snapshot, padded))
    }

    pub fn finish(&mut self, surface: &RasterSurface) -> Option<StrokeEvent> {
        if !self.is_active {
            return None;
        }

        let event = self.bounds.and_then(|bounds| {
            let before_patch = self.get_before_patch(bounds)?;
            let after_patch = PixelPatch::capture(surface, before_patch.rect);
            Some(StrokeEvent {
                bounds,
                before_patch,
                after_patch,
                description: self.description.clone(),
                probes: Vec::new(),
            })
        });

        self.cancel();
        event
    }

    pub fn cancel(&mut self) {
        self.is_active = false;
        self.bounds = None;
        self.snapshot = None;
        self.description.clear();
    }
}

/// Event emitted when a stroke completes
pub struct StrokeEvent {
    pub bounds: Rect,
    pub before_patch: PixelPatch,
    pub after_patch: PixelPatch,
    pub description: String,
    /// Guided-coloring samples, empty for other brushes.
    pub probes: Vec<GuideProbe>,
}

// ============================================================================
// STROKE RENDERER
// ============================================================================

struct ActiveStroke {
    context: BrushContext,
    mode: DrawMode,
    last_pos: Pos2,
    probes: Vec<GuideProbe>,
}

/// Turns pointer gestures into brush calls, one segment per move.
#[derive(Default)]
pub struct StrokeRenderer {
    active: Option<ActiveStroke>,
    tracker: StrokeTracker,
}

impl StrokeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn last_position(&self) -> Option<Pos2> {
        self.active.as_ref().map(|a| a.last_pos)
    }

    /// Begin a stroke. Draws nothing; fill mode never starts a stroke.
    ///
    /// Refused while another stroke is active: its pixels are already on the
    /// surface and only `pointer_up`/`pointer_leave` can hand them to history.
    pub fn pointer_down(
        &mut self,
        surface: &RasterSurface,
        pos: Pos2,
        context: BrushContext,
        mode: DrawMode,
    ) -> bool {
        if mode == DrawMode::Fill {
            return false;
        }
        if self.active.is_some() {
            log::debug!("pointer down at {:?} ignored: stroke still active", pos);
            return false;
        }
        let description = match mode {
            DrawMode::Erase => "Erase".to_string(),
            _ => format!("{} Stroke", context.kind().label()),
        };
        self.tracker.start(&description, surface);
        self.active = Some(ActiveStroke {
            context,
            mode,
            last_pos: pos,
            probes: Vec::new(),
        });
        true
    }

    /// Render the segment from the last position to `pos`.
    /// Returns the touched rectangle; `None` when no stroke is active.
    pub fn pointer_move<R: Rng + ?Sized>(
        &mut self,
        surface: &mut RasterSurface,
        pos: Pos2,
        rng: &mut R,
    ) -> Option<Rect> {
        let active = self.active.as_mut()?;
        let start = active.last_pos;
        let ctx = active.context;

        let touched = match active.mode {
            DrawMode::Erase => surface.stroke_segment(
                start,
                pos,
                ctx.size(),
                [0, 0, 0],
                1.0,
                Composite::DestinationOut,
            ),
            _ => {
                let out = brushes::apply_brush(
                    surface,
                    start,
                    pos,
                    &ctx,
                    self.tracker.snapshot.as_ref(),
                    rng,
                );
                active.probes.extend(out.probes);
                out.bounds
            }
        };

        active.last_pos = pos;
        if let Some(rect) = touched {
            self.tracker.expand_bounds(rect);
        }
        touched
    }

    /// End the stroke. `None` when nothing was drawn.
    pub fn pointer_up(&mut self, surface: &RasterSurface) -> Option<StrokeEvent> {
        let active = self.active.take()?;
        let mut event = self.tracker.finish(surface)?;
        event.probes = active.probes;
        Some(event)
    }

    /// Leaving the surface ends the stroke exactly like releasing the button.
    pub fn pointer_leave(&mut self, surface: &RasterSurface) -> Option<StrokeEvent> {
        self.pointer_up(surface)
    }

    pub fn cancel(&mut self) {
        self.active = None;
        self.tracker.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{TRANSPARENT, WHITE};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn context_clamps_inputs() {
        let c = BrushContext::new(BrushKind::Blend, 3.0, [0, 0, 0], 0.1);
        assert_eq!(c.intensity(), 1.0);
        assert_eq!(c.size(), 0.5);
        let c = BrushContext::new(BrushKind::Blend, -1.0, [0, 0, 0], f32::NAN);
        assert_eq!(c.intensity(), 0.0);
        assert_eq!(c.size(), 0.5);
    }

    #[test]
    fn brush_keys_parse_back() {
        for kind in BrushKind::all() {
            assert_eq!(BrushKind::from_key(kind.key()), Some(*kind));
        }
        assert_eq!(BrushKind::from_key("Smart_Color"), Some(BrushKind::SmartColor));
        assert_eq!(BrushKind::from_key("crayon"), None);
    }

    #[test]
    fn moves_without_pointer_down_draw_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut surface = RasterSurface::new(32, 32);
        let mut renderer = StrokeRenderer::new();
        assert!(renderer.pointer_move(&mut surface, Pos2::new(5.0, 5.0), &mut rng).is_none());
        assert!(surface.pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn down_then_up_without_move_yields_no_event() {
        let surface = RasterSurface::new(32, 32);
        let mut renderer = StrokeRenderer::new();
        let ctx = ToolProperties::default().context();
        assert!(renderer.pointer_down(&surface, Pos2::new(5.0, 5.0), ctx, DrawMode::Draw));
        assert!(renderer.pointer_up(&surface).is_none());
        assert!(!renderer.is_active());
        assert!(surface.pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn erase_leaves_path_transparent_and_patches_restore() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut surface = RasterSurface::new(32, 32);
        let ctx = BrushContext::new(BrushKind::Standard, 1.0, [0, 0, 0], 4.0);
        let mut renderer = StrokeRenderer::new();
        renderer.pointer_down(&surface, Pos2::new(4.0, 16.0), ctx, DrawMode::Erase);
        renderer.pointer_move(&mut surface, Pos2::new(28.0, 16.0), &mut rng);
        let event = renderer.pointer_leave(&surface).unwrap();
        assert_eq!(event.description, "Erase");
        assert_eq!(surface.pixel(16, 15), Some(TRANSPARENT));

        event.before_patch.apply(&mut surface);
        assert_eq!(surface.pixel(16, 15), Some(WHITE));
    }

    #[test]
    fn context_is_frozen_at_pointer_down() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut surface = RasterSurface::new(32, 32);
        let mut props = ToolProperties::default();
        let mut renderer = StrokeRenderer::new();
        renderer.pointer_down(&surface, Pos2::new(4.0, 16.0), props.context(), DrawMode::Draw);
        props.set_rgb([255, 0, 0]);
        renderer.pointer_move(&mut surface, Pos2::new(28.0, 16.0), &mut rng);
        assert_eq!(surface.pixel(16, 16).map(|p| p[0]), Some(0));
    }

    #[test]
    fn second_pointer_down_keeps_the_active_stroke() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut surface = RasterSurface::new(40, 40);
        let ctx = ToolProperties::default().context();
        let mut renderer = StrokeRenderer::new();
        assert!(renderer.pointer_down(&surface, Pos2::new(4.0, 10.0), ctx, DrawMode::Draw));
        renderer.pointer_move(&mut surface, Pos2::new(36.0, 10.0), &mut rng);

        assert!(!renderer.pointer_down(&surface, Pos2::new(4.0, 30.0), ctx, DrawMode::Draw));
        assert_eq!(renderer.last_position(), Some(Pos2::new(36.0, 10.0)));

        // The first stroke's before-patch survives, so it can still be undone
        let event = renderer.pointer_up(&surface).unwrap();
        event.before_patch.apply(&mut surface);
        assert!(surface.pixels().pixels().all(|p| *p == WHITE));
    }
}
