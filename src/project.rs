use eframe::egui;
use egui::{Pos2, Rect};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::RasterSurface;
use crate::components::history::{BrushCommand, HistoryManager, SnapshotCommand};
use crate::components::tools::{StrokeRenderer, ToolProperties};
use crate::ops::auto_color::{self, AutoColorReport};
use crate::ops::brushes::GuideProbe;
use crate::ops::fill;

/// Observer invoked after every completed stroke, fill, auto-color, undo and redo.
pub type DrawCompleted = Box<dyn FnMut(&RasterSurface, &str)>;

/// One coloring page being worked on.
pub struct ColoringSession {
    pub id: Uuid,
    surface: RasterSurface,
    pub history: HistoryManager,
    pub tools: ToolProperties,
    renderer: StrokeRenderer,
    rng: StdRng,
    on_draw_completed: Option<DrawCompleted>,
    last_probes: Vec<GuideProbe>,
    /// `None` until saved or opened from disk.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
    pub name: String,
}

impl ColoringSession {
    /// Blank white page.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_surface(RasterSurface::new(width, height), "Untitled")
    }

    /// Page with `template` scaled to fit and centered.
    pub fn from_template(template: &RgbaImage, width: u32, height: u32) -> Self {
        let mut surface = RasterSurface::new(width, height);
        surface.draw_template(template);
        Self::from_surface(surface, "Untitled")
    }

    pub fn from_surface(surface: RasterSurface, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface,
            history: HistoryManager::default(),
            tools: ToolProperties::default(),
            renderer: StrokeRenderer::new(),
            rng: StdRng::from_entropy(),
            on_draw_completed: None,
            last_probes: Vec::new(),
            path: None,
            is_dirty: false,
            name: name.to_string(),
        }
    }

    /// Make brush jitter and auto-color palette picks reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_history(mut self, history: HistoryManager) -> Self {
        self.history = history;
        self
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    /// Host-side access for texture upload bookkeeping.
    pub fn take_dirty_rect(&mut self) -> Option<Rect> {
        self.surface.take_dirty_rect()
    }

    pub fn set_draw_completed(&mut self, callback: impl FnMut(&RasterSurface, &str) + 'static) {
        self.on_draw_completed = Some(Box::new(callback));
    }

    pub fn clear_draw_completed(&mut self) {
        self.on_draw_completed = None;
    }

    pub fn is_stroke_active(&self) -> bool {
        self.renderer.is_active()
    }

    /// Guided-coloring probes of the last finished stroke.
    pub fn last_probes(&self) -> &[GuideProbe] {
        &self.last_probes
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    /// Start a stroke with the current tool settings. Returns false in fill mode.
    /// A stroke that never saw its pointer-up is committed first.
    pub fn pointer_down(&mut self, pos: Pos2) -> bool {
        self.finish_active_stroke();
        self.renderer
            .pointer_down(&self.surface, pos, self.tools.context(), self.tools.mode)
    }

    pub fn pointer_move(&mut self, pos: Pos2) -> Option<Rect> {
        self.renderer.pointer_move(&mut self.surface, pos, &mut self.rng)
    }

    /// Finish the stroke. Returns true when a history entry was recorded.
    pub fn pointer_up(&mut self) -> bool {
        let event = self.renderer.pointer_up(&self.surface);
        self.commit_stroke(event)
    }

    pub fn pointer_leave(&mut self) -> bool {
        let event = self.renderer.pointer_leave(&self.surface);
        self.commit_stroke(event)
    }

    /// Record whatever the active stroke has painted so far.
    fn finish_active_stroke(&mut self) {
        if self.renderer.is_active() {
            let event = self.renderer.pointer_up(&self.surface);
            self.commit_stroke(event);
        }
    }

    fn commit_stroke(&mut self, event: Option<crate::components::tools::StrokeEvent>) -> bool {
        let Some(event) = event else { return false };
        self.last_probes = event.probes;
        let description = event.description.clone();
        self.history.push(Box::new(BrushCommand::new(
            event.description,
            event.before_patch,
            event.after_patch,
        )));
        self.finish_action(&description);
        true
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Fill at `pos` with the current tool settings. Returns true if anything changed.
    pub fn click(&mut self, pos: Pos2) -> bool {
        let mut cmd = SnapshotCommand::new("Fill".to_string(), &self.surface);
        let ctx = self.tools.context();
        if fill::fill_at(&mut self.surface, pos, &ctx, self.tools.fill_strategy).is_none() {
            return false;
        }
        cmd.set_after(&self.surface);
        self.history.push(Box::new(cmd));
        self.finish_action("Fill");
        true
    }

    pub fn auto_color(&mut self) -> AutoColorReport {
        let mut cmd = SnapshotCommand::new("Auto Color".to_string(), &self.surface);
        let report = auto_color::auto_color(&mut self.surface, &mut self.rng);
        if !report.is_empty() {
            cmd.set_after(&self.surface);
            self.history.push(Box::new(cmd));
            self.finish_action("Auto Color");
        }
        report
    }

    /// Reset to white, keeping the reset undoable.
    pub fn clear(&mut self) {
        self.finish_active_stroke();
        let mut cmd = SnapshotCommand::new("Clear".to_string(), &self.surface);
        self.surface.clear();
        cmd.set_after(&self.surface);
        self.history.push(Box::new(cmd));
        self.finish_action("Clear");
    }

    pub fn undo(&mut self) -> Option<String> {
        self.finish_active_stroke();
        let description = self.history.undo(&mut self.surface)?;
        self.finish_action(&format!("Undo {}", description));
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.finish_active_stroke();
        let description = self.history.redo(&mut self.surface)?;
        self.finish_action(&format!("Redo {}", description));
        Some(description)
    }

    /// Undo `index` steps at once ("restore to entry N" in the history list).
    pub fn undo_to(&mut self, index: usize) -> usize {
        self.finish_active_stroke();
        let undone = self.history.undo_to(index, &mut self.surface);
        if undone > 0 {
            self.finish_action(&format!("Undo {} steps", undone));
        }
        undone
    }

    /// Swap in a loaded surface, dropping history.
    pub fn replace_surface(&mut self, surface: RasterSurface) {
        self.renderer.cancel();
        self.surface = surface;
        self.surface.mark_dirty(None);
        self.history.clear();
        self.last_probes.clear();
    }

    fn finish_action(&mut self, description: &str) {
        self.is_dirty = true;
        log::debug!("session {}: {}", self.id, description);
        if let Some(callback) = self.on_draw_completed.as_mut() {
            callback(&self.surface, description);
        }
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Name with dirty indicator
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WHITE;
    use crate::components::tools::DrawMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn observer_sees_every_completed_action() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut session = ColoringSession::new(40, 40).with_seed(9);
        session.set_draw_completed(move |_, desc| sink.borrow_mut().push(desc.to_string()));

        session.pointer_down(Pos2::new(5.0, 5.0));
        session.pointer_move(Pos2::new(30.0, 5.0));
        session.pointer_up();
        session.tools.mode = DrawMode::Fill;
        session.click(Pos2::new(20.0, 20.0));
        session.undo();

        assert_eq!(
            *seen.borrow(),
            vec!["Standard Stroke".to_string(), "Fill".to_string(), "Undo Fill".to_string()]
        );
        assert!(session.is_dirty);
        assert_eq!(session.display_title(), "Untitled*");
    }

    #[test]
    fn fill_mode_pointer_down_does_not_start_stroke() {
        let mut session = ColoringSession::new(20, 20);
        session.tools.mode = DrawMode::Fill;
        assert!(!session.pointer_down(Pos2::new(5.0, 5.0)));
        assert!(session.pointer_move(Pos2::new(15.0, 5.0)).is_none());
        assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn auto_color_on_all_dark_page_records_nothing() {
        let img = RgbaImage::from_pixel(20, 20, image::Rgba([0, 0, 0, 255]));
        let mut session = ColoringSession::from_surface(RasterSurface::from_rgba_image(img), "dark");
        assert!(session.auto_color().is_empty());
        assert!(!session.history.can_undo());
        assert!(!session.is_dirty);
    }

    #[test]
    fn clear_is_undoable() {
        let mut session = ColoringSession::new(20, 20);
        session.pointer_down(Pos2::new(2.0, 10.0));
        session.pointer_move(Pos2::new(18.0, 10.0));
        session.pointer_up();
        let painted = session.surface().pixels().clone();
        session.clear();
        assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
        session.undo();
        assert_eq!(session.surface().pixels(), &painted);
    }

    fn drag(session: &mut ColoringSession, from: (f32, f32), to: (f32, f32)) {
        session.pointer_down(Pos2::new(from.0, from.1));
        session.pointer_move(Pos2::new(to.0, to.1));
    }

    #[test]
    fn undo_mid_stroke_commits_then_undoes_it() {
        let mut session = ColoringSession::new(40, 40);
        drag(&mut session, (4.0, 30.0), (36.0, 30.0));
        session.pointer_up();
        drag(&mut session, (4.0, 10.0), (36.0, 10.0));

        assert_eq!(session.undo().as_deref(), Some("Standard Stroke"));
        assert!(!session.pointer_up());
        assert_eq!(session.history.undo_count(), 1);
        assert_eq!(session.surface().pixel(20, 10), Some(WHITE));

        session.undo();
        assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn clear_mid_stroke_keeps_the_stroke_undoable() {
        let mut session = ColoringSession::new(40, 40);
        drag(&mut session, (4.0, 10.0), (36.0, 10.0));
        session.clear();
        assert_eq!(session.history.undo_history(), vec!["Clear", "Standard Stroke"]);
        session.undo();
        session.undo();
        assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn pointer_down_without_up_commits_the_previous_stroke() {
        let mut session = ColoringSession::new(40, 40);
        drag(&mut session, (4.0, 10.0), (36.0, 10.0));
        drag(&mut session, (4.0, 30.0), (36.0, 30.0));
        assert!(session.pointer_up());
        assert_eq!(session.history.undo_count(), 2);

        session.undo();
        assert_eq!(session.surface().pixel(20, 30), Some(WHITE));
        assert_ne!(session.surface().pixel(20, 10), Some(WHITE));
        session.undo();
        assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
    }
}
