use eframe::egui;
use egui::Rect;
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;

use crate::canvas::{RasterSurface, SurfaceSnapshot};

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// Trait for undoable/redoable commands.
pub trait Command: Send + Sync {
    fn undo(&self, surface: &mut RasterSurface);
    fn redo(&self, surface: &mut RasterSurface);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;
}

// ============================================================================
// BRUSH COMMAND - Patch-based undo for strokes
// ============================================================================

/// A rectangular patch of pixel data for efficient undo/redo.
#[derive(Clone)]
pub struct PixelPatch {
    pub rect: Rect,
    pub pixels: Vec<Rgba<u8>>,
    pub width: u32,
    pub height: u32,
}

impl PixelPatch {
    pub fn capture(surface: &RasterSurface, rect: Rect) -> Self {
        Self::from_image(surface.pixels(), rect)
    }

    pub fn from_image(image: &RgbaImage, rect: Rect) -> Self {
        let (img_w, img_h) = image.dimensions();
        // Clamp rect to image bounds
        let min_x = (rect.min.x.floor().max(0.0) as u32).min(img_w);
        let min_y = (rect.min.y.floor().max(0.0) as u32).min(img_h);
        let max_x = (rect.max.x.ceil().max(0.0) as u32).min(img_w);
        let max_y = (rect.max.y.ceil().max(0.0) as u32).min(img_h);

        let width = max_x.saturating_sub(min_x);
        let height = max_y.saturating_sub(min_y);

        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in min_y..max_y {
            for x in min_x..max_x {
                pixels.push(*image.get_pixel(x, y));
            }
        }

        Self {
            rect: Rect::from_min_max(
                egui::pos2(min_x as f32, min_y as f32),
                egui::pos2(max_x as f32, max_y as f32),
            ),
            pixels,
            width,
            height,
        }
    }

    pub fn apply(&self, surface: &mut RasterSurface) {
        let min_x = self.rect.min.x as u32;
        let min_y = self.rect.min.y as u32;

        let mut idx = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(p) = self.pixels.get(idx) {
                    surface.put_pixel(min_x + x, min_y + y, *p);
                }
                idx += 1;
            }
        }

        surface.mark_dirty(Some(self.rect));
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.len() * 4
    }
}

pub struct BrushCommand {
    description: String,
    before_patch: PixelPatch,
    after_patch: PixelPatch,
}

impl BrushCommand {
    pub fn new(description: String, before_patch: PixelPatch, after_patch: PixelPatch) -> Self {
        Self {
            description,
            before_patch,
            after_patch,
        }
    }
}

impl Command for BrushCommand {
    fn undo(&self, surface: &mut RasterSurface) {
        self.before_patch.apply(surface);
    }

    fn redo(&self, surface: &mut RasterSurface) {
        self.after_patch.apply(surface);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.before_patch.memory_size() + self.after_patch.memory_size()
    }
}

// ============================================================================
// SNAPSHOT COMMAND — full-surface undo for fills and auto-color
// ============================================================================

/// Stores a complete surface copy for undo/redo of whole-buffer operations.
pub struct SnapshotCommand {
    description: String,
    before: SurfaceSnapshot,
    after: Option<SurfaceSnapshot>,
}

impl SnapshotCommand {
    /// Create a snapshot command. Call BEFORE performing the operation.
    /// After the operation, call `set_after()`.
    pub fn new(description: String, surface: &RasterSurface) -> Self {
        Self {
            description,
            before: surface.snapshot(),
            after: None,
        }
    }

    /// Capture the "after" state. Call this AFTER the operation completes.
    pub fn set_after(&mut self, surface: &RasterSurface) {
        self.after = Some(surface.snapshot());
    }
}

impl Command for SnapshotCommand {
    fn undo(&self, surface: &mut RasterSurface) {
        surface.restore(&self.before);
    }

    fn redo(&self, surface: &mut RasterSurface) {
        if let Some(ref after) = self.after {
            surface.restore(after);
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.before.memory_bytes() + self.after.as_ref().map_or(0, |a| a.memory_bytes())
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with memory limits
// ============================================================================

pub const DEFAULT_MAX_HISTORY: usize = 50;
pub const DEFAULT_MAX_MEMORY_MB: usize = 100;

/// Undo/redo history manager with memory limits.
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            max_memory_bytes: Some(DEFAULT_MAX_MEMORY_MB * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Change the memory cap; `None` disables it.
    pub fn set_memory_limit(&mut self, max_bytes: Option<usize>) {
        self.max_memory_bytes = max_bytes;
        self.prune();
    }

    pub fn set_max_history_size(&mut self, max: usize) {
        self.max_history_size = max.max(1);
        self.prune();
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        // A new action invalidates everything that was undone
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        log::debug!("history: push '{}' ({} bytes)", command.description(), command.memory_size());
        self.undo_stack.push_back(command);

        self.prune();
    }

    pub fn undo(&mut self, surface: &mut RasterSurface) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(surface);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, surface: &mut RasterSurface) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.redo(surface);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Undo to position `index` in `undo_history()` (0 = most recent).
    /// Returns how many steps were actually undone.
    pub fn undo_to(&mut self, index: usize, surface: &mut RasterSurface) -> usize {
        let mut undone = 0;
        for _ in 0..index {
            if self.undo(surface).is_none() {
                break;
            }
            undone += 1;
        }
        undone
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

// ============================================================================
// HISTORY PANEL - UI for displaying history
// ============================================================================

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
}

impl HistoryPanel {
    /// Lists the undo stack; clicking an older entry asks for `undo_to`.
    /// Returns the requested index, the caller performs the revert.
    pub fn show(&mut self, ui: &mut egui::Ui, history: &HistoryManager) -> Option<usize> {
        ui.horizontal(|ui| {
            ui.label(format!("Undo: {} | Redo: {}", history.undo_count(), history.redo_count()));
            if ui.small_button("ℹ").on_hover_text("Show memory info").clicked() {
                self.show_memory_info = !self.show_memory_info;
            }
        });

        if self.show_memory_info {
            let mem_mb = history.memory_usage() as f64 / (1024.0 * 1024.0);
            ui.label(format!("Memory: {:.2} MB", mem_mb));
        }

        let mut revert_to = None;
        egui::ScrollArea::vertical()
            .max_height(180.0)
            .show(ui, |ui| {
                let items = history.undo_history();
                if items.is_empty() {
                    ui.weak("No history yet");
                    return;
                }
                for (i, desc) in items.iter().enumerate() {
                    let text = if i == 0 {
                        egui::RichText::new(format!("▶ {}", desc)).strong()
                    } else {
                        egui::RichText::new(format!("  {}", desc)).weak()
                    };
                    let response = ui.add(egui::Label::new(text).sense(egui::Sense::click()));
                    if i > 0 {
                        if response.clicked() {
                            revert_to = Some(i);
                        }
                        response.on_hover_text("Click to revert to this state");
                    }
                }
            });
        revert_to
    }
}
