use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use coloringfe::components::history::HistoryPanel;
use coloringfe::components::tools::DrawMode;
use coloringfe::io::{self, FileHandler, SaveFormat};
use coloringfe::settings::StudioSettings;
use coloringfe::{ColoringSession, RasterSurface};

/// The desktop coloring studio: tool panel on the left, page in the middle.
pub struct ColoringApp {
    session: ColoringSession,
    settings: StudioSettings,
    file_handler: FileHandler,
    history_panel: HistoryPanel,
    texture: Option<TextureHandle>,
    /// Last message from the session observer or a file operation.
    status: Rc<RefCell<String>>,
}

impl ColoringApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = StudioSettings::load();
        let mut app = Self {
            session: Self::blank_session(&settings),
            settings,
            file_handler: FileHandler::new(),
            history_panel: HistoryPanel::default(),
            texture: None,
            status: Rc::new(RefCell::new(String::from("Ready"))),
        };
        app.attach_observer();
        log::info!(
            "studio started with a {}x{} page",
            app.settings.canvas_width,
            app.settings.canvas_height
        );
        app
    }

    fn blank_session(settings: &StudioSettings) -> ColoringSession {
        let mut session = ColoringSession::new(settings.canvas_width, settings.canvas_height)
            .with_history(settings.history_manager());
        session.tools = settings.tool_properties();
        session
    }

    fn attach_observer(&mut self) {
        let status = Rc::clone(&self.status);
        self.session.set_draw_completed(move |_, description| {
            *status.borrow_mut() = description.to_string();
        });
    }

    fn set_status(&self, message: impl Into<String>) {
        *self.status.borrow_mut() = message.into();
    }

    // ========================================================================
    // FILE ACTIONS
    // ========================================================================

    fn open_file(&mut self) {
        let Some(path) = self.file_handler.pick_open_path() else { return };
        self.open_path(path);
    }

    fn open_path(&mut self, path: PathBuf) {
        let loaded = if SaveFormat::from_path(&path) == Some(SaveFormat::Cfe) {
            io::load_cfe(&path).map(|(surface, tools)| (surface, Some(tools)))
        } else {
            io::load_template(&path, self.settings.canvas_width, self.settings.canvas_height)
                .map(|surface| (surface, None))
        };

        match loaded {
            Ok((surface, tools)) => {
                self.session.replace_surface(surface);
                if let Some(tools) = tools {
                    self.session.tools = tools;
                }
                self.session.path = Some(path.clone());
                self.session.update_name_from_path();
                self.session.mark_clean();
                self.texture = None;
                self.set_status(format!("Opened {}", path.display()));
            }
            Err(e) => {
                log::error!("open {}: {}", path.display(), e);
                self.set_status(format!("Could not open {}: {}", path.display(), e));
            }
        }
    }

    fn save_file(&mut self) {
        let stem = self
            .session
            .name
            .rsplit_once('.')
            .map(|(s, _)| s.to_string())
            .unwrap_or_else(|| self.session.name.clone());
        let Some(path) = self.file_handler.pick_save_path(&stem) else { return };

        let result = io::save_any(
            self.session.surface(),
            &self.session.tools,
            &path,
            self.file_handler.last_quality,
        );
        match result {
            Ok(()) => {
                self.session.path = Some(path.clone());
                self.session.update_name_from_path();
                self.session.mark_clean();
                self.set_status(format!("Saved {}", path.display()));
            }
            Err(e) => {
                log::error!("save {}: {}", path.display(), e);
                self.set_status(format!("Could not save {}: {}", path.display(), e));
            }
        }
    }

    fn new_page(&mut self) {
        self.settings.remember_tools(&self.session.tools);
        self.session = Self::blank_session(&self.settings);
        self.attach_observer();
        self.texture = None;
        self.set_status("New page");
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn tool_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("ColoringFE");
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.new_page();
            }
            if ui.button("Open…").clicked() {
                self.open_file();
            }
            if ui.button("Save…").clicked() {
                self.save_file();
            }
        });
        ui.separator();

        self.session.tools.show(ui);
        ui.separator();

        if ui.button("✨ Auto Color").clicked() {
            let report = self.session.auto_color();
            if report.is_empty() {
                self.set_status("Auto Color found no closed regions");
            }
        }
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.session.history.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.session.undo();
            }
            if ui
                .add_enabled(self.session.history.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.session.redo();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
            }
        });
        ui.separator();

        ui.label("History");
        if let Some(index) = self.history_panel.show(ui, &self.session.history) {
            self.session.undo_to(index);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let surface = self.session.surface();
        let surface_size = Vec2::new(surface.width() as f32, surface.height() as f32);
        let available = ui.available_size();
        let scale = (available.x / surface_size.x)
            .min(available.y / surface_size.y)
            .min(1.0)
            .max(0.05);
        let display = surface_size * scale;

        // Center the page in the panel
        let origin = ui.max_rect().center() - display * 0.5;
        let rect = Rect::from_min_size(origin, display);
        let response = ui.allocate_rect(rect, Sense::click_and_drag());

        self.sync_texture(ui.ctx());

        let painter = ui.painter_at(ui.max_rect());
        painter.rect_filled(rect.expand(2.0), 2.0, Color32::from_gray(60));
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        let to_surface = |p: Pos2| Pos2::new((p.x - rect.min.x) / scale, (p.y - rect.min.y) / scale);

        if self.session.tools.mode == DrawMode::Fill {
            if response.clicked()
                && let Some(p) = response.interact_pointer_pos()
                && !self.session.click(to_surface(p))
            {
                self.set_status("Nothing to fill there");
            }
            return;
        }

        // drag_started fires past egui's drag threshold; start where the button went down
        if response.drag_started()
            && let Some(p) = ui
                .input(|i| i.pointer.press_origin())
                .or_else(|| response.interact_pointer_pos())
        {
            self.session.pointer_down(to_surface(p));
        }

        if self.session.is_stroke_active() {
            let latest = ui.ctx().input(|i| i.pointer.latest_pos());
            match latest {
                Some(p) if rect.contains(p) => {
                    if response.dragged() {
                        self.session.pointer_move(to_surface(p));
                    }
                }
                _ => {
                    self.session.pointer_leave();
                }
            }
        }

        if response.drag_released() {
            self.session.pointer_up();
        }

        if let Some(hover) = response.hover_pos() {
            let radius = self.session.tools.size * scale;
            painter.circle_stroke(hover, radius, egui::Stroke::new(1.0, Color32::from_gray(120)));
        }
    }

    /// Re-upload the page texture when the session reports a dirty region.
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let dirty = self.session.take_dirty_rect().is_some();
        match &mut self.texture {
            Some(texture) if dirty => {
                texture.set(self.session.surface().to_color_image(), TextureOptions::LINEAR);
            }
            Some(_) => {}
            None => {
                self.texture = Some(ctx.load_texture(
                    "coloring_page",
                    self.session.surface().to_color_image(),
                    TextureOptions::LINEAR,
                ));
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let undo = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z));
        let redo = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y));
        let open = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::O));
        let save = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S));
        if undo {
            self.session.undo();
        }
        if redo {
            self.session.redo();
        }
        if open {
            self.open_file();
        }
        if save {
            self.save_file();
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if let Some(path) = dropped.into_iter().next() {
            self.open_path(path);
        }
    }
}

impl eframe::App for ColoringApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "ColoringFE - {}",
            self.session.display_title()
        )));

        if ctx.input(|i| i.viewport().close_requested()) {
            self.settings.remember_tools(&self.session.tools);
            self.settings.save();
            log::info!("studio closing");
        }

        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status.borrow().as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let surface: &RasterSurface = self.session.surface();
                    ui.weak(format!("{}×{}", surface.width(), surface.height()));
                });
            });
        });

        egui::SidePanel::left("tool_panel")
            .resizable(false)
            .default_width(240.0)
            .show(ctx, |ui| self.tool_panel(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: Color32::from_gray(40),
                ..Default::default()
            })
            .show(ctx, |ui| self.canvas(ui));
    }
}
