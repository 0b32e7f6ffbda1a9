use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc;

use crate::assets::{AppSettings, Assets};
use crate::components::controls::ControlsPanel;
use crate::components::history::HistoryPanel;
use crate::components::palette::PalettePanel;
use crate::io::{self, ExportFormat};
use crate::ops::placement::{self, ControlValues};
use crate::ops::{clipboard, compose};
use crate::project::Project;
use crate::surface::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH, SurfaceView};

// ============================================================================
// ASYNC EXPORT PIPELINE — background rendering with channel completion
// ============================================================================

/// Result delivered from a background export thread.
pub enum ExportResult {
    Done(PathBuf),
    Failed(String),
}

/// Destructive action awaiting a discard confirmation.
#[derive(Clone, Copy, PartialEq)]
enum PendingAction {
    NewProject,
    OpenProject,
}

// Keyboard shortcuts (Cmd on macOS, Ctrl elsewhere).
const SHORTCUT_NEW: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::N);
const SHORTCUT_OPEN: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::O);
const SHORTCUT_SAVE: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S);
const SHORTCUT_EXPORT: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::E);
const SHORTCUT_UNDO: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Z);
const SHORTCUT_REDO: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Y);

pub struct StickerFEApp {
    project: Project,
    untitled_counter: usize,

    // UI components
    surface_view: SurfaceView,
    palette_panel: PalettePanel,
    controls_panel: ControlsPanel,
    history_panel: HistoryPanel,
    show_history: bool,
    show_settings: bool,

    // Assets & Settings
    assets: Assets,
    settings: AppSettings,

    // Status line + background export
    status: Option<String>,
    export_tx: mpsc::Sender<ExportResult>,
    export_rx: mpsc::Receiver<ExportResult>,
    export_in_flight: bool,

    // Discard-confirmation dialog state
    pending_confirm: Option<PendingAction>,
}

impl StickerFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        cc.egui_ctx.set_visuals(if settings.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        let (export_tx, export_rx) = mpsc::channel();
        let untitled_counter = 1;
        let project = Project::new_untitled(
            untitled_counter,
            DEFAULT_SURFACE_WIDTH,
            DEFAULT_SURFACE_HEIGHT,
            settings.max_undo_steps,
        );

        crate::log_info!("Started with project {}", project.name);

        Self {
            project,
            untitled_counter,
            surface_view: SurfaceView::default(),
            palette_panel: PalettePanel::default(),
            controls_panel: ControlsPanel::default(),
            history_panel: HistoryPanel::default(),
            show_history: true,
            show_settings: false,
            assets: Assets::default(),
            settings,
            status: None,
            export_tx,
            export_rx,
            export_in_flight: false,
            pending_confirm: None,
        }
    }

    // --- history ------------------------------------------------------

    fn undo(&mut self) {
        if let Some(label) = self.project.history.undo(&mut self.project.surface) {
            self.status = Some(format!("Undid: {}", label));
            self.project.mark_dirty();
            self.sync_controls();
        }
    }

    fn redo(&mut self) {
        if let Some(label) = self.project.history.redo(&mut self.project.surface) {
            self.status = Some(format!("Redid: {}", label));
            self.project.mark_dirty();
            self.sync_controls();
        }
    }

    /// Mirror the restored selection (if any) into the transform controls.
    fn sync_controls(&mut self) {
        self.controls_panel.values = match self.project.surface.selected_index() {
            Some(idx) => placement::select(&mut self.project.surface, idx),
            None => ControlValues::default(),
        };
    }

    // --- project lifecycle ---------------------------------------------

    fn request_new(&mut self) {
        if self.project.is_dirty && self.settings.confirm_discard {
            self.pending_confirm = Some(PendingAction::NewProject);
        } else {
            self.new_project();
        }
    }

    fn new_project(&mut self) {
        self.untitled_counter += 1;
        self.project = Project::new_untitled(
            self.untitled_counter,
            DEFAULT_SURFACE_WIDTH,
            DEFAULT_SURFACE_HEIGHT,
            self.settings.max_undo_steps,
        );
        self.controls_panel.values = ControlValues::default();
        self.status = Some(format!("Created {}", self.project.name));
    }

    fn request_open(&mut self) {
        if self.project.is_dirty && self.settings.confirm_discard {
            self.pending_confirm = Some(PendingAction::OpenProject);
        } else {
            self.open_project();
        }
    }

    fn open_project(&mut self) {
        let Some(path) = io::pick_project_dialog() else {
            return;
        };
        match io::load_project(&path) {
            Ok(surface) => {
                crate::log_info!("Opened {}", path.display());
                self.project = Project::from_file(path, surface, self.settings.max_undo_steps);
                self.controls_panel.values = ControlValues::default();
                self.status = Some(format!("Opened {}", self.project.name));
            }
            Err(e) => {
                crate::log_err!("Open failed: {}", e);
                self.status = Some(e);
            }
        }
    }

    fn save_project(&mut self, force_dialog: bool) {
        let path = match (&self.project.path, force_dialog) {
            (Some(path), false) => path.clone(),
            _ => match io::save_project_dialog(&self.project.name) {
                Some(path) => path,
                None => return,
            },
        };
        match io::save_project(&path, &self.project.surface) {
            Ok(()) => {
                crate::log_info!("Saved {}", path.display());
                self.project.path = Some(path);
                self.project.update_name_from_path();
                self.project.mark_clean();
                self.status = Some(format!("Saved {}", self.project.name));
            }
            Err(e) => {
                crate::log_err!("Save failed: {}", e);
                self.status = Some(e);
            }
        }
    }

    // --- export / clipboard --------------------------------------------

    /// Kick off a background export.  Rendering and encoding happen off the
    /// UI thread; completion arrives over the channel.
    fn handle_export(&mut self, ctx: &egui::Context) {
        if self.export_in_flight {
            return;
        }
        let Some(path) = io::export_dialog(&self.project.name, self.settings.last_export_dir.as_deref())
        else {
            return;
        };
        let format = ExportFormat::from_path(&path).unwrap_or_default();
        self.settings.last_export_dir = path.parent().map(|p| p.to_path_buf());
        self.settings.save();

        let surface = self.project.surface.clone();
        let mut store = self.assets.store.clone();
        let quality = self.settings.jpeg_quality;
        let tx = self.export_tx.clone();
        let ctx = ctx.clone();
        self.export_in_flight = true;
        self.status = Some(format!("Exporting {}…", path.display()));

        std::thread::spawn(move || {
            let img = compose::render(&surface, &mut store);
            let result = match io::encode_and_write(&path, &img, format, quality) {
                Ok(()) => ExportResult::Done(path),
                Err(e) => ExportResult::Failed(e),
            };
            let _ = tx.send(result);
            ctx.request_repaint();
        });
    }

    fn poll_export_results(&mut self) {
        while let Ok(result) = self.export_rx.try_recv() {
            self.export_in_flight = false;
            match result {
                ExportResult::Done(path) => {
                    crate::log_info!("Exported {}", path.display());
                    self.status = Some(format!("Exported {}", path.display()));
                }
                ExportResult::Failed(e) => {
                    crate::log_err!("Export failed: {}", e);
                    self.status = Some(format!("Export failed: {}", e));
                }
            }
        }
    }

    fn handle_copy(&mut self) {
        let img = compose::render(&self.project.surface, &mut self.assets.store);
        if clipboard::copy_to_system_clipboard(&img) {
            self.status = Some("Copied composition to clipboard".to_string());
        } else {
            self.status = Some("Clipboard copy failed".to_string());
        }
    }

    // --- input ----------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_UNDO)) {
            self.undo();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_REDO)) {
            self.redo();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_NEW)) {
            self.request_new();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_OPEN)) {
            self.request_open();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_SAVE)) {
            self.save_project(false);
        }
        if ctx.input_mut(|i| i.consume_shortcut(&SHORTCUT_EXPORT)) {
            self.handle_export(ctx);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            let project = &mut self.project;
            if project.surface.selected_index().is_some() {
                placement::delete_selected(&mut project.surface, &mut project.history);
                self.controls_panel.values = ControlValues::default();
                project.mark_dirty();
            }
        }
    }

    // --- chrome ----------------------------------------------------------

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New").clicked() {
                        self.request_new();
                        ui.close_menu();
                    }
                    if ui.button("Open…").clicked() {
                        self.request_open();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Save").clicked() {
                        self.save_project(false);
                        ui.close_menu();
                    }
                    if ui.button("Save As…").clicked() {
                        self.save_project(true);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .add_enabled(!self.export_in_flight, egui::Button::new("Export Image…"))
                        .clicked()
                    {
                        self.handle_export(ctx);
                        ui.close_menu();
                    }
                    if ui.button("Copy to Clipboard").clicked() {
                        self.handle_copy();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    let undo_label = match self.project.history.undo_description() {
                        Some(d) => format!("Undo {}", d),
                        None => "Undo".to_string(),
                    };
                    if ui
                        .add_enabled(self.project.history.can_undo(), egui::Button::new(undo_label))
                        .clicked()
                    {
                        self.undo();
                        ui.close_menu();
                    }
                    let redo_label = match self.project.history.redo_description() {
                        Some(d) => format!("Redo {}", d),
                        None => "Redo".to_string(),
                    };
                    if ui
                        .add_enabled(self.project.history.can_redo(), egui::Button::new(redo_label))
                        .clicked()
                    {
                        self.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_selection = self.project.surface.selected_index().is_some();
                    if ui
                        .add_enabled(has_selection, egui::Button::new("Delete Sticker"))
                        .clicked()
                    {
                        let project = &mut self.project;
                        placement::delete_selected(&mut project.surface, &mut project.history);
                        self.controls_panel.values = ControlValues::default();
                        project.mark_dirty();
                        ui.close_menu();
                    }
                    if ui.button("Clear All").clicked() {
                        let project = &mut self.project;
                        placement::clear_all(&mut project.surface, &mut project.history);
                        self.controls_panel.values = ControlValues::default();
                        project.mark_dirty();
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    ui.checkbox(&mut self.show_history, "History panel");
                    if ui.button("Settings…").clicked() {
                        self.show_settings = true;
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn show_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let can_undo = self.project.history.can_undo();
                let can_redo = self.project.history.can_redo();
                if ui
                    .add_enabled(can_undo, egui::Button::new("⟲ Undo"))
                    .clicked()
                {
                    self.undo();
                }
                if ui
                    .add_enabled(can_redo, egui::Button::new("⟳ Redo"))
                    .clicked()
                {
                    self.redo();
                }
                ui.separator();
                if ui
                    .add_enabled(!self.export_in_flight, egui::Button::new("💾 Export"))
                    .clicked()
                {
                    self.handle_export(ctx);
                }
                if ui.button("📋 Copy").clicked() {
                    self.handle_copy();
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(self.project.display_title());
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                } else {
                    ui.weak("Drag parts from the palette onto the canvas");
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(format!("{} stickers", self.project.surface.elements.len()));
                });
            });
        });
    }

    fn show_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(action) = self.pending_confirm else {
            return;
        };
        egui::Window::new("Unsaved changes")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(format!(
                    "\"{}\" has unsaved changes. Discard them?",
                    self.project.name
                ));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Discard").clicked() {
                        self.pending_confirm = None;
                        match action {
                            PendingAction::NewProject => self.new_project(),
                            PendingAction::OpenProject => self.open_project(),
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        self.pending_confirm = None;
                    }
                });
            });
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        if !self.show_settings {
            return;
        }
        let mut open = true;
        let before = self.settings.clone();
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.checkbox(&mut self.settings.dark_mode, "Dark mode");
                ui.horizontal(|ui| {
                    ui.label("Undo steps:");
                    ui.add(
                        egui::DragValue::new(&mut self.settings.max_undo_steps)
                            .clamp_range(1..=200),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("JPEG quality:");
                    ui.add(
                        egui::DragValue::new(&mut self.settings.jpeg_quality).clamp_range(1..=100),
                    );
                });
                ui.checkbox(
                    &mut self.settings.confirm_discard,
                    "Confirm before discarding unsaved work",
                );
            });
        self.show_settings = open;

        if self.settings != before {
            ctx.set_visuals(if self.settings.dark_mode {
                egui::Visuals::dark()
            } else {
                egui::Visuals::light()
            });
            self.project
                .history
                .set_max_history_size(self.settings.max_undo_steps);
            self.settings.save();
        }
    }
}

impl eframe::App for StickerFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_export_results();
        self.handle_shortcuts(ctx);

        self.show_menu_bar(ctx);
        self.show_toolbar(ctx);
        self.show_status_bar(ctx);

        egui::SidePanel::left("palette_panel")
            .default_width(220.0)
            .show(ctx, |ui| {
                let project = &mut self.project;
                if self.palette_panel.show(ui, &mut project.surface, &mut self.assets) {
                    project.mark_dirty();
                }
            });

        egui::SidePanel::right("inspector_panel")
            .default_width(230.0)
            .show(ctx, |ui| {
                let project = &mut self.project;
                if self
                    .controls_panel
                    .show(ui, &mut project.surface, &mut project.history)
                {
                    project.mark_dirty();
                }
                if self.show_history {
                    ui.separator();
                    ui.heading("History");
                    self.history_panel.show(ui, &project.history);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let project = &mut self.project;
            let response = self.surface_view.show(
                ui,
                &mut project.surface,
                &mut project.history,
                &mut self.assets,
            );
            if let Some(values) = response.selection_changed {
                self.controls_panel.values = values;
            }
            if response.mutated {
                project.mark_dirty();
            }
        });

        self.show_confirm_dialog(ctx);
        self.show_settings_window(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
        crate::log_info!("Session ended");
    }
}
