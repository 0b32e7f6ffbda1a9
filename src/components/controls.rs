use eframe::egui;

use crate::components::history::HistoryManager;
use crate::ops::placement::{self, ControlValues};
use crate::surface::SurfaceState;

/// Transform controls for the selected element plus the delete/clear
/// buttons.  The three inputs are read on every input event and applied
/// immediately; nothing is applied while the selection is empty.
pub struct ControlsPanel {
    pub values: ControlValues,
    /// True while an adjustment session (slider drag / focused edit) is in
    /// flight.  One history snapshot is taken per session, at its start,
    /// rather than per input tick.
    session_active: bool,
}

impl Default for ControlsPanel {
    fn default() -> Self {
        Self {
            values: ControlValues::default(),
            session_active: false,
        }
    }
}

impl ControlsPanel {
    /// Returns true when the surface was mutated.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        surface: &mut SurfaceState,
        history: &mut HistoryManager,
    ) -> bool {
        let has_selection = surface.selected_index().is_some();
        let mut mutated = false;
        let mut changed = false;
        let mut session_live = false;

        ui.add_space(4.0);
        ui.heading("Transform");
        ui.separator();

        ui.add_enabled_ui(has_selection, |ui| {
            let responses = [
                ui.add(
                    egui::Slider::new(&mut self.values.rotation, -180..=180)
                        .suffix("°")
                        .text("Rotation"),
                ),
                ui.add(egui::Slider::new(&mut self.values.scale, 0.1..=3.0).text("Scale")),
                ui.add(egui::Slider::new(&mut self.values.opacity, 0.0..=1.0).text("Opacity")),
            ];
            for r in &responses {
                changed |= r.changed();
                session_live |= r.dragged() || r.has_focus();
            }
        });

        if has_selection && changed {
            if !self.session_active {
                // The surface still holds the pre-adjustment state here.
                history.record(surface, "Adjust Sticker");
                self.session_active = true;
            }
            placement::apply_transform(surface, self.values);
            mutated = true;
        }
        if !session_live && !changed {
            self.session_active = false;
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(has_selection, egui::Button::new("🗑 Delete"))
                .clicked()
            {
                placement::delete_selected(surface, history);
                self.values = ControlValues::default();
                mutated = true;
            }
            if ui.button("✖ Clear all").clicked() {
                placement::clear_all(surface, history);
                self.values = ControlValues::default();
                mutated = true;
            }
        });

        mutated
    }
}
