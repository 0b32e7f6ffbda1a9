use eframe::egui;
use egui::{Sense, Vec2};

use crate::assets::{Assets, BACKGROUND_CATALOG, CHARACTER_CATALOG, PART_CATALOG};
use crate::io;
use crate::ops::placement;
use crate::surface::{ImageRef, SurfaceState};

const THUMB_SIZE: f32 = 56.0;

/// Left-hand panel: character and background selectors, the grid of
/// draggable parts, and the upload button.
#[derive(Default)]
pub struct PalettePanel {
    /// File-picker uploads, shown after the stock parts: (label, reference).
    uploads: Vec<(String, ImageRef)>,
    upload_counter: usize,
}

impl PalettePanel {
    /// Returns true when the surface was mutated (background or character
    /// switched) so the owning project can be marked dirty.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        surface: &mut SurfaceState,
        assets: &mut Assets,
    ) -> bool {
        let mut mutated = false;

        ui.add_space(4.0);
        ui.heading("Palette");
        ui.separator();

        // Character selector — swaps the base element's image directly.
        // Deliberately not undo-tracked.
        let current_character = CHARACTER_CATALOG
            .iter()
            .find(|e| surface.base.image == Some(ImageRef::Builtin(e.id.to_string())))
            .map(|e| e.name)
            .unwrap_or("Custom");
        ui.horizontal(|ui| {
            ui.label("Character:");
            egui::ComboBox::from_id_source("character_select")
                .selected_text(current_character)
                .show_ui(ui, |ui| {
                    for entry in CHARACTER_CATALOG {
                        let image = ImageRef::Builtin(entry.id.to_string());
                        let checked = surface.base.image.as_ref() == Some(&image);
                        if ui.selectable_label(checked, entry.name).clicked() && !checked {
                            surface.base.image = Some(image);
                            mutated = true;
                        }
                    }
                });
        });

        // Background selector.
        let current_background = BACKGROUND_CATALOG
            .iter()
            .find(|e| surface.background == Some(ImageRef::Builtin(e.id.to_string())))
            .map(|e| e.name)
            .unwrap_or("None");
        ui.horizontal(|ui| {
            ui.label("Background:");
            egui::ComboBox::from_id_source("background_select")
                .selected_text(current_background)
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_label(surface.background.is_none(), "None")
                        .clicked()
                        && surface.background.is_some()
                    {
                        surface.background = None;
                        mutated = true;
                    }
                    for entry in BACKGROUND_CATALOG {
                        let image = ImageRef::Builtin(entry.id.to_string());
                        let checked = surface.background.as_ref() == Some(&image);
                        if ui.selectable_label(checked, entry.name).clicked() && !checked {
                            surface.background = Some(image);
                            mutated = true;
                        }
                    }
                });
        });

        ui.separator();
        ui.label("Parts — drag onto the canvas:");
        ui.add_space(2.0);

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for entry in PART_CATALOG {
                    Self::palette_item(
                        ui,
                        surface,
                        assets,
                        ImageRef::Builtin(entry.id.to_string()),
                        entry.name,
                    );
                }
                for (name, image) in &self.uploads {
                    Self::palette_item(ui, surface, assets, image.clone(), name);
                }
            });

            ui.add_space(6.0);
            if ui.button("📂 Upload image…").clicked() {
                self.handle_upload(assets);
            }
        });

        mutated
    }

    /// One draggable thumbnail.  Drag-start records the image reference as
    /// the pending payload; the surface view commits it on release.
    fn palette_item(
        ui: &mut egui::Ui,
        surface: &mut SurfaceState,
        assets: &mut Assets,
        image: ImageRef,
        name: &str,
    ) {
        let response = match assets.texture_for(ui.ctx(), &image) {
            Some(tex) => {
                let sized = egui::load::SizedTexture::from_handle(&tex);
                ui.add(
                    egui::Image::from_texture(sized)
                        .fit_to_exact_size(Vec2::splat(THUMB_SIZE))
                        .sense(Sense::drag()),
                )
            }
            None => ui.add_sized(Vec2::splat(THUMB_SIZE), egui::Button::new("?")),
        };
        let response = response.on_hover_text(name);
        if response.drag_started() {
            placement::begin_palette_drag(surface, image);
        }
    }

    /// File-picker upload: the decoded image is re-encoded as PNG and
    /// embedded, so projects that use it stay self-contained.
    fn handle_upload(&mut self, assets: &mut Assets) {
        let Some(path) = io::pick_image_dialog() else {
            return;
        };
        match io::load_image_file(&path) {
            Ok(pixels) => match io::encode_png_bytes(&pixels) {
                Ok(bytes) => {
                    self.upload_counter += 1;
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| format!("upload-{}", self.upload_counter));
                    let image = ImageRef::Embedded(bytes);
                    // Seed the store so the thumbnail shows without a decode.
                    assets.store.insert(image.clone(), pixels);
                    crate::log_info!("Uploaded {} into the palette", path.display());
                    self.uploads.push((name, image));
                }
                Err(e) => crate::log_err!("Upload failed: {}", e),
            },
            Err(e) => crate::log_err!("Upload failed: {}", e),
        }
    }
}
