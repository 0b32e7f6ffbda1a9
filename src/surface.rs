use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Stroke, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::assets::Assets;
use crate::components::history::HistoryManager;
use crate::ops::placement::{self, ControlValues};

/// Fixed display size of a placed element's unscaled bounding box, in surface
/// pixels.  Drops are centered on the pointer by offsetting half this size.
pub const ELEMENT_SIZE: f32 = 100.0;

/// Default composition surface dimensions.
pub const DEFAULT_SURFACE_WIDTH: u32 = 480;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 480;

// ============================================================================
// IMAGE REFERENCES
// ============================================================================

/// A serializable reference to an image.  Resolution to pixel data happens in
/// [`crate::assets::ImageStore`]; an unresolvable reference renders as a
/// placeholder and never fails an operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageRef {
    /// Built-in catalog asset, addressed by stable id (e.g. `"part.star"`).
    Builtin(String),
    /// Image file on disk.
    Path(PathBuf),
    /// PNG-encoded bytes embedded directly (file-picker uploads).
    Embedded(Vec<u8>),
}

impl ImageRef {
    /// Short human-readable label, used in the palette and status line.
    pub fn label(&self) -> String {
        match self {
            ImageRef::Builtin(id) => id
                .rsplit('.')
                .next()
                .unwrap_or(id.as_str())
                .to_string(),
            ImageRef::Path(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string()),
            ImageRef::Embedded(_) => "upload".to_string(),
        }
    }
}

// ============================================================================
// PLACED ELEMENTS
// ============================================================================

/// One sticker on the composition surface.
///
/// `x`/`y` anchor the **top-left of the unscaled box**; rotation and scale
/// apply about the box center, mirroring a CSS transform with the default
/// origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedElement {
    pub image: ImageRef,
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees, clockwise.
    pub rotation: i32,
    /// Uniform scale factor (> 0).
    pub scale: f32,
    /// Opacity in [0, 1].
    pub opacity: f32,
    pub selected: bool,
}

impl PlacedElement {
    pub fn new(image: ImageRef, x: f32, y: f32) -> Self {
        Self {
            image,
            x,
            y,
            rotation: 0,
            scale: 1.0,
            opacity: 1.0,
            selected: false,
        }
    }

    /// Center of the element's box in surface coordinates.
    pub fn center(&self) -> Pos2 {
        pos2(self.x + ELEMENT_SIZE * 0.5, self.y + ELEMENT_SIZE * 0.5)
    }

    /// Half extent of the scaled box along each axis.
    pub fn half_extent(&self) -> f32 {
        ELEMENT_SIZE * 0.5 * self.scale.max(0.0)
    }

    /// Corners of the scaled, rotated box: [TL, TR, BL, BR] in surface coords.
    pub fn corners(&self) -> [Pos2; 4] {
        let c = self.center();
        let h = self.half_extent();
        let (sin, cos) = (self.rotation as f32).to_radians().sin_cos();
        let rot = |dx: f32, dy: f32| pos2(c.x + dx * cos - dy * sin, c.y + dx * sin + dy * cos);
        [rot(-h, -h), rot(h, -h), rot(-h, h), rot(h, h)]
    }

    /// Whether a surface-space point falls inside the scaled, rotated box.
    /// The point is inverse-rotated into the element's local frame.
    pub fn contains(&self, p: Pos2) -> bool {
        let c = self.center();
        let h = self.half_extent();
        if h <= 0.0 {
            return false;
        }
        let (sin, cos) = (-(self.rotation as f32)).to_radians().sin_cos();
        let dx = p.x - c.x;
        let dy = p.y - c.y;
        let lx = dx * cos - dy * sin;
        let ly = dx * sin + dy * cos;
        lx.abs() <= h && ly.abs() <= h
    }
}

// ============================================================================
// BASE ELEMENT
// ============================================================================

/// The character backdrop.  Always present, never removed by clear, and not
/// part of the placed-element sequence.  Its transform resets to defaults on
/// clear-all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseElement {
    pub image: Option<ImageRef>,
    pub rotation: i32,
    pub scale: f32,
    pub opacity: f32,
}

impl Default for BaseElement {
    fn default() -> Self {
        Self {
            image: None,
            rotation: 0,
            scale: 1.0,
            opacity: 1.0,
        }
    }
}

impl BaseElement {
    pub fn reset_transform(&mut self) {
        self.rotation = 0;
        self.scale = 1.0;
        self.opacity = 1.0;
    }

    pub fn has_default_transform(&self) -> bool {
        self.rotation == 0 && self.scale == 1.0 && self.opacity == 1.0
    }
}

// ============================================================================
// SURFACE STATE
// ============================================================================

/// The composition surface: an ordered sequence of placed elements rendered
/// back-to-front over the base element, plus the transient interaction state
/// (pending drag payload, dragged element) that the placement operations
/// consume.
#[derive(Clone)]
pub struct SurfaceState {
    pub width: u32,
    pub height: u32,
    pub background: Option<ImageRef>,
    pub base: BaseElement,
    pub elements: Vec<PlacedElement>,

    /// Image reference picked up from the palette, awaiting a drop.
    pub drag_payload: Option<ImageRef>,
    /// Index of an existing element being dragged within the surface.
    pub dragging: Option<usize>,
}

impl SurfaceState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: None,
            base: BaseElement::default(),
            elements: Vec::new(),
            drag_payload: None,
            dragging: None,
        }
    }

    pub fn size(&self) -> Vec2 {
        vec2(self.width as f32, self.height as f32)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.elements.iter().position(|e| e.selected)
    }

    pub fn selected_element(&self) -> Option<&PlacedElement> {
        self.elements.iter().find(|e| e.selected)
    }

    pub fn selected_element_mut(&mut self) -> Option<&mut PlacedElement> {
        self.elements.iter_mut().find(|e| e.selected)
    }

    pub fn clear_selection(&mut self) {
        for elem in &mut self.elements {
            elem.selected = false;
        }
    }

    /// Topmost element under a surface-space point (last in sequence wins).
    pub fn hit_test(&self, p: Pos2) -> Option<usize> {
        self.elements.iter().rposition(|e| e.contains(p))
    }
}

// ============================================================================
// SURFACE VIEW — egui widget rendering the surface and routing gestures
// ============================================================================

/// Immediate-mode view of a [`SurfaceState`].  Renders 1:1 (one surface pixel
/// per point), centered in the available space.
#[derive(Default)]
pub struct SurfaceView {
    /// Set while a palette ghost was drawn last frame (keeps repaints flowing).
    ghost_active: bool,
}

/// What a frame of surface interaction did, for the app to react to.
#[derive(Default)]
pub struct SurfaceResponse {
    /// New control values whenever the selection changed.
    pub selection_changed: Option<ControlValues>,
    /// True when the element sequence was mutated (drop committed).
    pub mutated: bool,
}

impl SurfaceView {
    /// Render the surface and translate pointer gestures into placement
    /// operations.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        surface: &mut SurfaceState,
        history: &mut HistoryManager,
        assets: &mut Assets,
    ) -> SurfaceResponse {
        let avail = ui.available_rect_before_wrap();
        let rect = Rect::from_center_size(avail.center(), surface.size());
        let response = ui.allocate_rect(rect, Sense::click_and_drag());
        let painter = ui.painter_at(avail);

        // Backdrop fill + frame
        painter.rect_filled(rect, 0.0, Color32::WHITE);
        self.draw_background(ui, &painter, rect, surface, assets);
        self.draw_base(ui, &painter, rect, surface, assets);

        let dragging = surface.dragging;
        for (idx, elem) in surface.elements.iter().enumerate() {
            // The dragged element is drawn as a pointer-following ghost below.
            if dragging == Some(idx) {
                continue;
            }
            self.draw_element(ui, &painter, rect, elem, assets, elem.opacity);
        }
        if let Some(elem) = surface.selected_element() {
            if dragging != surface.selected_index() {
                self.draw_selection_outline(ui, &painter, rect, elem);
            }
        }
        painter.rect_stroke(rect, 0.0, ui.visuals().window_stroke);

        let mut out = SurfaceResponse::default();

        // Click: select the topmost element under the pointer, or deselect
        // when the press landed on the bare surface.
        if response.clicked() {
            if let Some(pp) = response.interact_pointer_pos() {
                let local = to_surface(pp, rect);
                out.selection_changed = Some(match surface.hit_test(local) {
                    Some(idx) => placement::select(surface, idx),
                    None => placement::deselect(surface),
                });
            }
        }

        // Drag an existing element: position commits on release.
        if response.drag_started() {
            if let Some(pp) = response.interact_pointer_pos() {
                if let Some(idx) = surface.hit_test(to_surface(pp, rect)) {
                    placement::begin_element_drag(surface, idx);
                    out.selection_changed = Some(placement::select(surface, idx));
                }
            }
        }
        if surface.dragging.is_some() {
            if let Some(pp) = response
                .interact_pointer_pos()
                .or_else(|| ui.input(|i| i.pointer.hover_pos()))
            {
                self.draw_drag_ghost(ui, &painter, rect, surface, pp, assets);
            }
        }
        if response.drag_released() {
            match response.interact_pointer_pos() {
                Some(pp) if surface.dragging.is_some() => {
                    let local = to_surface(pp, rect);
                    placement::drop_at(surface, history, local.x, local.y);
                    out.mutated = true;
                }
                _ => placement::cancel_drag(surface),
            }
        }

        // Palette payload: ghost follows the pointer anywhere; the drop only
        // lands when released over the surface (release elsewhere cancels,
        // like a native drag-cancel).
        self.ghost_active = false;
        if surface.drag_payload.is_some() {
            let hover = ui.input(|i| i.pointer.hover_pos());
            let released = ui.input(|i| i.pointer.any_released());
            if let Some(hp) = hover {
                self.draw_payload_ghost(ui, hp, surface, assets);
                self.ghost_active = true;
            }
            if released {
                match hover {
                    Some(hp) if rect.contains(hp) => {
                        let local = to_surface(hp, rect);
                        placement::drop_at(surface, history, local.x, local.y);
                        out.mutated = true;
                    }
                    _ => placement::cancel_drag(surface),
                }
                self.ghost_active = false;
            }
        }
        if self.ghost_active {
            // Keep the ghost glued to the cursor between motion events.
            ui.ctx().request_repaint();
        }

        out
    }

    fn draw_background(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        surface: &SurfaceState,
        assets: &mut Assets,
    ) {
        let Some(image) = &surface.background else {
            return;
        };
        let Some(tex) = assets.texture_for(ui.ctx(), image) else {
            return;
        };
        let [sw, sh] = tex.size();
        if sw == 0 || sh == 0 {
            return;
        }
        // Scale-to-cover: crop the source via UVs so the surface is filled
        // without distortion.
        let scale = (rect.width() / sw as f32).max(rect.height() / sh as f32);
        let u = (rect.width() / scale / sw as f32).min(1.0);
        let v = (rect.height() / scale / sh as f32).min(1.0);
        let uv = Rect::from_min_max(
            pos2(0.5 - u * 0.5, 0.5 - v * 0.5),
            pos2(0.5 + u * 0.5, 0.5 + v * 0.5),
        );
        painter.image(tex.id(), rect, uv, Color32::WHITE);
    }

    fn draw_base(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        surface: &SurfaceState,
        assets: &mut Assets,
    ) {
        let Some(image) = &surface.base.image else {
            return;
        };
        let Some(tex) = assets.texture_for(ui.ctx(), image) else {
            return;
        };
        let [sw, sh] = tex.size();
        if sw == 0 || sh == 0 {
            return;
        }
        // Scale-to-fit, centered; the base transform applies on top.
        let fit = (rect.width() / sw as f32).min(rect.height() / sh as f32);
        let half_w = sw as f32 * fit * 0.5 * surface.base.scale.max(0.0);
        let half_h = sh as f32 * fit * 0.5 * surface.base.scale.max(0.0);
        draw_textured_quad(
            painter,
            tex.id(),
            rect.center(),
            half_w,
            half_h,
            surface.base.rotation as f32,
            surface.base.opacity,
        );
    }

    fn draw_element(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        elem: &PlacedElement,
        assets: &mut Assets,
        opacity: f32,
    ) {
        let center = rect.min + elem.center().to_vec2();
        match assets.texture_for(ui.ctx(), &elem.image) {
            Some(tex) => {
                let [sw, sh] = tex.size();
                let (half_w, half_h) = fitted_half_extents(sw, sh, elem.scale);
                draw_textured_quad(
                    painter,
                    tex.id(),
                    center,
                    half_w,
                    half_h,
                    elem.rotation as f32,
                    opacity,
                );
            }
            None => {
                // Broken-image analog: gray box with a question mark.
                let h = elem.half_extent();
                let broken = Rect::from_center_size(center, Vec2::splat(h * 2.0));
                painter.rect_filled(broken, 2.0, Color32::from_gray(200));
                painter.rect_stroke(broken, 2.0, Stroke::new(1.0, Color32::from_gray(140)));
                painter.text(
                    center,
                    egui::Align2::CENTER_CENTER,
                    "?",
                    egui::FontId::proportional(24.0),
                    Color32::from_gray(110),
                );
            }
        }
    }

    /// Accent outline with corner handles around the selected element.
    fn draw_selection_outline(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        elem: &PlacedElement,
    ) {
        let accent = ui.visuals().selection.stroke.color;
        let corners = elem.corners().map(|c| rect.min + c.to_vec2());
        // TL→TR, TR→BR, BR→BL, BL→TL
        let edge_order = [(0, 1), (1, 3), (3, 2), (2, 0)];
        for &(a, b) in &edge_order {
            painter.line_segment([corners[a], corners[b]], Stroke::new(2.0, accent));
        }
        for &c in &corners {
            let r = Rect::from_center_size(c, Vec2::splat(7.0));
            painter.rect_filled(r, 2.0, accent);
            painter.rect_stroke(r, 2.0, Stroke::new(1.0, Color32::WHITE));
        }
    }

    fn draw_drag_ghost(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: Rect,
        surface: &SurfaceState,
        pointer: Pos2,
        assets: &mut Assets,
    ) {
        let Some(idx) = surface.dragging else { return };
        let Some(elem) = surface.elements.get(idx) else {
            return;
        };
        // Preview the element centered on the pointer, as the drop will be.
        let mut preview = elem.clone();
        let local = to_surface(pointer, rect);
        preview.x = local.x - ELEMENT_SIZE * 0.5;
        preview.y = local.y - ELEMENT_SIZE * 0.5;
        self.draw_element(ui, painter, rect, &preview, assets, elem.opacity * 0.6);
    }

    /// Small pointer-following thumbnail while a palette item is in flight.
    /// Drawn on the tooltip layer so it rides above every panel.
    fn draw_payload_ghost(
        &self,
        ui: &egui::Ui,
        pointer: Pos2,
        surface: &SurfaceState,
        assets: &mut Assets,
    ) {
        let Some(image) = &surface.drag_payload else {
            return;
        };
        let layer = egui::LayerId::new(egui::Order::Tooltip, egui::Id::new("palette-drag-ghost"));
        let painter = ui.ctx().layer_painter(layer);
        match assets.texture_for(ui.ctx(), image) {
            Some(tex) => {
                let ghost = Rect::from_center_size(pointer, Vec2::splat(64.0));
                painter.image(
                    tex.id(),
                    ghost,
                    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                    Color32::from_white_alpha(160),
                );
            }
            None => {
                painter.circle_filled(pointer, 8.0, Color32::from_gray(160));
            }
        }
    }
}

fn to_surface(p: Pos2, rect: Rect) -> Pos2 {
    pos2(p.x - rect.min.x, p.y - rect.min.y)
}

/// Half extents of a source image aspect-fitted into the element box, then
/// scaled by the element's scale factor.
pub fn fitted_half_extents(src_w: usize, src_h: usize, scale: f32) -> (f32, f32) {
    if src_w == 0 || src_h == 0 {
        let h = ELEMENT_SIZE * 0.5 * scale.max(0.0);
        return (h, h);
    }
    let fit = (ELEMENT_SIZE / src_w as f32).min(ELEMENT_SIZE / src_h as f32);
    let s = scale.max(0.0);
    (
        src_w as f32 * fit * 0.5 * s,
        src_h as f32 * fit * 0.5 * s,
    )
}

/// Textured quad with per-vertex premultiplied white tint — the opacity fade
/// approach used for floating overlays.
fn draw_textured_quad(
    painter: &egui::Painter,
    tex_id: egui::TextureId,
    center: Pos2,
    half_w: f32,
    half_h: f32,
    rotation_deg: f32,
    opacity: f32,
) {
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let rot = |dx: f32, dy: f32| {
        pos2(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    };
    let tint = Color32::from_white_alpha((opacity.clamp(0.0, 1.0) * 255.0).round() as u8);

    let mut mesh = egui::Mesh::with_texture(tex_id);
    // Vertices: TL, TR, BL, BR with UV corners
    mesh.vertices.push(egui::epaint::Vertex {
        pos: rot(-half_w, -half_h),
        uv: pos2(0.0, 0.0),
        color: tint,
    });
    mesh.vertices.push(egui::epaint::Vertex {
        pos: rot(half_w, -half_h),
        uv: pos2(1.0, 0.0),
        color: tint,
    });
    mesh.vertices.push(egui::epaint::Vertex {
        pos: rot(-half_w, half_h),
        uv: pos2(0.0, 1.0),
        color: tint,
    });
    mesh.vertices.push(egui::epaint::Vertex {
        pos: rot(half_w, half_h),
        uv: pos2(1.0, 1.0),
        color: tint,
    });
    // Two triangles: TL-TR-BL and TR-BR-BL
    mesh.indices.extend_from_slice(&[0, 1, 2, 1, 3, 2]);
    painter.add(egui::Shape::mesh(mesh));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem_at(x: f32, y: f32) -> PlacedElement {
        PlacedElement::new(ImageRef::Builtin("part.star".into()), x, y)
    }

    #[test]
    fn center_is_offset_by_half_box() {
        let e = elem_at(10.0, 20.0);
        assert_eq!(e.center(), pos2(60.0, 70.0));
    }

    #[test]
    fn contains_respects_scale() {
        let mut e = elem_at(0.0, 0.0);
        assert!(e.contains(pos2(50.0, 50.0)));
        assert!(e.contains(pos2(1.0, 1.0)));
        assert!(!e.contains(pos2(101.0, 50.0)));

        e.scale = 0.5;
        // Box shrinks about the center: (1,1) is now outside.
        assert!(!e.contains(pos2(1.0, 1.0)));
        assert!(e.contains(pos2(50.0, 30.0)));
    }

    #[test]
    fn contains_respects_rotation() {
        let mut e = elem_at(0.0, 0.0);
        e.rotation = 45;
        // A 45°-rotated square no longer covers its old corners but does
        // cover points beyond the old edge midpoints on the axes.
        assert!(!e.contains(pos2(2.0, 2.0)));
        assert!(e.contains(pos2(50.0, 50.0 + 65.0)));
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut s = SurfaceState::new(480, 480);
        s.elements.push(elem_at(0.0, 0.0));
        s.elements.push(elem_at(40.0, 40.0));
        // Overlap region belongs to the later (topmost) element.
        assert_eq!(s.hit_test(pos2(60.0, 60.0)), Some(1));
        assert_eq!(s.hit_test(pos2(5.0, 5.0)), Some(0));
        assert_eq!(s.hit_test(pos2(400.0, 400.0)), None);
    }

    #[test]
    fn clear_selection_unsets_every_flag() {
        let mut s = SurfaceState::new(480, 480);
        s.elements.push(elem_at(0.0, 0.0));
        s.elements.push(elem_at(40.0, 40.0));
        s.elements[0].selected = true;
        s.elements[1].selected = true;
        s.clear_selection();
        assert!(s.selected_index().is_none());
    }
}
