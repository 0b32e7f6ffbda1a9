// ============================================================================
// PLACEMENT OPERATIONS — drag/drop, selection, transforms, delete, clear
// ============================================================================
//
// Free functions over the surface state, one per user gesture.  Destructive
// mutations of the element list snapshot history first; operations that need
// a selection or a drag payload degrade to silent no-ops without one.

use crate::components::history::HistoryManager;
use crate::surface::{ELEMENT_SIZE, ImageRef, PlacedElement, SurfaceState};

/// Values mirrored by the three transform controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlValues {
    /// Rotation in degrees.
    pub rotation: i32,
    /// Uniform scale factor (> 0).
    pub scale: f32,
    /// Opacity in [0, 1].
    pub opacity: f32,
}

impl Default for ControlValues {
    fn default() -> Self {
        Self {
            rotation: 0,
            scale: 1.0,
            opacity: 1.0,
        }
    }
}

impl ControlValues {
    fn of(elem: &PlacedElement) -> Self {
        Self {
            rotation: elem.rotation,
            scale: elem.scale,
            opacity: elem.opacity,
        }
    }
}

/// Record a palette item as the pending drag payload.  No mutation of the
/// element sequence happens until the matching drop.
pub fn begin_palette_drag(surface: &mut SurfaceState, image: ImageRef) {
    surface.drag_payload = Some(image);
    surface.dragging = None;
}

/// Record an existing element as being dragged within the surface.
pub fn begin_element_drag(surface: &mut SurfaceState, index: usize) {
    if index < surface.elements.len() {
        surface.dragging = Some(index);
        surface.drag_payload = None;
    }
}

/// Abort an in-flight drag without dropping (the native drag-cancel path:
/// no drop event fires, nothing mutates).
pub fn cancel_drag(surface: &mut SurfaceState) {
    surface.drag_payload = None;
    surface.dragging = None;
}

/// Commit a drop at a surface coordinate.
///
/// An in-surface element drag repositions that element; otherwise a pending
/// palette payload creates a new element appended on top.  Either way the
/// element is centered on the drop point (top-left at `(x − w/2, y − h/2)`),
/// and history is snapshotted before the mutation.  With neither a dragged
/// element nor a payload this is a silent no-op.
pub fn drop_at(surface: &mut SurfaceState, history: &mut HistoryManager, x: f32, y: f32) {
    let left = x - ELEMENT_SIZE * 0.5;
    let top = y - ELEMENT_SIZE * 0.5;

    if let Some(index) = surface.dragging.take() {
        if index < surface.elements.len() {
            history.record(surface, "Move Sticker");
            let elem = &mut surface.elements[index];
            elem.x = left;
            elem.y = top;
        }
        return;
    }

    if let Some(image) = surface.drag_payload.take() {
        history.record(surface, "Place Sticker");
        surface
            .elements
            .push(PlacedElement::new(image, left, top));
    }
}

/// Mark exactly one element selected and return its transform values for
/// control sync.
pub fn select(surface: &mut SurfaceState, index: usize) -> ControlValues {
    if index >= surface.elements.len() {
        return deselect(surface);
    }
    for (i, elem) in surface.elements.iter_mut().enumerate() {
        elem.selected = i == index;
    }
    ControlValues::of(&surface.elements[index])
}

/// Clear the selection (pointer landed on the bare surface) and reset the
/// controls to their defaults.
pub fn deselect(surface: &mut SurfaceState) -> ControlValues {
    surface.clear_selection();
    ControlValues::default()
}

/// Write the control values onto the selected element.  Silent no-op when
/// nothing is selected.
pub fn apply_transform(surface: &mut SurfaceState, values: ControlValues) {
    if let Some(elem) = surface.selected_element_mut() {
        elem.rotation = values.rotation;
        elem.scale = values.scale.max(0.01);
        elem.opacity = values.opacity.clamp(0.0, 1.0);
    }
}

/// Remove the selected element.  Snapshots history first; silent no-op
/// without a selection.
pub fn delete_selected(surface: &mut SurfaceState, history: &mut HistoryManager) {
    let Some(index) = surface.selected_index() else {
        return;
    };
    history.record(surface, "Delete Sticker");
    surface.elements.remove(index);
    surface.clear_selection();
}

/// Remove every placed element, keeping only the base element with its
/// transform reset to defaults.  Snapshots history first.
pub fn clear_all(surface: &mut SurfaceState, history: &mut HistoryManager) {
    history.record(surface, "Clear Surface");
    surface.elements.clear();
    surface.base.reset_transform();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> ImageRef {
        ImageRef::Builtin("part.star".into())
    }

    fn surface() -> SurfaceState {
        let mut s = SurfaceState::new(480, 480);
        s.base.image = Some(ImageRef::Builtin("character.sunny".into()));
        s
    }

    #[test]
    fn drop_centers_new_element_on_pointer() {
        let mut s = surface();
        let mut h = HistoryManager::default();

        begin_palette_drag(&mut s, star());
        drop_at(&mut s, &mut h, 200.0, 120.0);

        assert_eq!(s.elements.len(), 1);
        assert_eq!(s.elements[0].x, 150.0);
        assert_eq!(s.elements[0].y, 70.0);
        assert!(s.drag_payload.is_none());
    }

    #[test]
    fn drop_without_payload_is_a_noop() {
        let mut s = surface();
        let mut h = HistoryManager::default();

        drop_at(&mut s, &mut h, 200.0, 120.0);

        assert!(s.elements.is_empty());
        assert!(!h.can_undo());
    }

    #[test]
    fn drop_repositions_dragged_element() {
        let mut s = surface();
        let mut h = HistoryManager::default();
        s.elements.push(PlacedElement::new(star(), 10.0, 10.0));

        begin_element_drag(&mut s, 0);
        drop_at(&mut s, &mut h, 300.0, 250.0);

        assert_eq!(s.elements[0].x, 250.0);
        assert_eq!(s.elements[0].y, 200.0);
        assert!(s.dragging.is_none());
        // The move is undoable back to the original position.
        assert!(h.undo(&mut s).is_some());
        assert_eq!(s.elements[0].x, 10.0);
    }

    #[test]
    fn cancelled_drag_mutates_nothing() {
        let mut s = surface();
        let h = HistoryManager::default();
        begin_palette_drag(&mut s, star());
        cancel_drag(&mut s);

        assert!(s.elements.is_empty());
        assert!(s.drag_payload.is_none());
        assert!(!h.can_undo());
    }

    #[test]
    fn select_syncs_control_values_from_element() {
        let mut s = surface();
        let mut e = PlacedElement::new(star(), 0.0, 0.0);
        e.rotation = 30;
        e.scale = 1.5;
        e.opacity = 0.25;
        s.elements.push(PlacedElement::new(star(), 50.0, 50.0));
        s.elements.push(e);

        let values = select(&mut s, 1);
        assert_eq!(values.rotation, 30);
        assert_eq!(values.scale, 1.5);
        assert_eq!(values.opacity, 0.25);
        assert_eq!(s.selected_index(), Some(1));
        assert!(!s.elements[0].selected);
    }

    #[test]
    fn deselect_resets_controls_to_defaults() {
        let mut s = surface();
        s.elements.push(PlacedElement::new(star(), 0.0, 0.0));
        select(&mut s, 0);

        let values = deselect(&mut s);
        assert_eq!(values, ControlValues::default());
        assert!(s.selected_index().is_none());
    }

    #[test]
    fn apply_transform_without_selection_is_a_noop() {
        let mut s = surface();
        s.elements.push(PlacedElement::new(star(), 0.0, 0.0));

        apply_transform(
            &mut s,
            ControlValues {
                rotation: 90,
                scale: 2.0,
                opacity: 0.5,
            },
        );
        assert_eq!(s.elements[0].rotation, 0);
        assert_eq!(s.elements[0].scale, 1.0);
    }

    #[test]
    fn apply_transform_writes_selected_element() {
        let mut s = surface();
        s.elements.push(PlacedElement::new(star(), 0.0, 0.0));
        select(&mut s, 0);

        apply_transform(
            &mut s,
            ControlValues {
                rotation: -45,
                scale: 0.75,
                opacity: 0.4,
            },
        );
        let e = &s.elements[0];
        assert_eq!(e.rotation, -45);
        assert_eq!(e.scale, 0.75);
        assert_eq!(e.opacity, 0.4);
    }

    #[test]
    fn delete_without_selection_is_a_noop() {
        let mut s = surface();
        s.elements.push(PlacedElement::new(star(), 0.0, 0.0));
        let mut h = HistoryManager::default();

        delete_selected(&mut s, &mut h);
        assert_eq!(s.elements.len(), 1);
        assert!(!h.can_undo());
    }

    #[test]
    fn delete_removes_selected_and_clears_selection() {
        let mut s = surface();
        s.elements.push(PlacedElement::new(star(), 0.0, 0.0));
        s.elements.push(PlacedElement::new(star(), 60.0, 60.0));
        let mut h = HistoryManager::default();
        select(&mut s, 0);

        delete_selected(&mut s, &mut h);
        assert_eq!(s.elements.len(), 1);
        assert_eq!(s.elements[0].x, 60.0);
        assert!(s.selected_index().is_none());
        assert!(h.can_undo());
    }

    #[test]
    fn clear_all_keeps_only_the_base_with_default_transform() {
        let mut s = surface();
        let mut h = HistoryManager::default();
        for i in 0..3 {
            s.elements
                .push(PlacedElement::new(star(), i as f32 * 40.0, 0.0));
        }
        s.base.rotation = 15;
        s.base.scale = 1.2;

        clear_all(&mut s, &mut h);

        assert!(s.elements.is_empty());
        assert!(s.base.image.is_some());
        assert!(s.base.has_default_transform());
        // The clear is undoable.
        assert!(h.undo(&mut s).is_some());
        assert_eq!(s.elements.len(), 3);
        assert_eq!(s.base.rotation, 15);
    }
}
