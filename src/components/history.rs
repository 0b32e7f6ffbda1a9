use eframe::egui;
use std::collections::VecDeque;

use crate::surface::{BaseElement, ImageRef, PlacedElement, SurfaceState};

// ============================================================================
// SURFACE SNAPSHOT — whole-surface undo unit
// ============================================================================

/// A by-value copy of everything visible on the composition surface.
///
/// Snapshots are whole-surface, not diffs: capture cost scales with element
/// count, which stays tiny at interactive, human-paced usage.  Transient
/// interaction state (drag payload, dragged index) is deliberately excluded.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSnapshot {
    pub background: Option<ImageRef>,
    pub base: BaseElement,
    pub elements: Vec<PlacedElement>,
}

impl SurfaceSnapshot {
    pub fn capture(state: &SurfaceState) -> Self {
        Self {
            background: state.background.clone(),
            base: state.base.clone(),
            elements: state.elements.clone(),
        }
    }

    /// Replace the surface's entire content with this snapshot.  Drag state
    /// is untouched; it belongs to the gesture in flight, not the history.
    pub fn restore_into(&self, state: &mut SurfaceState) {
        state.background = self.background.clone();
        state.base = self.base.clone();
        state.elements = self.elements.clone();
    }

    /// Approximate heap footprint.  Embedded image bytes dominate; everything
    /// else is a flat per-element cost.
    fn memory_bytes(&self) -> usize {
        let image_bytes = |r: &ImageRef| match r {
            ImageRef::Embedded(bytes) => bytes.len(),
            ImageRef::Builtin(id) => id.len(),
            ImageRef::Path(p) => p.as_os_str().len(),
        };
        let mut total = self.background.as_ref().map_or(0, |r| image_bytes(r));
        total += self.base.image.as_ref().map_or(0, |r| image_bytes(r));
        for elem in &self.elements {
            total += std::mem::size_of::<PlacedElement>() + image_bytes(&elem.image);
        }
        total
    }
}

/// One history stack entry: a snapshot labeled with the mutation that
/// followed it (e.g. "Delete Sticker"), for display in the history panel.
#[derive(Clone)]
struct HistoryEntry {
    label: String,
    snapshot: SurfaceSnapshot,
}

// ============================================================================
// HISTORY MANAGER — undo/redo stacks with count and memory limits
// ============================================================================

/// Linear undo/redo over [`SurfaceSnapshot`]s.
///
/// `record` is called once at project creation (capturing the initial state)
/// and once immediately **before** each destructive mutation; any record
/// unconditionally clears the redo stack.
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            max_memory_bytes: Some(64 * 1024 * 1024), // 64 MB default limit
            total_memory: 0,
        }
    }

    /// Push a snapshot of the current surface state onto the undo stack.
    /// Clears the redo stack: redo history is only valid immediately after
    /// an undo, never after a fresh edit.
    pub fn record(&mut self, state: &SurfaceState, label: &str) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self
                .total_memory
                .saturating_sub(entry.snapshot.memory_bytes());
        }

        let snapshot = SurfaceSnapshot::capture(state);
        self.total_memory += snapshot.memory_bytes();
        self.undo_stack.push_back(HistoryEntry {
            label: label.to_string(),
            snapshot,
        });

        self.prune();
    }

    /// Restore the most recent undo snapshot, moving the current state onto
    /// the redo stack.  Returns the restored entry's label, or `None` when
    /// the undo stack is empty (surface and redo stack untouched).
    pub fn undo(&mut self, state: &mut SurfaceState) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        self.total_memory = self
            .total_memory
            .saturating_sub(entry.snapshot.memory_bytes());

        let current = SurfaceSnapshot::capture(state);
        self.total_memory += current.memory_bytes();
        self.redo_stack.push_back(HistoryEntry {
            label: entry.label.clone(),
            snapshot: current,
        });

        entry.snapshot.restore_into(state);
        Some(entry.label)
    }

    /// Inverse of [`undo`](Self::undo).  No-op returning `None` when the redo
    /// stack is empty.
    pub fn redo(&mut self, state: &mut SurfaceState) -> Option<String> {
        let entry = self.redo_stack.pop_back()?;
        self.total_memory = self
            .total_memory
            .saturating_sub(entry.snapshot.memory_bytes());

        let current = SurfaceSnapshot::capture(state);
        self.total_memory += current.memory_bytes();
        self.undo_stack.push_back(HistoryEntry {
            label: entry.label.clone(),
            snapshot: current,
        });

        entry.snapshot.restore_into(state);
        Some(entry.label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|e| e.label.clone())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|e| e.label.clone())
    }

    /// All undo labels, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|e| e.label.clone()).collect()
    }

    /// Current memory usage of the history (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn set_max_history_size(&mut self, max: usize) {
        self.max_history_size = max.max(1);
        self.prune();
    }

    /// Prune old entries to stay within limits.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self
                    .total_memory
                    .saturating_sub(removed.snapshot.memory_bytes());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self
                        .total_memory
                        .saturating_sub(removed.snapshot.memory_bytes());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }
}

// ============================================================================
// HISTORY PANEL — UI for displaying history
// ============================================================================

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
}

impl HistoryPanel {
    pub fn show(&mut self, ui: &mut egui::Ui, history: &HistoryManager) {
        ui.horizontal(|ui| {
            ui.label(format!(
                "Undo: {} | Redo: {}",
                history.undo_count(),
                history.redo_count()
            ));

            if ui.small_button("ℹ").on_hover_text("Show memory info").clicked() {
                self.show_memory_info = !self.show_memory_info;
            }
        });

        if self.show_memory_info {
            let mem_kb = history.memory_usage() as f64 / 1024.0;
            ui.label(format!("Memory: {:.1} KB", mem_kb));
        }

        egui::ScrollArea::vertical()
            .max_height(150.0)
            .show(ui, |ui| {
                let items = history.undo_history();
                if items.is_empty() {
                    ui.weak("No history yet");
                } else {
                    for (i, label) in items.iter().enumerate() {
                        if i == 0 {
                            ui.label(egui::RichText::new(format!("▶ {}", label)).strong());
                        } else {
                            ui.weak(format!("  {}", label));
                        }
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::placement;
    use crate::surface::PlacedElement;

    fn surface_with_elements(n: usize) -> SurfaceState {
        let mut s = SurfaceState::new(480, 480);
        s.base.image = Some(ImageRef::Builtin("character.sunny".into()));
        for i in 0..n {
            s.elements.push(PlacedElement::new(
                ImageRef::Builtin("part.star".into()),
                i as f32 * 30.0,
                i as f32 * 20.0,
            ));
        }
        s
    }

    #[test]
    fn n_deletes_then_n_undos_restores_exact_state() {
        let mut s = surface_with_elements(4);
        s.elements[2].rotation = 45;
        s.elements[2].opacity = 0.5;
        let mut h = HistoryManager::new(50);
        let original = SurfaceSnapshot::capture(&s);

        for _ in 0..4 {
            let last = s.elements.len() - 1;
            s.elements[last].selected = true;
            placement::delete_selected(&mut s, &mut h);
        }
        assert!(s.elements.is_empty());

        for _ in 0..4 {
            assert!(h.undo(&mut s).is_some());
        }
        // Selection flags were toggled before each delete, so compare with
        // the flag cleared — attribute and ordering equality is the point.
        let mut restored = SurfaceSnapshot::capture(&s);
        for e in &mut restored.elements {
            e.selected = false;
        }
        assert_eq!(restored, original);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut s = surface_with_elements(3);
        let mut h = HistoryManager::new(50);

        s.elements[0].selected = true;
        placement::delete_selected(&mut s, &mut h);
        let after_delete = SurfaceSnapshot::capture(&s);

        assert!(h.undo(&mut s).is_some());
        assert_ne!(SurfaceSnapshot::capture(&s), after_delete);

        assert!(h.redo(&mut s).is_some());
        assert_eq!(SurfaceSnapshot::capture(&s), after_delete);
    }

    #[test]
    fn destructive_mutation_after_undo_clears_redo() {
        let mut s = surface_with_elements(3);
        let mut h = HistoryManager::new(50);

        s.elements[0].selected = true;
        placement::delete_selected(&mut s, &mut h);
        assert!(h.undo(&mut s).is_some());
        assert!(h.can_redo());

        s.elements[1].selected = true;
        placement::delete_selected(&mut s, &mut h);
        assert!(!h.can_redo());

        let before = SurfaceSnapshot::capture(&s);
        assert!(h.redo(&mut s).is_none());
        assert_eq!(SurfaceSnapshot::capture(&s), before);
    }

    #[test]
    fn undo_on_empty_stack_is_a_noop() {
        let mut s = surface_with_elements(2);
        let mut h = HistoryManager::new(50);
        let before = SurfaceSnapshot::capture(&s);

        assert!(h.undo(&mut s).is_none());
        assert_eq!(SurfaceSnapshot::capture(&s), before);
        assert!(!h.can_redo());
    }

    #[test]
    fn record_prunes_to_count_limit() {
        let mut s = surface_with_elements(1);
        let mut h = HistoryManager::new(3);
        for i in 0..10 {
            h.record(&s, &format!("edit {}", i));
        }
        assert_eq!(h.undo_count(), 3);
        assert_eq!(h.undo_description().as_deref(), Some("edit 9"));
    }

    #[test]
    fn snapshots_are_by_value() {
        let mut s = surface_with_elements(1);
        let mut h = HistoryManager::new(50);
        h.record(&s, "before mutation");

        // Mutating the live surface must not retroactively alter the stored
        // snapshot.
        s.elements[0].x = 999.0;
        assert!(h.undo(&mut s).is_some());
        assert_ne!(s.elements[0].x, 999.0);
    }
}
